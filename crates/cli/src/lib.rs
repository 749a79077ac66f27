// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! wbrs - command line front end for the wokbridge sync engine.
//!
//! This crate wires [`wb_core`] to a `wokbridge.toml` configuration: it
//! builds the GitHub source, the tracker-binary target (with its JSONL
//! fallback), the cache backend and the reliability layer, then runs one
//! command against them.
//!
//! # Main Components
//!
//! - [`Config`] - `wokbridge.toml` sections with defaults
//! - [`Cli`] - argument parsing
//! - [`Error`] - Error types for all commands

mod cli;
mod commands;
pub mod config;
mod env;
pub mod error;
mod logging;

pub use cli::{CacheCommand, Cli, Command, OutputFormat, SyncArgs};
pub use config::Config;
pub use error::{Error, Result};

/// Run a parsed command line to completion.
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::find(cli.config.as_deref())?;
    logging::setup_logging(cli.verbose, config.log_path().as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(cli.command, &config))
}

async fn dispatch(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Sync(args) => commands::sync::run(config, args).await,
        Command::Status { output } => commands::status::run(config, output).await,
        Command::History { limit, output } => commands::history::run(config, limit, output),
        Command::Cache(command) => commands::cache::run(config, command).await,
        Command::Strategies => commands::strategies::run(config),
    }
}
