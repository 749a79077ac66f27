// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// Custom help template that groups commands into sections
const HELP_TEMPLATE: &str = "{about-with-newline}
{usage-heading} {usage}

{before-help}Options:
{options}{after-help}";

const COMMANDS_HELP: &str = "\
Syncing:
  sync        Run one sync pass between source and target
  status      Show configuration, breaker states and success rate
  history     Show recent sync runs

Maintenance:
  cache       Inspect or manage the response cache
  strategies  List conflict resolution strategies";

const QUICKSTART_HELP: &str = "\
Get started:
  wokbridge sync --dry-run              Preview what a sync would change
  wokbridge sync                        Sync both ways
  wokbridge sync --direction source-to-target
  wokbridge history -n 5                Show the last five runs";

#[derive(Parser)]
#[command(name = "wokbridge")]
#[command(version)]
#[command(about = "Keep GitHub issues and a local wok tracker in sync")]
#[command(help_template = HELP_TEMPLATE)]
#[command(before_help = COMMANDS_HELP)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Path to wokbridge.toml (defaults to $WOKBRIDGE_CONFIG, then ./wokbridge.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one sync pass between source and target
    #[command(after_help = "Examples:
  wokbridge sync --dry-run
  wokbridge sync --direction target-to-source --since 2026-01-01
  wokbridge sync --strategy merge --force -o json")]
    Sync(SyncArgs),

    /// Show configuration, circuit breakers and history success rate
    Status {
        /// Output format (text, json)
        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show recent sync runs, oldest first
    History {
        /// Maximum number of runs to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,

        /// Output format (text, json)
        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Inspect or manage the response cache
    #[command(subcommand)]
    Cache(CacheCommand),

    /// List registered conflict resolution strategies
    Strategies,
}

/// Per-run overrides for the `[sync]` section of the config.
#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Direction: source-to-target, target-to-source or bidirectional
    #[arg(long, short)]
    pub direction: Option<String>,

    /// Compute the plan without writing to either tracker
    #[arg(long)]
    pub dry_run: bool,

    /// Settle conflicts that would need manual attention by timestamp
    #[arg(long)]
    pub force: bool,

    /// Only consider items updated at or after this instant (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<String>,

    /// Maximum items fetched per side and written per batch (1-1000)
    #[arg(long, short = 'b')]
    pub batch_size: Option<usize>,

    /// Conflict strategy for this run
    #[arg(long, short)]
    pub strategy: Option<String>,

    /// Output format (text, json)
    #[arg(long, short, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Show hit rate and size
    Stats {
        /// Output format (text, json)
        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Remove every entry
    Clear,

    /// Write live entries to a JSON file
    Export {
        /// Destination file
        path: PathBuf,
    },

    /// Load entries from a file written by `cache export`
    Import {
        /// Source file
        path: PathBuf,
    },

    /// Remove entries whose key matches a regular expression
    #[command(after_help = "Examples:
  wokbridge cache invalidate '^source:'
  wokbridge cache invalidate 'item:wb-'")]
    Invalidate {
        /// Regular expression matched against cache keys
        pattern: String,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
