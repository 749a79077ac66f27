// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors surfaced by the `wokbridge` command line.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("no source configured\n  hint: set source.owner and source.repo in wokbridge.toml")]
    SourceNotConfigured,

    #[error("sync failed with {errors} error(s)")]
    SyncFailed { errors: usize },

    #[error(transparent)]
    Core(#[from] wb_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
