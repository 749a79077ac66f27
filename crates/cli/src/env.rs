// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! The fixed variable names are generated by `build.rs` and live in the
//! [`vars`] submodule. The token variable is named by the config.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `WOKBRIDGE_CONFIG` if set and non-empty.
pub fn config_path() -> Option<PathBuf> {
    non_empty(vars::WOKBRIDGE_CONFIG).map(PathBuf::from)
}

/// Returns the value of `WOKBRIDGE_LOG_FILE` if set and non-empty.
pub fn log_file() -> Option<PathBuf> {
    non_empty(vars::WOKBRIDGE_LOG_FILE).map(PathBuf::from)
}

/// Reads the API token from the variable named by `source.token_env`.
pub fn token(name: &str) -> Option<String> {
    non_empty(name)
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
