// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// Binary name that is never on `PATH`, so the target falls back to its file.
pub const MISSING_BINARY: &str = "wokbridge-test-no-such-tracker";

/// Command isolated from the caller's environment, run inside `temp`.
pub fn wokbridge(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("wokbridge");
    cmd.current_dir(temp.path())
        .env_remove("WOKBRIDGE_CONFIG")
        .env_remove("WOKBRIDGE_LOG_FILE")
        .env_remove("RUST_LOG")
        .env("WOKBRIDGE_TEST_TOKEN", "test-token");
    cmd
}

/// Write `wokbridge.toml` pointing the source at `api_url` and the target
/// at a JSONL file.
pub fn write_config(temp: &TempDir, api_url: &str, extra: &str) {
    let config = format!(
        r#"[source]
owner = "acme"
repo = "widgets"
token_env = "WOKBRIDGE_TEST_TOKEN"
api_url = "{api_url}"

[target]
binary = "{MISSING_BINARY}"
fallback_file = "items.jsonl"
prefix = "wb"

[reliability]
max_attempts = 1
timeout_secs = 5
{extra}"#
    );
    std::fs::write(temp.path().join("wokbridge.toml"), config).unwrap();
}

/// A GitHub issue as returned by the REST API.
pub fn issue_json(number: u64, title: &str, updated_at: &str) -> serde_json::Value {
    serde_json::json!({
        "number": number,
        "title": title,
        "body": "Reported by a user",
        "state": "open",
        "assignee": null,
        "labels": [{"name": "bug"}],
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": updated_at,
    })
}

/// Lines of the target's JSONL file.
pub fn target_items(temp: &TempDir) -> Vec<serde_json::Value> {
    let path = temp.path().join("items.jsonl");
    if !path.exists() {
        return Vec::new();
    }
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}
