// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt::Write as _;

use wb_core::{SyncConflict, SyncResult};

use crate::cli::{OutputFormat, SyncArgs};
use crate::config::Config;
use crate::error::{Error, Result};

use super::build_orchestrator;

pub async fn run(config: &Config, args: SyncArgs) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let options = config.sync_options(&args);
    let result = orchestrator.execute_sync(options).await?;

    match args.output {
        OutputFormat::Text => print!("{}", format_result(&result)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if result.success {
        Ok(())
    } else {
        Err(Error::SyncFailed {
            errors: result.errors.len(),
        })
    }
}

fn format_conflict(conflict: &SyncConflict) -> String {
    let outcome = conflict
        .resolution
        .map(|r| r.as_str())
        .unwrap_or("unresolved");
    format!(
        "{} <-> {} ({}): {}",
        conflict.source_id,
        conflict.target_id,
        conflict.kind.as_str(),
        outcome
    )
}

/// Human-readable summary of a run.
pub(crate) fn format_result(result: &SyncResult) -> String {
    let mut out = String::new();
    let direction = result
        .direction
        .map(|d| d.as_str())
        .unwrap_or("sync");
    let _ = writeln!(
        out,
        "{}{}: {}",
        direction,
        if result.dry_run { " (dry run)" } else { "" },
        if result.success { "ok" } else { "failed" }
    );
    let _ = writeln!(
        out,
        "  processed {}, created {}, updated {}, resolved {}, conflicts {}",
        result.items_processed,
        result.items_created,
        result.items_updated,
        result.resolved.len(),
        result.conflicts.len()
    );
    let _ = writeln!(
        out,
        "  cache {} hits / {} misses, {}ms",
        result.cache_hits,
        result.cache_misses,
        result.duration.as_millis()
    );

    if !result.conflicts.is_empty() {
        out.push_str("\nConflicts:\n");
        for conflict in &result.conflicts {
            let _ = writeln!(out, "  {}", format_conflict(conflict));
        }
    }
    if !result.errors.is_empty() {
        out.push_str("\nErrors:\n");
        for entry in &result.errors {
            let _ = writeln!(out, "  {}", entry);
        }
    }
    out
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
