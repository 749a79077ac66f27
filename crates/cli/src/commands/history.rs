// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use wb_core::result::SyncRecord;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::Result;

use super::recorder;

pub fn run(config: &Config, limit: usize, output: OutputFormat) -> Result<()> {
    let records = recorder(config).read_recent(limit)?;

    match output {
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No sync runs recorded.");
            }
            for record in &records {
                println!("{}", format_record(record));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
    }
    Ok(())
}

pub(crate) fn format_record(record: &SyncRecord) -> String {
    let direction = record.direction.map(|d| d.as_str()).unwrap_or("-");
    format!(
        "{}  {:<16} {:<6}{} processed {} created {} updated {} conflicts {} errors {}  {}ms",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        direction,
        if record.success { "ok" } else { "failed" },
        if record.dry_run { " (dry run)" } else { "" },
        record.items_processed,
        record.items_created,
        record.items_updated,
        record.conflicts,
        record.errors,
        record.duration_ms
    )
}

/// Share of successful runs, 0 when there are none.
pub(crate) fn success_rate(records: &[SyncRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let ok = records.iter().filter(|r| r.success).count();
    ok as f64 / records.len() as f64
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
