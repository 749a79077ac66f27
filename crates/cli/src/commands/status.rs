// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt::Write as _;

use serde::Serialize;
use wb_core::result::SyncRecord;
use wb_core::{BreakerConfig, CacheStats};

use crate::cli::OutputFormat;
use crate::config::{CacheBackendKind, Config};
use crate::error::Result;

use super::history::success_rate;
use super::{open_cache, recorder};

/// What `wokbridge status` reports.
///
/// Breakers live only as long as one process, so the configured thresholds
/// are shown instead of states.
#[derive(Debug, Serialize)]
pub(crate) struct StatusReport {
    pub source: Option<String>,
    pub target: String,
    pub fallback_file: Option<String>,
    pub direction: String,
    pub strategy: String,
    pub cache_backend: CacheBackendKind,
    pub cache: CacheStats,
    #[serde(with = "breaker_settings")]
    pub breaker: BreakerConfig,
    pub recent_syncs: Vec<SyncRecord>,
    pub success_rate: f64,
}

mod breaker_settings {
    use serde::ser::SerializeStruct;
    use serde::Serializer;
    use wb_core::BreakerConfig;

    pub fn serialize<S: Serializer>(config: &BreakerConfig, s: S) -> Result<S::Ok, S::Error> {
        let mut state = s.serialize_struct("BreakerSettings", 3)?;
        state.serialize_field("failure_threshold", &config.failure_threshold)?;
        state.serialize_field("failure_window_secs", &config.failure_window.as_secs())?;
        state.serialize_field("cooldown_secs", &config.cooldown.as_secs())?;
        state.end()
    }
}

pub async fn run(config: &Config, output: OutputFormat) -> Result<()> {
    let report = collect(config).await?;
    match output {
        OutputFormat::Text => print!("{}", format_report(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

pub(crate) async fn collect(config: &Config) -> Result<StatusReport> {
    let cache = open_cache(config)?.stats().await?;
    let recent_syncs = recorder(config).read_recent(config.history.limit)?;

    let source = config
        .source
        .is_configured()
        .then(|| format!("github {}/{}", config.source.owner, config.source.repo));

    Ok(StatusReport {
        source,
        target: config.target.binary.clone(),
        fallback_file: config.fallback_path().map(|p| p.display().to_string()),
        direction: config.sync.direction.clone(),
        strategy: config.sync.strategy.clone(),
        cache_backend: config.cache.backend,
        cache,
        breaker: config.reliability_config().breaker,
        success_rate: success_rate(&recent_syncs),
        recent_syncs,
    })
}

pub(crate) fn format_report(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Source:    {}",
        report.source.as_deref().unwrap_or("(not configured)")
    );
    match &report.fallback_file {
        Some(file) => {
            let _ = writeln!(out, "Target:    {} (fallback: {})", report.target, file);
        }
        None => {
            let _ = writeln!(out, "Target:    {}", report.target);
        }
    }
    let _ = writeln!(out, "Direction: {}", report.direction);
    let _ = writeln!(out, "Strategy:  {}", report.strategy);
    let _ = writeln!(
        out,
        "Cache:     {} entries, {} bytes",
        report.cache.entries, report.cache.total_size
    );
    let _ = writeln!(
        out,
        "Breakers:  open after {} failures, cooldown {}s",
        report.breaker.failure_threshold,
        report.breaker.cooldown.as_secs()
    );
    if report.recent_syncs.is_empty() {
        out.push_str("History:   no runs recorded\n");
    } else {
        let _ = writeln!(
            out,
            "History:   {} runs, {:.0}% successful",
            report.recent_syncs.len(),
            report.success_rate * 100.0
        );
    }
    out
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
