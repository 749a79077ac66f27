// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use wb_core::CacheStats;

use crate::cli::{CacheCommand, OutputFormat};
use crate::config::Config;
use crate::error::Result;

use super::open_cache;

pub async fn run(config: &Config, command: CacheCommand) -> Result<()> {
    let cache = open_cache(config)?;

    match command {
        CacheCommand::Stats { output } => {
            let stats = cache.stats().await?;
            match output {
                OutputFormat::Text => print!("{}", format_stats(&stats)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            }
        }
        CacheCommand::Clear => {
            cache.clear().await?;
            println!("Cleared cache");
        }
        CacheCommand::Export { path } => {
            let count = cache.export_cache(&path).await?;
            println!("Exported {} entries to {}", count, path.display());
        }
        CacheCommand::Import { path } => {
            let count = cache.import_cache(&path).await?;
            println!("Imported {} entries from {}", count, path.display());
        }
        CacheCommand::Invalidate { pattern } => {
            let count = cache.invalidate_pattern(&pattern).await?;
            println!("Invalidated {} entries", count);
        }
    }
    Ok(())
}

pub(crate) fn format_stats(stats: &CacheStats) -> String {
    format!(
        "entries:  {}\nsize:     {} bytes\nhits:     {}\nmisses:   {}\nhit rate: {:.1}%\n",
        stats.entries,
        stats.total_size,
        stats.hits,
        stats.misses,
        stats.hit_rate * 100.0
    )
}
