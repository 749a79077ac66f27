// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use wb_core::ConflictResolver;

use crate::config::Config;
use crate::error::Result;

use super::resolver;

pub fn run(config: &Config) -> Result<()> {
    print!("{}", format_strategies(&resolver(config)?));
    Ok(())
}

/// One name per line, the fallback marked.
pub(crate) fn format_strategies(resolver: &ConflictResolver) -> String {
    resolver
        .strategies()
        .into_iter()
        .map(|name| {
            if name == resolver.fallback() {
                format!("{} (default)\n", name)
            } else {
                format!("{}\n", name)
            }
        })
        .collect()
}
