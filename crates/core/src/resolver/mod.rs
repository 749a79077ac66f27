// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict resolution by named strategy.
//!
//! The strategy for a conflict is chosen in priority order: the caller's
//! explicit choice, then the conflict's own preference, then the configured
//! fallback. A strategy that is unknown, cannot handle the conflict or fails
//! hands over to the fallback, and `manual` backs up the fallback itself.

mod strategy;

pub use strategy::{
    merge_items, Manual, Merge, Resolution, ResolutionStrategy, SourceWins, TargetWins, Timestamp,
    MERGE_SEPARATOR,
};

use crate::result::SyncConflict;

/// Strategy used when nothing else is configured.
pub const DEFAULT_FALLBACK: &str = "manual";

/// Registry of resolution strategies.
pub struct ConflictResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    fallback: String,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK)
    }
}

impl ConflictResolver {
    /// Registry holding the built-in strategies.
    pub fn new(fallback: impl Into<String>) -> Self {
        let mut resolver = ConflictResolver {
            strategies: Vec::new(),
            fallback: fallback.into(),
        };
        resolver.register(Box::new(SourceWins));
        resolver.register(Box::new(TargetWins));
        resolver.register(Box::new(Timestamp));
        resolver.register(Box::new(Merge));
        resolver.register(Box::new(Manual));
        resolver
    }

    /// Add a strategy, replacing any existing one with the same name.
    pub fn register(&mut self, strategy: Box<dyn ResolutionStrategy>) {
        match self.strategies.iter().position(|s| s.name() == strategy.name()) {
            Some(i) => self.strategies[i] = strategy,
            None => self.strategies.push(strategy),
        }
    }

    /// Registered strategy names, in registration order.
    pub fn strategies(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn has_strategy(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    fn get(&self, name: &str) -> Option<&dyn ResolutionStrategy> {
        self.strategies
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    /// Try one named strategy, returning `None` when it cannot settle the conflict.
    fn attempt(&self, name: &str, conflict: &SyncConflict) -> Option<Resolution> {
        let Some(strategy) = self.get(name) else {
            tracing::warn!("unknown conflict strategy '{}'", name);
            return None;
        };
        if !strategy.can_handle(conflict) {
            tracing::debug!(
                "strategy {} cannot handle {} <-> {}",
                name,
                conflict.source_id,
                conflict.target_id
            );
            return None;
        }
        match strategy.resolve(conflict) {
            Ok(resolution) => Some(resolution),
            Err(e) => {
                tracing::warn!("strategy {} failed: {}", name, e);
                None
            }
        }
    }

    /// Resolve a conflict. Always produces an outcome; `manual` is the last resort.
    pub fn resolve(&self, conflict: &SyncConflict, strategy: Option<&str>) -> Resolution {
        let requested = strategy
            .or(conflict.preferred_strategy.as_deref())
            .unwrap_or(&self.fallback);

        if let Some(resolution) = self.attempt(requested, conflict) {
            return resolution;
        }
        if requested != self.fallback {
            if let Some(resolution) = self.attempt(&self.fallback, conflict) {
                return resolution;
            }
        }
        manual(conflict)
    }
}

fn manual(conflict: &SyncConflict) -> Resolution {
    match Manual.resolve(conflict) {
        Ok(resolution) => resolution,
        Err(e) => Resolution {
            success: false,
            action: crate::result::ResolutionAction::Manual,
            strategy: Manual.name().to_string(),
            data: None,
            error: Some(e.to_string()),
            details: None,
        },
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
