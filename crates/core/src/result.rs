// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outcome types of a sync run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::item::{ConflictType, Item};
use crate::options::SyncDirection;

/// What a conflict resolution decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionAction {
    SourceWins,
    TargetWins,
    Merged,
    /// Left for a human; nothing is written this pass.
    Manual,
}

impl ResolutionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionAction::SourceWins => "source-wins",
            ResolutionAction::TargetWins => "target-wins",
            ResolutionAction::Merged => "merged",
            ResolutionAction::Manual => "manual",
        }
    }
}

/// A matched pair whose content disagrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub source_id: String,
    pub target_id: String,
    pub kind: ConflictType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Item>,
    /// Strategy this conflict asks for when the caller names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_strategy: Option<String>,
    /// Set once a resolver has looked at the conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionAction>,
    /// Structured description from a manual resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SyncConflict {
    /// Build a conflict between two matched items.
    pub fn between(source: &Item, target: &Item) -> Self {
        SyncConflict {
            source_id: source.id.clone(),
            target_id: target.id.clone(),
            kind: ConflictType::classify(&source.differences(target)),
            source: Some(source.clone()),
            target: Some(target.clone()),
            preferred_strategy: None,
            resolution: None,
            details: None,
        }
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub direction: Option<SyncDirection>,
    pub dry_run: bool,
    pub items_processed: usize,
    pub items_created: usize,
    pub items_updated: usize,
    /// Deletions are never propagated; kept for reporting parity.
    pub items_deleted: usize,
    /// Conflicts left unresolved this pass.
    pub conflicts: Vec<SyncConflict>,
    /// Conflicts the resolver settled, annotated with the action taken.
    pub resolved: Vec<SyncConflict>,
    pub errors: Vec<String>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub timestamp: DateTime<Utc>,
}

impl SyncResult {
    pub fn start(at: DateTime<Utc>) -> Self {
        SyncResult {
            success: true,
            direction: None,
            dry_run: false,
            items_processed: 0,
            items_created: 0,
            items_updated: 0,
            items_deleted: 0,
            conflicts: Vec::new(),
            resolved: Vec::new(),
            errors: Vec::new(),
            duration: Duration::ZERO,
            cache_hits: 0,
            cache_misses: 0,
            timestamp: at,
        }
    }

    /// Record an unrecoverable condition.
    pub fn fail(&mut self, entry: String) {
        self.success = false;
        self.errors.push(entry);
    }

    pub fn record(&self) -> SyncRecord {
        SyncRecord {
            timestamp: self.timestamp,
            success: self.success,
            direction: self.direction,
            dry_run: self.dry_run,
            items_processed: self.items_processed,
            items_created: self.items_created,
            items_updated: self.items_updated,
            conflicts: self.conflicts.len(),
            errors: self.errors.len(),
            duration_ms: duration_millis(self.duration),
        }
    }
}

/// Compact summary of a run kept in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub direction: Option<SyncDirection>,
    #[serde(default)]
    pub dry_run: bool,
    pub items_processed: usize,
    pub items_created: usize,
    pub items_updated: usize,
    pub conflicts: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(super::duration_millis(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
