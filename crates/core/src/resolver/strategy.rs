// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in resolution strategies.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::item::Item;
use crate::result::{ResolutionAction, SyncConflict};

/// Separator placed between two differing descriptions by `merge`.
pub const MERGE_SEPARATOR: &str = "\n\n---\n\n";

/// Outcome of resolving one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub success: bool,
    pub action: ResolutionAction,
    /// Name of the strategy that produced this outcome.
    pub strategy: String,
    /// Content both sides should converge to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Resolution {
    fn settled(strategy: &str, action: ResolutionAction, data: Item) -> Self {
        Resolution {
            success: true,
            action,
            strategy: strategy.to_string(),
            data: Some(data),
            error: None,
            details: None,
        }
    }
}

/// A named way of settling a [`SyncConflict`].
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the conflict carries what this strategy needs.
    fn can_handle(&self, conflict: &SyncConflict) -> bool;

    fn resolve(&self, conflict: &SyncConflict) -> Result<Resolution>;
}

fn both_sides(conflict: &SyncConflict) -> Result<(&Item, &Item)> {
    match (&conflict.source, &conflict.target) {
        (Some(source), Some(target)) => Ok((source, target)),
        _ => Err(Error::validation(
            "conflict",
            format!(
                "{} <-> {} is missing one side's data",
                conflict.source_id, conflict.target_id
            ),
        )),
    }
}

/// Source data always survives.
pub struct SourceWins;

impl ResolutionStrategy for SourceWins {
    fn name(&self) -> &str {
        "source-wins"
    }

    fn can_handle(&self, conflict: &SyncConflict) -> bool {
        conflict.source.is_some()
    }

    fn resolve(&self, conflict: &SyncConflict) -> Result<Resolution> {
        let source = conflict
            .source
            .clone()
            .ok_or_else(|| Error::validation("conflict", "source data is missing"))?;
        Ok(Resolution::settled(self.name(), ResolutionAction::SourceWins, source))
    }
}

/// Target data always survives.
pub struct TargetWins;

impl ResolutionStrategy for TargetWins {
    fn name(&self) -> &str {
        "target-wins"
    }

    fn can_handle(&self, conflict: &SyncConflict) -> bool {
        conflict.target.is_some()
    }

    fn resolve(&self, conflict: &SyncConflict) -> Result<Resolution> {
        let target = conflict
            .target
            .clone()
            .ok_or_else(|| Error::validation("conflict", "target data is missing"))?;
        Ok(Resolution::settled(self.name(), ResolutionAction::TargetWins, target))
    }
}

/// The more recently updated side wins; equal timestamps go to Source.
pub struct Timestamp;

impl ResolutionStrategy for Timestamp {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn can_handle(&self, conflict: &SyncConflict) -> bool {
        conflict.source.is_some() && conflict.target.is_some()
    }

    fn resolve(&self, conflict: &SyncConflict) -> Result<Resolution> {
        let (source, target) = both_sides(conflict)?;
        let resolution = if source.updated_at >= target.updated_at {
            Resolution::settled(self.name(), ResolutionAction::SourceWins, source.clone())
        } else {
            Resolution::settled(self.name(), ResolutionAction::TargetWins, target.clone())
        };
        Ok(resolution)
    }
}

/// Field-level union of both sides, see [`merge_items`].
pub struct Merge;

impl ResolutionStrategy for Merge {
    fn name(&self) -> &str {
        "merge"
    }

    fn can_handle(&self, conflict: &SyncConflict) -> bool {
        conflict.source.is_some() && conflict.target.is_some()
    }

    fn resolve(&self, conflict: &SyncConflict) -> Result<Resolution> {
        let (source, target) = both_sides(conflict)?;
        Ok(Resolution::settled(
            self.name(),
            ResolutionAction::Merged,
            merge_items(source, target),
        ))
    }
}

/// Leaves the conflict for a human, describing both sides.
pub struct Manual;

impl ResolutionStrategy for Manual {
    fn name(&self) -> &str {
        "manual"
    }

    fn can_handle(&self, _conflict: &SyncConflict) -> bool {
        true
    }

    fn resolve(&self, conflict: &SyncConflict) -> Result<Resolution> {
        let describe = |item: &Option<Item>| {
            item.as_ref().map(|i| {
                json!({
                    "id": i.id,
                    "title": i.title,
                    "status": i.status,
                    "assignee": i.assignee,
                    "labels": i.labels,
                    "updated_at": i.updated_at,
                })
            })
        };
        let differences = match (&conflict.source, &conflict.target) {
            (Some(s), Some(t)) => s.differences(t),
            _ => Vec::new(),
        };

        Ok(Resolution {
            success: false,
            action: ResolutionAction::Manual,
            strategy: self.name().to_string(),
            data: None,
            error: Some(format!(
                "{} conflict between {} and {} needs manual resolution",
                conflict.kind.as_str(),
                conflict.source_id,
                conflict.target_id
            )),
            details: Some(json!({
                "kind": conflict.kind,
                "differences": differences,
                "source": describe(&conflict.source),
                "target": describe(&conflict.target),
            })),
        })
    }
}

/// Merge two items field by field.
///
/// Scalars come from Target unless Source has a value. Labels are unioned.
/// Descriptions are concatenated with [`MERGE_SEPARATOR`] when both are
/// present and differ, otherwise the non-empty one is kept.
pub fn merge_items(source: &Item, target: &Item) -> Item {
    let title = if source.title.trim().is_empty() {
        target.title.clone()
    } else {
        source.title.clone()
    };

    let body = match (source.normalized_body(), target.normalized_body()) {
        (Some(s), Some(t)) if s != t => Some(format!("{}{}{}", s, MERGE_SEPARATOR, t)),
        (Some(s), _) => Some(s.to_string()),
        (None, t) => t.map(str::to_string),
    };

    let mut labels = target.labels.clone();
    labels.extend(source.labels.iter().cloned());

    let mut metadata = target.metadata.clone();
    metadata.extend(source.metadata.clone());

    Item {
        id: source.id.clone(),
        title,
        body,
        status: source.status,
        assignee: source.assignee.clone().or_else(|| target.assignee.clone()),
        labels,
        created_at: source.created_at.min(target.created_at),
        updated_at: source.updated_at.max(target.updated_at),
        metadata,
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
