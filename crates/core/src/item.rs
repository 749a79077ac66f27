// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Item types shared by both trackers.
//!
//! An [`Item`] is the uniform view of an issue on either side. Writes are
//! expressed as an [`ItemDraft`] (create) or an [`ItemPatch`] (update), and
//! reads are narrowed with an [`ItemFilter`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Metadata key holding the counterpart item's id on the other tracker.
pub const COUNTERPART_KEY: &str = "wokbridge.counterpart";

/// Open/closed state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Open,
    Closed,
}

impl ItemStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Open => "open",
            ItemStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "open" | "opened" | "todo" | "in_progress" => Ok(ItemStatus::Open),
            "closed" | "done" => Ok(ItemStatus::Closed),
            _ => Err(Error::validation(
                "status",
                format!("'{}' is not one of: open, closed", s),
            )),
        }
    }
}

/// Which group of fields differs between two items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Title or body, or more than one group at once.
    Data,
    Status,
    Assignee,
    Labels,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::Data => "data",
            ConflictType::Status => "status",
            ConflictType::Assignee => "assignee",
            ConflictType::Labels => "labels",
        }
    }

    /// Collapse a set of differing groups into one conflict type.
    pub fn classify(groups: &[ConflictType]) -> ConflictType {
        match groups {
            [single] => *single,
            _ => ConflictType::Data,
        }
    }
}

/// A tracked unit of work as seen by either tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Tracker-local identifier (issue number on GitHub, prefixed id locally).
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Free-form metadata; carries the counterpart cross-reference.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Item {
    /// Creates an open item with no body, assignee, labels or metadata.
    pub fn new(id: impl Into<String>, title: impl Into<String>, at: DateTime<Utc>) -> Self {
        Item {
            id: id.into(),
            title: title.into(),
            body: None,
            status: ItemStatus::Open,
            assignee: None,
            labels: BTreeSet::new(),
            created_at: at,
            updated_at: at,
            metadata: BTreeMap::new(),
        }
    }

    /// The counterpart id on the other tracker, if this item was synced before.
    pub fn counterpart(&self) -> Option<&str> {
        self.metadata
            .get(COUNTERPART_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn set_counterpart(&mut self, id: impl Into<String>) {
        self.metadata.insert(COUNTERPART_KEY.to_string(), id.into());
    }

    /// Body with surrounding whitespace removed; blank bodies read as `None`.
    pub fn normalized_body(&self) -> Option<&str> {
        self.body.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }

    /// Lowercased title with whitespace collapsed, used for heuristic matching.
    pub fn normalized_title(&self) -> String {
        self.title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Field groups that differ between `self` and `other`.
    ///
    /// Identifiers, timestamps and metadata are not content.
    pub fn differences(&self, other: &Item) -> Vec<ConflictType> {
        let mut groups = Vec::new();
        if self.title.trim() != other.title.trim() || self.normalized_body() != other.normalized_body() {
            groups.push(ConflictType::Data);
        }
        if self.status != other.status {
            groups.push(ConflictType::Status);
        }
        if self.assignee != other.assignee {
            groups.push(ConflictType::Assignee);
        }
        if self.labels != other.labels {
            groups.push(ConflictType::Labels);
        }
        groups
    }

    pub fn content_eq(&self, other: &Item) -> bool {
        self.differences(other).is_empty()
    }
}

/// Payload for creating an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ItemDraft {
    /// Copy the content of `origin` and point the new item back at it.
    pub fn from_item(origin: &Item) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(COUNTERPART_KEY.to_string(), origin.id.clone());
        ItemDraft {
            title: origin.title.clone(),
            body: origin.normalized_body().map(str::to_string),
            status: origin.status,
            assignee: origin.assignee.clone(),
            labels: origin.labels.clone(),
            metadata,
        }
    }

    /// Materialize the draft as an item with the given id and timestamp.
    pub fn into_item(self, id: impl Into<String>, at: DateTime<Utc>) -> Item {
        Item {
            id: id.into(),
            title: self.title,
            body: self.body,
            status: self.status,
            assignee: self.assignee,
            labels: self.labels,
            created_at: at,
            updated_at: at,
            metadata: self.metadata,
        }
    }
}

/// Partial update of an item.
///
/// `None` leaves a field untouched. For `body` and `assignee`, an empty string
/// clears the field. Metadata entries are merged into the existing bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ItemPatch {
    /// Overwrite every content field with the winner's values.
    pub fn replace_content(winner: &Item) -> Self {
        ItemPatch {
            title: Some(winner.title.clone()),
            body: Some(winner.normalized_body().unwrap_or_default().to_string()),
            status: Some(winner.status),
            assignee: Some(winner.assignee.clone().unwrap_or_default()),
            labels: Some(winner.labels.clone()),
            metadata: BTreeMap::new(),
        }
    }

    /// A metadata-only patch recording the counterpart id.
    pub fn link(counterpart: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(COUNTERPART_KEY.to_string(), counterpart.into());
        ItemPatch {
            metadata,
            ..ItemPatch::default()
        }
    }

    /// Add the counterpart reference to an existing patch.
    pub fn with_counterpart(mut self, counterpart: impl Into<String>) -> Self {
        self.metadata
            .insert(COUNTERPART_KEY.to_string(), counterpart.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.status.is_none()
            && self.assignee.is_none()
            && self.labels.is_none()
            && self.metadata.is_empty()
    }

    /// Apply the patch in place, bumping `updated_at`.
    pub fn apply(&self, item: &mut Item, at: DateTime<Utc>) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(body) = &self.body {
            item.body = Some(body.clone()).filter(|b| !b.trim().is_empty());
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(assignee) = &self.assignee {
            item.assignee = Some(assignee.clone()).filter(|a| !a.is_empty());
        }
        if let Some(labels) = &self.labels {
            item.labels = labels.clone();
        }
        for (key, value) in &self.metadata {
            item.metadata.insert(key.clone(), value.clone());
        }
        item.updated_at = at;
    }
}

/// Label include/exclude rules supplied by configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFilter {
    /// When non-empty, an item needs at least one of these labels.
    #[serde(default)]
    pub include: BTreeSet<String>,
    /// An item carrying any of these labels is skipped.
    #[serde(default)]
    pub exclude: BTreeSet<String>,
}

impl LabelFilter {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn matches(&self, labels: &BTreeSet<String>) -> bool {
        if !self.include.is_empty() && self.include.is_disjoint(labels) {
            return false;
        }
        self.exclude.is_disjoint(labels)
    }
}

/// Read filter passed to stores.
///
/// Stores apply what they can server-side; the orchestrator re-applies
/// [`ItemFilter::matches`] after every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFilter {
    /// Only items updated strictly after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Page size hint.
    pub limit: usize,
    #[serde(default)]
    pub labels: LabelFilter,
}

impl Default for ItemFilter {
    fn default() -> Self {
        ItemFilter {
            since: None,
            limit: 100,
            labels: LabelFilter::default(),
        }
    }
}

impl ItemFilter {
    /// Every item, with no date cutoff, page cap or label rules.
    pub fn unbounded() -> Self {
        ItemFilter {
            limit: usize::MAX,
            ..ItemFilter::default()
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.limit == usize::MAX
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(since) = self.since {
            if item.updated_at <= since {
                return false;
            }
        }
        self.labels.matches(&item.labels)
    }

    /// Stable textual form used in cache keys.
    pub fn cache_fragment(&self) -> String {
        let since = self
            .since
            .map(|s| s.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(",");
        format!(
            "since={};limit={};in={};ex={}",
            since,
            self.limit,
            join(&self.labels.include),
            join(&self.labels.exclude)
        )
    }
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
