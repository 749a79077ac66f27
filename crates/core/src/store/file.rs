// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Plain JSONL file used as the Target when no tracker binary is available.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::{IssueStore, StoreFuture};
use crate::error::{Error, Result};
use crate::item::{Item, ItemDraft, ItemFilter, ItemPatch};
use crate::jsonl;

/// Whether `prefix` can start item ids: two or more lowercase letters or
/// digits, at least one of them a letter.
pub fn validate_prefix(prefix: &str) -> bool {
    prefix.len() >= 2
        && prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && prefix.chars().any(|c| c.is_ascii_lowercase())
}

/// `{prefix}-{8 hex}` from SHA-256 of title and creation time, with `-2`,
/// `-3`... appended until the id is free.
fn allocate_id(prefix: &str, title: &str, at: &DateTime<Utc>, taken: &HashSet<String>) -> String {
    let digest = Sha256::digest(format!("{}{}", title, at.to_rfc3339()).as_bytes());
    let base = format!("{}-{}", prefix, hex::encode(&digest[..4]));
    if !taken.contains(&base) {
        return base;
    }
    (2u32..)
        .map(|n| format!("{}-{}", base, n))
        .find(|id| !taken.contains(id))
        .unwrap_or(base)
}

/// A comment kept next to the item file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub body: String,
    pub at: DateTime<Utc>,
}

/// Items stored one per line; every write rewrites the file.
pub struct FileStore {
    path: PathBuf,
    prefix: String,
    /// Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if !validate_prefix(&prefix) {
            return Err(Error::validation(
                "prefix",
                format!(
                    "'{}' must be 2+ lowercase letters or digits with at least one letter",
                    prefix
                ),
            ));
        }
        Ok(FileStore {
            path: path.into(),
            prefix,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn comments_path(&self) -> PathBuf {
        self.path.with_extension("comments.jsonl")
    }

    fn load(&self) -> Result<Vec<Item>> {
        jsonl::read_all(&self.path)
    }

    pub fn comments(&self) -> Result<Vec<CommentRecord>> {
        jsonl::read_all(&self.comments_path())
    }

    fn not_found(&self, id: &str) -> Error {
        Error::NotFound(format!("item {} in {}", id, self.path.display()))
    }

    /// Load, change one item and save, returning the changed item.
    async fn modify(&self, id: &str, f: impl FnOnce(&mut Item)) -> Result<Item> {
        let _guard = self.lock.lock().await;
        let mut items = self.load()?;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| self.not_found(id))?;
        f(item);
        let updated = item.clone();
        jsonl::write_all(&self.path, &items)?;
        Ok(updated)
    }
}

impl IssueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    fn list_items<'a>(&'a self, filter: &'a ItemFilter) -> StoreFuture<'a, Vec<Item>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut items: Vec<Item> = self
                .load()?
                .into_iter()
                .filter(|i| filter.matches(i))
                .collect();
            items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            items.truncate(filter.limit);
            Ok(items)
        })
    }

    fn get_item<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Item> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            self.load()?
                .into_iter()
                .find(|i| i.id == id)
                .ok_or_else(|| self.not_found(id))
        })
    }

    fn create_item<'a>(&'a self, draft: &'a ItemDraft) -> StoreFuture<'a, Item> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut items = self.load()?;
            let now = Utc::now();
            let taken: HashSet<String> = items.iter().map(|i| i.id.clone()).collect();
            let id = allocate_id(&self.prefix, &draft.title, &now, &taken);

            let item = draft.clone().into_item(id, now);
            items.push(item.clone());
            jsonl::write_all(&self.path, &items)?;
            tracing::debug!("created {} in {}", item.id, self.path.display());
            Ok(item)
        })
    }

    fn update_item<'a>(&'a self, id: &'a str, patch: &'a ItemPatch) -> StoreFuture<'a, Item> {
        Box::pin(async move { self.modify(id, |item| patch.apply(item, Utc::now())).await })
    }

    fn add_comment<'a>(&'a self, id: &'a str, body: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            if !self.load()?.iter().any(|i| i.id == id) {
                return Err(self.not_found(id));
            }
            let record = CommentRecord {
                id: id.to_string(),
                body: body.to_string(),
                at: Utc::now(),
            };
            jsonl::append(&self.comments_path(), &record)
        })
    }

    fn add_labels<'a>(&'a self, id: &'a str, labels: &'a [String]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.modify(id, |item| {
                item.labels.extend(labels.iter().cloned());
                item.updated_at = Utc::now();
            })
            .await
            .map(|_| ())
        })
    }

    fn remove_label<'a>(&'a self, id: &'a str, label: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.modify(id, |item| {
                if item.labels.remove(label) {
                    item.updated_at = Utc::now();
                }
            })
            .await
            .map(|_| ())
        })
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
