// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! A store wrapped with the shared cache and reliability layer.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{IssueStore, Side};
use crate::cache::{self, Cache};
use crate::error::Result;
use crate::item::{Item, ItemDraft, ItemFilter, ItemPatch};
use crate::reliability::Reliability;

/// Reads are served from the cache when possible; every store call runs
/// under [`Reliability::call`] with a `"{side}.{operation}"` label.
pub struct StoreAdapter {
    side: Side,
    store: Arc<dyn IssueStore>,
    cache: Arc<Cache>,
    reliability: Arc<Reliability>,
    ttl: Option<Duration>,
    /// Ids written since the last invalidation.
    written: Mutex<BTreeSet<String>>,
}

impl StoreAdapter {
    pub fn new(
        side: Side,
        store: Arc<dyn IssueStore>,
        cache: Arc<Cache>,
        reliability: Arc<Reliability>,
    ) -> Self {
        StoreAdapter {
            side,
            store,
            cache,
            reliability,
            ttl: None,
            written: Mutex::new(BTreeSet::new()),
        }
    }

    /// Cache reads for `ttl` instead of the cache's default.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    fn label(&self, operation: &str) -> String {
        format!("{}.{}", self.side, operation)
    }

    fn written(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.written.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self, id: &str) {
        self.written().insert(id.to_string());
    }

    async fn remember<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.set(key, value, self.ttl).await {
            tracing::warn!("failed to cache {}: {}", key, e);
        }
    }

    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        let key = cache::list_key(self.side.as_str(), filter);
        if let Some(items) = self.cache.get::<Vec<Item>>(&key).await {
            tracing::debug!("{} list served from cache ({} items)", self.side, items.len());
            return Ok(items);
        }

        let items = self
            .reliability
            .call(&self.label("list"), || self.store.list_items(filter))
            .await?;
        self.remember(&key, &items).await;
        Ok(items)
    }

    pub async fn get_item(&self, id: &str) -> Result<Item> {
        let key = cache::item_key(self.side.as_str(), id);
        if let Some(item) = self.cache.get::<Item>(&key).await {
            return Ok(item);
        }

        let item = self
            .reliability
            .call(&self.label("get"), || self.store.get_item(id))
            .await?;
        self.remember(&key, &item).await;
        Ok(item)
    }

    pub async fn create_item(&self, draft: &ItemDraft) -> Result<Item> {
        let item = self
            .reliability
            .call(&self.label("create"), || self.store.create_item(draft))
            .await?;
        self.touch(&item.id);
        Ok(item)
    }

    pub async fn update_item(&self, id: &str, patch: &ItemPatch) -> Result<Item> {
        let result = self
            .reliability
            .call(&self.label("update"), || self.store.update_item(id, patch))
            .await;
        // A failed update may still have landed
        self.touch(id);
        result
    }

    pub async fn add_comment(&self, id: &str, body: &str) -> Result<()> {
        self.reliability
            .call(&self.label("comment"), || self.store.add_comment(id, body))
            .await?;
        self.touch(id);
        Ok(())
    }

    pub async fn add_labels(&self, id: &str, labels: &[String]) -> Result<()> {
        self.reliability
            .call(&self.label("label"), || self.store.add_labels(id, labels))
            .await?;
        self.touch(id);
        Ok(())
    }

    pub async fn remove_label(&self, id: &str, label: &str) -> Result<()> {
        self.reliability
            .call(&self.label("label"), || self.store.remove_label(id, label))
            .await?;
        self.touch(id);
        Ok(())
    }

    /// Ids written since the last [`StoreAdapter::invalidate_written`].
    pub fn written_ids(&self) -> Vec<String> {
        self.written().iter().cloned().collect()
    }

    /// Drop this side's cached lists and the cached items that were written.
    ///
    /// Does nothing when nothing was written. Returns the number of entries
    /// removed.
    pub async fn invalidate_written(&self) -> Result<usize> {
        let ids: Vec<String> = std::mem::take(&mut *self.written()).into_iter().collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let escaped: Vec<String> = ids.iter().map(|id| regex::escape(id)).collect();
        let pattern = format!(
            "^{}:(list:|item:({})$)",
            regex::escape(self.side.as_str()),
            escaped.join("|")
        );
        let removed = self.cache.invalidate_pattern(&pattern).await?;
        tracing::debug!(
            "{} wrote {} items, invalidated {} cache entries",
            self.side,
            ids.len(),
            removed
        );
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
