// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-process store with call accounting and failure injection.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;

use super::{IssueStore, StoreFuture};
use crate::error::{Error, Result};
use crate::item::{Item, ItemDraft, ItemFilter, ItemPatch};

const WRITE_OPERATIONS: [&str; 5] = ["create", "update", "comment", "label", "unlabel"];

struct Failure {
    op: &'static str,
    /// Item id (or draft title for creates) the failure is limited to.
    key: Option<String>,
    remaining: Option<usize>,
    make: fn() -> Error,
}

#[derive(Default)]
struct State {
    items: Vec<Item>,
    comments: HashMap<String, Vec<String>>,
    calls: HashMap<&'static str, usize>,
    failures: Vec<Failure>,
    next_id: u64,
}

/// Items kept in memory, in insertion order.
pub struct MemoryStore {
    name: String,
    prefix: Option<String>,
    latency: Option<Duration>,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Store whose created items get plain numeric ids.
    pub fn new(name: impl Into<String>) -> Self {
        MemoryStore {
            name: name.into(),
            prefix: None,
            latency: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Created items get `{prefix}-{n}` ids.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_items(self, items: impl IntoIterator<Item = Item>) -> Self {
        for item in items {
            self.insert(item);
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace an item without counting a call.
    pub fn insert(&self, item: Item) {
        let mut state = self.lock();
        if let Ok(n) = item.id.rsplit('-').next().unwrap_or_default().parse::<u64>() {
            state.next_id = state.next_id.max(n);
        }
        match state.items.iter().position(|i| i.id == item.id) {
            Some(i) => state.items[i] = item,
            None => state.items.push(item),
        }
    }

    pub fn items(&self) -> Vec<Item> {
        self.lock().items.clone()
    }

    pub fn item(&self, id: &str) -> Option<Item> {
        self.lock().items.iter().find(|i| i.id == id).cloned()
    }

    pub fn comments(&self, id: &str) -> Vec<String> {
        self.lock().comments.get(id).cloned().unwrap_or_default()
    }

    /// Number of calls made to `op`, including failed ones.
    pub fn calls(&self, op: &str) -> usize {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn write_calls(&self) -> usize {
        WRITE_OPERATIONS.iter().map(|op| self.calls(op)).sum()
    }

    /// Make every call to `op` fail.
    pub fn fail(&self, op: &'static str, make: fn() -> Error) {
        self.push_failure(op, None, None, make);
    }

    /// Make the next `times` calls to `op` fail.
    pub fn fail_times(&self, op: &'static str, times: usize, make: fn() -> Error) {
        self.push_failure(op, None, Some(times), make);
    }

    /// Make calls to `op` fail for one item id (or draft title for `create`).
    pub fn fail_key(&self, op: &'static str, key: impl Into<String>, make: fn() -> Error) {
        self.push_failure(op, Some(key.into()), None, make);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    fn push_failure(
        &self,
        op: &'static str,
        key: Option<String>,
        remaining: Option<usize>,
        make: fn() -> Error,
    ) {
        self.lock().failures.push(Failure {
            op,
            key,
            remaining,
            make,
        });
    }

    /// Count the call and return an injected failure if one applies.
    async fn enter(&self, op: &'static str, key: Option<&str>) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;

        let hit = state.failures.iter_mut().find(|f| {
            f.op == op
                && f.remaining != Some(0)
                && f.key.as_deref().map_or(true, |k| Some(k) == key)
        });
        match hit {
            Some(failure) => {
                if let Some(n) = failure.remaining.as_mut() {
                    *n -= 1;
                }
                Err((failure.make)())
            }
            None => Ok(()),
        }
    }

    fn next_id(state: &mut State, prefix: Option<&str>) -> String {
        state.next_id += 1;
        match prefix {
            Some(prefix) => format!("{}-{}", prefix, state.next_id),
            None => state.next_id.to_string(),
        }
    }

    fn with_item<T>(&self, id: &str, f: impl FnOnce(&mut Item) -> T) -> Result<T> {
        let mut state = self.lock();
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::NotFound(format!("{} item {}", self.name, id)))?;
        Ok(f(item))
    }
}

impl IssueStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_items<'a>(&'a self, filter: &'a ItemFilter) -> StoreFuture<'a, Vec<Item>> {
        Box::pin(async move {
            self.enter("list", None).await?;
            Ok(self
                .lock()
                .items
                .iter()
                .filter(|i| filter.matches(i))
                .take(filter.limit)
                .cloned()
                .collect())
        })
    }

    fn get_item<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Item> {
        Box::pin(async move {
            self.enter("get", Some(id)).await?;
            self.item(id)
                .ok_or_else(|| Error::NotFound(format!("{} item {}", self.name, id)))
        })
    }

    fn create_item<'a>(&'a self, draft: &'a ItemDraft) -> StoreFuture<'a, Item> {
        Box::pin(async move {
            self.enter("create", Some(&draft.title)).await?;
            let mut state = self.lock();
            let id = Self::next_id(&mut state, self.prefix.as_deref());
            let item = draft.clone().into_item(id, Utc::now());
            state.items.push(item.clone());
            Ok(item)
        })
    }

    fn update_item<'a>(&'a self, id: &'a str, patch: &'a ItemPatch) -> StoreFuture<'a, Item> {
        Box::pin(async move {
            self.enter("update", Some(id)).await?;
            self.with_item(id, |item| {
                patch.apply(item, Utc::now());
                item.clone()
            })
        })
    }

    fn add_comment<'a>(&'a self, id: &'a str, body: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.enter("comment", Some(id)).await?;
            self.with_item(id, |_| ())?;
            self.lock()
                .comments
                .entry(id.to_string())
                .or_default()
                .push(body.to_string());
            Ok(())
        })
    }

    fn add_labels<'a>(&'a self, id: &'a str, labels: &'a [String]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.enter("label", Some(id)).await?;
            self.with_item(id, |item| {
                item.labels.extend(labels.iter().cloned());
                item.updated_at = Utc::now();
            })
        })
    }

    fn remove_label<'a>(&'a self, id: &'a str, label: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.enter("unlabel", Some(id)).await?;
            self.with_item(id, |item| {
                if item.labels.remove(label) {
                    item.updated_at = Utc::now();
                }
            })
        })
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
