// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Switches to a secondary store once the primary's binary is missing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{IssueStore, StoreFuture};
use crate::error::{ErrorKind, Result};
use crate::item::{Item, ItemDraft, ItemFilter, ItemPatch};

/// Forwards to `primary` until it reports
/// [`BinaryUnavailable`](crate::Error::BinaryUnavailable), then uses
/// `fallback` for the rest of the process lifetime.
pub struct FallbackStore {
    primary: Arc<dyn IssueStore>,
    fallback: Option<Arc<dyn IssueStore>>,
    switched: AtomicBool,
}

impl FallbackStore {
    pub fn new(primary: Arc<dyn IssueStore>, fallback: Option<Arc<dyn IssueStore>>) -> Self {
        FallbackStore {
            primary,
            fallback,
            switched: AtomicBool::new(false),
        }
    }

    /// Whether calls now go to the fallback.
    pub fn is_switched(&self) -> bool {
        self.switched.load(Ordering::SeqCst)
    }

    fn active(&self) -> &dyn IssueStore {
        match &self.fallback {
            Some(fallback) if self.is_switched() => fallback.as_ref(),
            _ => self.primary.as_ref(),
        }
    }

    async fn route<'a, T>(
        &'a self,
        call: impl Fn(&'a dyn IssueStore) -> StoreFuture<'a, T>,
    ) -> Result<T> {
        let result = call(self.active()).await;
        let fallback = match (&result, &self.fallback) {
            (Err(e), Some(fallback)) if e.kind() == ErrorKind::BinaryUnavailable => fallback,
            _ => return result,
        };

        if !self.switched.swap(true, Ordering::SeqCst) {
            if let Err(e) = &result {
                tracing::warn!(
                    "{} unavailable ({}), using {} from now on",
                    self.primary.name(),
                    e,
                    fallback.name()
                );
            }
        }
        call(fallback.as_ref()).await
    }
}

impl IssueStore for FallbackStore {
    fn name(&self) -> &str {
        self.active().name()
    }

    fn list_items<'a>(&'a self, filter: &'a ItemFilter) -> StoreFuture<'a, Vec<Item>> {
        Box::pin(self.route(move |s| s.list_items(filter)))
    }

    fn get_item<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Item> {
        Box::pin(self.route(move |s| s.get_item(id)))
    }

    fn create_item<'a>(&'a self, draft: &'a ItemDraft) -> StoreFuture<'a, Item> {
        Box::pin(self.route(move |s| s.create_item(draft)))
    }

    fn update_item<'a>(&'a self, id: &'a str, patch: &'a ItemPatch) -> StoreFuture<'a, Item> {
        Box::pin(self.route(move |s| s.update_item(id, patch)))
    }

    fn add_comment<'a>(&'a self, id: &'a str, body: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(self.route(move |s| s.add_comment(id, body)))
    }

    fn add_labels<'a>(&'a self, id: &'a str, labels: &'a [String]) -> StoreFuture<'a, ()> {
        Box::pin(self.route(move |s| s.add_labels(id, labels)))
    }

    fn remove_label<'a>(&'a self, id: &'a str, label: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(self.route(move |s| s.remove_label(id, label)))
    }
}

#[cfg(test)]
#[path = "fallback_tests.rs"]
mod tests;
