// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tracker clients.
//!
//! Provides a trait-based store layer that enables:
//! - GitHub issues as the Source ([`GitHubStore`])
//! - an external tracker binary as the Target ([`CommandStore`]), with a
//!   JSONL file store ([`FileStore`]) as fallback ([`FallbackStore`])
//! - in-process stores for tests and dry targets ([`MemoryStore`])
//!
//! The orchestrator never talks to a store directly; every call goes through
//! a [`StoreAdapter`], which adds caching and the reliability layer.

mod adapter;
mod command;
mod fallback;
mod file;
mod github;
mod memory;

pub use adapter::StoreAdapter;
pub use command::CommandStore;
pub use fallback::FallbackStore;
pub use file::{validate_prefix, CommentRecord, FileStore};
pub use github::{GitHubConfig, GitHubStore};
pub use memory::MemoryStore;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::item::{Item, ItemDraft, ItemFilter, ItemPatch};

/// Boxed future returned by [`IssueStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Operations every tracker supports.
///
/// Failures must be reported with the [`Error`](crate::Error) taxonomy so the
/// reliability layer can tell transient faults from systemic ones.
pub trait IssueStore: Send + Sync {
    /// Short human-readable name for logs.
    fn name(&self) -> &str;

    fn list_items<'a>(&'a self, filter: &'a ItemFilter) -> StoreFuture<'a, Vec<Item>>;

    /// Fails with `NotFound` when `id` does not exist.
    fn get_item<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Item>;

    fn create_item<'a>(&'a self, draft: &'a ItemDraft) -> StoreFuture<'a, Item>;

    fn update_item<'a>(&'a self, id: &'a str, patch: &'a ItemPatch) -> StoreFuture<'a, Item>;

    fn add_comment<'a>(&'a self, id: &'a str, body: &'a str) -> StoreFuture<'a, ()>;

    fn add_labels<'a>(&'a self, id: &'a str, labels: &'a [String]) -> StoreFuture<'a, ()>;

    fn remove_label<'a>(&'a self, id: &'a str, label: &'a str) -> StoreFuture<'a, ()>;
}

/// Which tracker a store or item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }

    pub fn other(&self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
