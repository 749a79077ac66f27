// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! wb-core: sync engine for wokbridge
//!
//! This crate keeps two issue trackers consistent: a Source (GitHub issues)
//! and a Target (a local tracker binary or JSONL file). It provides the item
//! model, the cache and reliability layers that wrap every store call, the
//! conflict resolver and the orchestrator that drives a sync pass.

pub mod cache;
pub mod error;
pub mod history;
pub mod item;
pub mod jsonl;
pub mod options;
pub mod reliability;
pub mod resolver;
pub mod result;
pub mod store;
pub mod sync;

pub use cache::{Cache, CacheStats};
pub use error::{Error, ErrorKind, Result};
pub use history::{JsonlRecorder, SyncRecorder};
pub use item::{ConflictType, Item, ItemDraft, ItemFilter, ItemPatch, ItemStatus, LabelFilter};
pub use options::{SyncDirection, SyncOptions, ValidatedOptions};
pub use reliability::{BreakerConfig, CircuitState, Reliability, ReliabilityConfig, RetryPolicy};
pub use resolver::{ConflictResolver, Resolution, ResolutionStrategy};
pub use result::{ResolutionAction, SyncConflict, SyncRecord, SyncResult};
pub use store::{IssueStore, Side, StoreAdapter};
pub use sync::{OrchestratorConfig, SyncOrchestrator, SyncPhase, SyncStatistics, SyncStatus};
