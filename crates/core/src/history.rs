// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence hook for finished sync runs.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::jsonl;
use crate::result::{SyncRecord, SyncResult};

/// Receives a summary of every finished run.
///
/// The orchestrator logs and ignores recorder failures; a run's outcome never
/// depends on its history being written.
pub trait SyncRecorder: Send + Sync {
    fn record_sync_result(&self, result: &SyncResult) -> Result<()>;
}

/// Appends one [`SyncRecord`] per run to a JSONL file.
#[derive(Debug, Clone)]
pub struct JsonlRecorder {
    path: PathBuf,
}

impl JsonlRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonlRecorder { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last `limit` records, oldest first.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<SyncRecord>> {
        jsonl::read_tail(&self.path, limit)
    }
}

impl SyncRecorder for JsonlRecorder {
    fn record_sync_result(&self, result: &SyncResult) -> Result<()> {
        jsonl::append(&self.path, &result.record())
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
