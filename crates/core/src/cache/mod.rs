// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! TTL cache for tracker responses.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ StoreAdapter│────►│    Cache    │────►│  CacheBackend    │
//! │  (reads)    │◄────│ (TTL, stats)│◄────│ memory/disk/both │
//! └─────────────┘     └─────────────┘     └──────────────────┘
//! ```
//!
//! Expiry is lazy: an expired entry is removed on the read that finds it and
//! counts as a miss. [`Cache::spawn_sweeper`] adds an optional periodic purge.
//! All mutation happens under one write lock, so a pattern invalidation is
//! observed by readers either entirely or not at all.

mod backend;

pub use backend::{CacheBackend, CacheEntry, DiskBackend, HybridBackend, MemoryBackend};

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::item::ItemFilter;

/// Default time-to-live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

const SNAPSHOT_VERSION: u32 = 1;

/// Cache key for a list call on one side.
pub fn list_key(side: &str, filter: &ItemFilter) -> String {
    format!("{}:list:{}", side, filter.cache_fragment())
}

/// Cache key for a single item on one side.
pub fn item_key(side: &str, id: &str) -> String {
    format!("{}:item:{}", side, id)
}

/// Pattern matching every key of one side.
pub fn side_pattern(side: &str) -> String {
    format!("^{}:", regex::escape(side))
}

/// Hit/miss accounting and size of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 when nothing was looked up yet.
    pub hit_rate: f64,
    pub total_size: usize,
    pub entries: usize,
}

/// Portable form written by [`Cache::export_cache`].
#[derive(Debug, Serialize, Deserialize)]
struct CacheSnapshot {
    version: u32,
    exported_at: DateTime<Utc>,
    entries: Vec<CacheEntry>,
}

/// Keyed TTL store shared by both store adapters.
pub struct Cache {
    backend: RwLock<Box<dyn CacheBackend>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Cache {
    pub fn new(backend: Box<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Cache {
            backend: RwLock::new(backend),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// In-memory cache with the default TTL.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()), DEFAULT_TTL)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn expiry(&self, ttl: Option<Duration>) -> DateTime<Utc> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn miss<T>(&self) -> Option<T> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Look up a value. Expired, unreadable or mistyped entries are misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let found = {
            let backend = self.backend.read().await;
            backend.get(key)
        };

        let entry = match found {
            Ok(Some(entry)) => entry,
            Ok(None) => return self.miss(),
            Err(e) => {
                tracing::warn!("cache read failed for {}: {}", key, e);
                return self.miss();
            }
        };

        if entry.is_expired(Utc::now()) {
            let mut backend = self.backend.write().await;
            // Re-check under the write lock; a concurrent set may have refreshed it.
            if let Ok(Some(current)) = backend.get(key) {
                if current.is_expired(Utc::now()) {
                    if let Err(e) = backend.remove(key) {
                        tracing::warn!("failed to drop expired cache entry {}: {}", key, e);
                    }
                }
            }
            return self.miss();
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                tracing::debug!("cache entry {} has unexpected shape: {}", key, e);
                self.miss()
            }
        }
    }

    /// Store a value, using the default TTL when `ttl` is `None`.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let entry = CacheEntry::new(key.to_string(), value, self.expiry(ttl));
        self.backend.write().await.insert(entry)
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.backend.write().await.remove(key)
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend.write().await.clear()
    }

    /// Remove every key matching `pattern`, returning how many were removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::validation("pattern", e.to_string()))?;

        let mut backend = self.backend.write().await;
        let mut removed = 0;
        for key in backend.keys()? {
            if regex.is_match(&key) && backend.remove(&key)? {
                removed += 1;
            }
        }
        tracing::debug!("invalidated {} cache entries matching {}", removed, pattern);
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let (total_size, entries) = {
            let backend = self.backend.read().await;
            (backend.total_size()?, backend.len()?)
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        Ok(CacheStats {
            hits,
            misses,
            hit_rate,
            total_size,
            entries,
        })
    }

    /// Current `(hits, misses)` counters.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Bulk insert of precomputed values.
    pub async fn warm(&self, entries: Vec<(String, serde_json::Value, Option<Duration>)>) -> Result<usize> {
        let mut backend = self.backend.write().await;
        let count = entries.len();
        for (key, value, ttl) in entries {
            backend.insert(CacheEntry::new(key, value, self.expiry(ttl)))?;
        }
        Ok(count)
    }

    /// Drop every expired entry.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut backend = self.backend.write().await;
        let mut purged = 0;
        for entry in backend.entries()? {
            if entry.is_expired(now) && backend.remove(&entry.key)? {
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Run [`Cache::purge_expired`] every `interval` until the handle is aborted.
    pub fn spawn_sweeper(cache: Arc<Cache>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("cache sweep purged {} entries", n),
                    Err(e) => tracing::warn!("cache sweep failed: {}", e),
                }
            }
        })
    }

    /// Write all live entries to `path` as a JSON snapshot.
    pub async fn export_cache(&self, path: &Path) -> Result<usize> {
        let now = Utc::now();
        let entries: Vec<CacheEntry> = {
            let backend = self.backend.read().await;
            backend
                .entries()?
                .into_iter()
                .filter(|e| !e.is_expired(now))
                .collect()
        };
        let count = entries.len();
        let snapshot = CacheSnapshot {
            version: SNAPSHOT_VERSION,
            exported_at: now,
            entries,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(&snapshot)?)?;
        Ok(count)
    }

    /// Load entries from a snapshot, skipping those that expired meanwhile.
    pub async fn import_cache(&self, path: &Path) -> Result<usize> {
        let bytes = std::fs::read(path)?;
        let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::validation(
                "snapshot",
                format!("unsupported cache snapshot version {}", snapshot.version),
            ));
        }

        let now = Utc::now();
        let mut backend = self.backend.write().await;
        let mut imported = 0;
        for entry in snapshot.entries {
            if entry.is_expired(now) {
                continue;
            }
            backend.insert(entry)?;
            imported += 1;
        }
        Ok(imported)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
