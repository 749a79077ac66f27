// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable storage behind the [`Cache`](super::Cache).
//!
//! Backends store whole [`CacheEntry`] values and know nothing about expiry;
//! the cache decides what is stale.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// One cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    /// Serialized size of `value` in bytes.
    pub size: usize,
}

impl CacheEntry {
    pub fn new(key: String, value: serde_json::Value, expires_at: DateTime<Utc>) -> Self {
        let size = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        CacheEntry {
            key,
            value,
            expires_at,
            size,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Storage trait for cache entries.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    fn insert(&mut self, entry: CacheEntry) -> Result<()>;

    /// Returns true if the key was present.
    fn remove(&mut self, key: &str) -> Result<bool>;

    fn keys(&self) -> Result<Vec<String>>;

    fn clear(&mut self) -> Result<()>;

    /// Sum of entry sizes in bytes.
    fn total_size(&self) -> Result<usize>;

    fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for key in self.keys()? {
            if let Some(entry) = self.get(&key)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

/// Plain in-memory map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, CacheEntry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).cloned())
    }

    fn insert(&mut self, entry: CacheEntry) -> Result<()> {
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn total_size(&self) -> Result<usize> {
        Ok(self.entries.values().map(|e| e.size).sum())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

/// One JSON file per entry, named by the SHA-256 of the key.
///
/// An in-memory index of key to size avoids reading every file for
/// `keys` and `total_size`.
#[derive(Debug)]
pub struct DiskBackend {
    dir: PathBuf,
    index: HashMap<String, usize>,
}

impl DiskBackend {
    /// Open (creating if needed) a cache directory and index existing entries.
    ///
    /// Unreadable files are skipped and removed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let mut index = HashMap::new();
        for dirent in fs::read_dir(dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_entry(&path) {
                Ok(entry) => {
                    index.insert(entry.key, entry.size);
                }
                Err(e) => {
                    tracing::warn!("dropping unreadable cache file {}: {}", path.display(), e);
                    let _ = fs::remove_file(&path);
                }
            }
        }
        Ok(DiskBackend {
            dir: dir.to_path_buf(),
            index,
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let hash = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(hash)))
    }
}

fn read_entry(path: &Path) -> Result<CacheEntry> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl CacheBackend for DiskBackend {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        if !self.index.contains_key(key) {
            return Ok(None);
        }
        match read_entry(&self.path_for(key)) {
            Ok(entry) => Ok(Some(entry)),
            Err(crate::error::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn insert(&mut self, entry: CacheEntry) -> Result<()> {
        let path = self.path_for(&entry.key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &path)?;
        self.index.insert(entry.key, entry.size);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        if self.index.remove(key).is_none() {
            return Ok(false);
        }
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.index.keys().cloned().collect())
    }

    fn clear(&mut self) -> Result<()> {
        let keys: Vec<String> = self.index.keys().cloned().collect();
        for key in keys {
            self.remove(&key)?;
        }
        Ok(())
    }

    fn total_size(&self) -> Result<usize> {
        Ok(self.index.values().sum())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.index.len())
    }
}

/// Bounded in-memory hot set that spills its oldest entries to disk.
#[derive(Debug)]
pub struct HybridBackend {
    hot: MemoryBackend,
    /// Hot keys, oldest first.
    order: VecDeque<String>,
    capacity: usize,
    cold: DiskBackend,
}

impl HybridBackend {
    pub fn open(dir: &Path, capacity: usize) -> Result<Self> {
        Ok(HybridBackend {
            hot: MemoryBackend::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            cold: DiskBackend::open(dir)?,
        })
    }

    /// Number of entries currently held in memory.
    pub fn hot_len(&self) -> usize {
        self.order.len()
    }

    fn forget_hot(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }
}

impl CacheBackend for HybridBackend {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.hot.get(key)? {
            Some(entry) => Ok(Some(entry)),
            None => self.cold.get(key),
        }
    }

    fn insert(&mut self, entry: CacheEntry) -> Result<()> {
        let key = entry.key.clone();
        self.cold.remove(&key)?;
        self.forget_hot(&key);
        self.hot.insert(entry)?;
        self.order.push_back(key);

        while self.order.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(spilled) = self.hot.get(&oldest)? {
                self.hot.remove(&oldest)?;
                self.cold.insert(spilled)?;
            }
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        self.forget_hot(key);
        let in_hot = self.hot.remove(key)?;
        let in_cold = self.cold.remove(key)?;
        Ok(in_hot || in_cold)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = self.hot.keys()?;
        keys.extend(self.cold.keys()?);
        Ok(keys)
    }

    fn clear(&mut self) -> Result<()> {
        self.order.clear();
        self.hot.clear()?;
        self.cold.clear()
    }

    fn total_size(&self) -> Result<usize> {
        Ok(self.hot.total_size()? + self.cold.total_size()?)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.hot.len()? + self.cold.len()?)
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
