// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON Lines files used by the file store and the sync history.
//!
//! Appends are fsynced; whole-file rewrites go through a temporary sibling
//! and a rename so readers never see a truncated file.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Append one record, creating the file and its directory if needed.
pub fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let json = serde_json::to_string(record)?;
    writeln!(file, "{json}")?;
    file.sync_all()?;

    Ok(())
}

/// Read every record. A missing file reads as empty.
pub fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for_each_line(path, |record| records.push(record))?;
    Ok(records)
}

/// Read the last `limit` records, oldest first.
pub fn read_tail<T: DeserializeOwned>(path: &Path, limit: usize) -> Result<Vec<T>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let mut tail = VecDeque::with_capacity(limit.min(1024));
    for_each_line(path, |record| {
        if tail.len() == limit {
            tail.pop_front();
        }
        tail.push_back(record);
    })?;
    Ok(tail.into())
}

fn for_each_line<T, F>(path: &Path, mut f: F) -> Result<()>
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        f(serde_json::from_str(&line)?);
    }
    Ok(())
}

/// Replace the file's content with `records`.
pub fn write_all<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut file = File::create(&tmp)?;
        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(file, "{json}")?;
        }
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    Ok(())
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
