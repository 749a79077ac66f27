// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Target client that drives an external tracker binary.
//!
//! Every operation is one process invocation. Structured payloads go to the
//! child's stdin as JSON and results come back on stdout as JSON:
//!
//! | operation      | arguments                                        | stdin  | stdout     |
//! |----------------|--------------------------------------------------|--------|------------|
//! | `list_items`   | `list --format json [--since T] [--limit N]`     |        | `[Item]`   |
//! | `get_item`     | `show <id> --format json`                        |        | `Item`     |
//! | `create_item`  | `create --format json`                           | draft  | `Item`     |
//! | `update_item`  | `update <id> --format json`                      | patch  | `Item`     |
//! | `add_comment`  | `comment <id>`                                   | text   |            |
//! | `add_labels`   | `label <id> <labels..>`                          |        |            |
//! | `remove_label` | `unlabel <id> <label>`                           |        |            |

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::process::Stdio;

use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{IssueStore, StoreFuture};
use crate::error::{Error, Result};
use crate::item::{Item, ItemDraft, ItemFilter, ItemPatch};

pub struct CommandStore {
    binary: PathBuf,
    /// Working directory for the child, when set.
    dir: Option<PathBuf>,
}

impl CommandStore {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        CommandStore {
            binary: binary.into(),
            dir: None,
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Run the binary and return its stdout on success.
    async fn run(&self, args: &[&str], input: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;
        let stdin = child.stdin.take();
        let feed = async move {
            if let (Some(input), Some(mut stdin)) = (input, stdin) {
                stdin.write_all(input).await?;
                // Dropping stdin closes it so the child sees EOF
            }
            Ok::<(), std::io::Error>(())
        };

        // Drain stdout and stderr while stdin is still being written
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        if output.status.success() {
            fed?;
            tracing::debug!("{} {} ok", self.binary.display(), args.join(" "));
            return Ok(output.stdout);
        }
        Err(classify_failure(
            &format!("{} {}", self.binary.display(), args.first().unwrap_or(&"")),
            output.status.code(),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }

    async fn run_json<T: DeserializeOwned>(&self, args: &[&str], input: Option<&[u8]>) -> Result<T> {
        let stdout = self.run(args, input).await?;
        serde_json::from_slice(&stdout).map_err(|e| {
            Error::Store(format!(
                "{} {} returned invalid JSON: {}",
                self.binary.display(),
                args.first().unwrap_or(&""),
                e
            ))
        })
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        match e.kind() {
            IoErrorKind::NotFound | IoErrorKind::PermissionDenied => {
                Error::BinaryUnavailable(format!("{}: {}", self.binary.display(), e))
            }
            _ => Error::Io(e),
        }
    }
}

/// Map a non-zero exit to the error taxonomy by inspecting stderr.
fn classify_failure(what: &str, code: Option<i32>, stderr: &str) -> Error {
    let message = stderr.trim();
    let detail = match code {
        Some(code) => format!("{} exited with {}: {}", what, code, message),
        None => format!("{} killed by signal: {}", what, message),
    };
    let lower = message.to_lowercase();
    if lower.contains("permission") {
        Error::Permission(detail)
    } else if lower.contains("not found") {
        Error::NotFound(detail)
    } else if lower.contains("invalid") {
        Error::validation("payload", detail)
    } else {
        Error::Store(detail)
    }
}

impl IssueStore for CommandStore {
    fn name(&self) -> &str {
        self.binary
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("command")
    }

    fn list_items<'a>(&'a self, filter: &'a ItemFilter) -> StoreFuture<'a, Vec<Item>> {
        Box::pin(async move {
            let since = filter.since.map(|s| s.to_rfc3339());
            let limit = filter.limit.to_string();
            let mut args = vec!["list", "--format", "json"];
            if let Some(since) = &since {
                args.extend(["--since", since.as_str()]);
            }
            if !filter.is_unbounded() {
                args.extend(["--limit", limit.as_str()]);
            }

            let items: Vec<Item> = self.run_json(&args, None).await?;
            Ok(items
                .into_iter()
                .filter(|i| filter.matches(i))
                .take(filter.limit)
                .collect())
        })
    }

    fn get_item<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Item> {
        Box::pin(async move { self.run_json(&["show", id, "--format", "json"], None).await })
    }

    fn create_item<'a>(&'a self, draft: &'a ItemDraft) -> StoreFuture<'a, Item> {
        Box::pin(async move {
            let input = serde_json::to_vec(draft)?;
            self.run_json(&["create", "--format", "json"], Some(&input))
                .await
        })
    }

    fn update_item<'a>(&'a self, id: &'a str, patch: &'a ItemPatch) -> StoreFuture<'a, Item> {
        Box::pin(async move {
            let input = serde_json::to_vec(patch)?;
            self.run_json(&["update", id, "--format", "json"], Some(&input))
                .await
        })
    }

    fn add_comment<'a>(&'a self, id: &'a str, body: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.run(&["comment", id], Some(body.as_bytes()))
                .await
                .map(|_| ())
        })
    }

    fn add_labels<'a>(&'a self, id: &'a str, labels: &'a [String]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if labels.is_empty() {
                return Ok(());
            }
            let mut args = vec!["label", id];
            args.extend(labels.iter().map(String::as_str));
            self.run(&args, None).await.map(|_| ())
        })
    }

    fn remove_label<'a>(&'a self, id: &'a str, label: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.run(&["unlabel", id, label], None).await.map(|_| ()) })
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
