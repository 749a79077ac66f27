// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Source client for GitHub issues over the REST API.
//!
//! Item metadata has no native home on GitHub, so it travels in the issue
//! body as a trailing `<!-- wokbridge:{json} -->` marker that is stripped
//! again on read.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{IssueStore, StoreFuture};
use crate::error::{Error, Result};
use crate::item::{Item, ItemDraft, ItemFilter, ItemPatch, ItemStatus};

const USER_AGENT: &str = "wokbridge";
const MARKER_OPEN: &str = "<!-- wokbridge:";
const MARKER_CLOSE: &str = " -->";
/// GitHub's largest page size.
const MAX_PER_PAGE: usize = 100;

/// Connection settings for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub timeout: Duration,
}

impl GitHubConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        GitHubConfig {
            api_url: "https://api.github.com".to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    assignee: Option<GhUser>,
    #[serde(default)]
    labels: Vec<GhLabel>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Present only on pull requests, which share the issues endpoint.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl GhIssue {
    fn into_item(self) -> Item {
        let (body, metadata) = split_body(self.body.as_deref().unwrap_or_default());
        Item {
            id: self.number.to_string(),
            title: self.title,
            body,
            status: if self.state == "closed" {
                ItemStatus::Closed
            } else {
                ItemStatus::Open
            },
            assignee: self.assignee.map(|a| a.login),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            metadata,
        }
    }
}

/// Separate the metadata marker from the visible body.
///
/// A marker that does not parse is left in the body untouched.
fn split_body(raw: &str) -> (Option<String>, BTreeMap<String, String>) {
    let trimmed = raw.trim_end();
    let parsed = trimmed
        .rfind(MARKER_OPEN)
        .filter(|_| trimmed.ends_with(MARKER_CLOSE))
        .and_then(|start| {
            let json = &trimmed[start + MARKER_OPEN.len()..trimmed.len() - MARKER_CLOSE.len()];
            serde_json::from_str::<BTreeMap<String, String>>(json)
                .ok()
                .map(|metadata| (&trimmed[..start], metadata))
        });
    let (visible, metadata) = parsed.unwrap_or((trimmed, BTreeMap::new()));
    let visible = visible.trim();
    let body = (!visible.is_empty()).then(|| visible.to_string());
    (body, metadata)
}

/// Inverse of [`split_body`].
fn render_body(body: Option<&str>, metadata: &BTreeMap<String, String>) -> Result<String> {
    let visible = body.map(str::trim).unwrap_or_default();
    if metadata.is_empty() {
        return Ok(visible.to_string());
    }
    let marker = format!(
        "{}{}{}",
        MARKER_OPEN,
        serde_json::to_string(metadata)?,
        MARKER_CLOSE
    );
    if visible.is_empty() {
        Ok(marker)
    } else {
        Ok(format!("{}\n\n{}", visible, marker))
    }
}

fn state_of(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Open => "open",
        ItemStatus::Closed => "closed",
    }
}

/// Map a non-success response to the error taxonomy.
fn status_error(status: StatusCode, rate_limit_exhausted: bool, text: &str) -> Error {
    let detail = format!("GitHub API error (HTTP {}): {}", status.as_u16(), text.trim());
    match status.as_u16() {
        401 => Error::Permission(detail),
        403 if rate_limit_exhausted || text.to_lowercase().contains("rate limit") => {
            Error::RateLimited(detail)
        }
        403 => Error::Permission(detail),
        429 => Error::RateLimited(detail),
        404 => Error::NotFound(detail),
        422 => Error::validation("request", detail),
        500..=599 => Error::Network(detail),
        _ => Error::Store(detail),
    }
}

/// GitHub issues of one repository as an [`IssueStore`].
pub struct GitHubStore {
    config: GitHubConfig,
    client: Client,
}

impl GitHubStore {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Store(format!("failed to build HTTP client: {}", e)))?;
        Ok(GitHubStore { config, client })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    /// `{api_url}/repos/{owner}/{repo}/{segments..}` with each segment encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_url)
            .map_err(|e| Error::validation("api_url", e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| {
                Error::validation("api_url", format!("'{}' cannot be a base", self.config.api_url))
            })?
            .pop_if_empty()
            .extend(["repos", self.config.owner.as_str(), self.config.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, label: &str, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| self.transport_error(label, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");
        let text = response.text().await.unwrap_or_default();
        Err(status_error(status, exhausted, &text))
    }

    async fn send_json<T: DeserializeOwned>(&self, label: &str, builder: RequestBuilder) -> Result<T> {
        self.send(label, builder)
            .await?
            .json()
            .await
            .map_err(|e| Error::Store(format!("unexpected GitHub response for {}: {}", label, e)))
    }

    fn transport_error(&self, label: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                label: format!("github {}", label),
                timeout_ms: self.config.timeout.as_millis() as u64,
            }
        } else {
            Error::Network(format!("github {}: {}", label, e))
        }
    }

    async fn fetch_issue(&self, id: &str) -> Result<Item> {
        let url = self.url(&["issues", id])?;
        let issue: GhIssue = self.send_json("get", self.request(Method::GET, url)).await?;
        if issue.pull_request.is_some() {
            return Err(Error::NotFound(format!("#{} is a pull request", id)));
        }
        Ok(issue.into_item())
    }

    /// Write the full content of `item` over issue `id`.
    async fn put_issue(&self, id: &str, item: &Item) -> Result<Item> {
        let url = self.url(&["issues", id])?;
        let payload = json!({
            "title": item.title,
            "body": render_body(item.body.as_deref(), &item.metadata)?,
            "state": state_of(item.status),
            "assignees": item.assignee.iter().collect::<Vec<_>>(),
            "labels": item.labels,
        });
        let issue: GhIssue = self
            .send_json("update", self.request(Method::PATCH, url).json(&payload))
            .await?;
        Ok(issue.into_item())
    }
}

impl IssueStore for GitHubStore {
    fn name(&self) -> &str {
        "github"
    }

    fn list_items<'a>(&'a self, filter: &'a ItemFilter) -> StoreFuture<'a, Vec<Item>> {
        Box::pin(async move {
            let per_page = filter.limit.clamp(1, MAX_PER_PAGE);
            let mut items = Vec::new();
            let mut page = 1usize;

            while items.len() < filter.limit {
                let mut url = self.url(&["issues"])?;
                {
                    let mut query = url.query_pairs_mut();
                    query
                        .append_pair("state", "all")
                        .append_pair("sort", "updated")
                        .append_pair("direction", "desc")
                        .append_pair("per_page", &per_page.to_string())
                        .append_pair("page", &page.to_string());
                    if let Some(since) = filter.since {
                        query.append_pair("since", &since.to_rfc3339());
                    }
                    // The API ANDs its label list, so only a single include is pushed down
                    if filter.labels.include.len() == 1 {
                        if let Some(label) = filter.labels.include.iter().next() {
                            query.append_pair("labels", label);
                        }
                    }
                }

                let issues: Vec<GhIssue> =
                    self.send_json("list", self.request(Method::GET, url)).await?;
                let fetched = issues.len();
                items.extend(
                    issues
                        .into_iter()
                        .filter(|i| i.pull_request.is_none())
                        .map(GhIssue::into_item)
                        .filter(|i| filter.matches(i)),
                );
                if fetched < per_page {
                    break;
                }
                page += 1;
            }

            items.truncate(filter.limit);
            tracing::debug!(
                "fetched {} issues from {}/{} in {} pages",
                items.len(),
                self.config.owner,
                self.config.repo,
                page
            );
            Ok(items)
        })
    }

    fn get_item<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Item> {
        Box::pin(self.fetch_issue(id))
    }

    fn create_item<'a>(&'a self, draft: &'a ItemDraft) -> StoreFuture<'a, Item> {
        Box::pin(async move {
            let url = self.url(&["issues"])?;
            let payload = json!({
                "title": draft.title,
                "body": render_body(draft.body.as_deref(), &draft.metadata)?,
                "assignees": draft.assignee.iter().collect::<Vec<_>>(),
                "labels": draft.labels,
            });
            let issue: GhIssue = self
                .send_json("create", self.request(Method::POST, url).json(&payload))
                .await?;
            let item = issue.into_item();

            // Issues are always opened; closing takes a second call
            if draft.status == ItemStatus::Closed {
                let mut closed = item.clone();
                closed.status = ItemStatus::Closed;
                return self.put_issue(&item.id, &closed).await;
            }
            Ok(item)
        })
    }

    fn update_item<'a>(&'a self, id: &'a str, patch: &'a ItemPatch) -> StoreFuture<'a, Item> {
        Box::pin(async move {
            // Metadata lives in the body, so patches are applied to a fresh read
            let mut item = self.fetch_issue(id).await?;
            patch.apply(&mut item, Utc::now());
            self.put_issue(id, &item).await
        })
    }

    fn add_comment<'a>(&'a self, id: &'a str, body: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let url = self.url(&["issues", id, "comments"])?;
            self.send(
                "comment",
                self.request(Method::POST, url).json(&json!({ "body": body })),
            )
            .await
            .map(|_| ())
        })
    }

    fn add_labels<'a>(&'a self, id: &'a str, labels: &'a [String]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let labels: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
            if labels.is_empty() {
                return Ok(());
            }
            let url = self.url(&["issues", id, "labels"])?;
            self.send(
                "label",
                self.request(Method::POST, url)
                    .json(&json!({ "labels": labels })),
            )
            .await
            .map(|_| ())
        })
    }

    fn remove_label<'a>(&'a self, id: &'a str, label: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let url = self.url(&["issues", id, "labels", label])?;
            match self.send("unlabel", self.request(Method::DELETE, url)).await {
                Ok(_) => Ok(()),
                // Removing a label that is not there is not a failure
                Err(Error::NotFound(_)) => Ok(()),
                Err(e) => Err(e),
            }
        })
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
