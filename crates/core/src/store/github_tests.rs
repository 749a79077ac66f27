// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::item::COUNTERPART_KEY;
use mockito::{Matcher, Server, ServerGuard};
use yare::parameterized;

const ISSUES: &str = "/repos/acme/widgets/issues";

fn issue(number: u64, title: &str, body: &str) -> serde_json::Value {
    json!({
        "number": number,
        "title": title,
        "body": body,
        "state": "open",
        "assignee": { "login": "octocat" },
        "labels": [{ "name": "bug" }],
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-02T00:00:00Z",
    })
}

fn store(server: &ServerGuard) -> GitHubStore {
    GitHubStore::new(
        GitHubConfig::new("acme", "widgets")
            .with_api_url(server.url())
            .with_token("tok"),
    )
    .unwrap()
}

#[test]
fn body_marker_round_trips() {
    let mut metadata = BTreeMap::new();
    metadata.insert(COUNTERPART_KEY.to_string(), "wb-1a2b".to_string());

    let rendered = render_body(Some("Steps to reproduce\n"), &metadata).unwrap();
    assert_eq!(
        rendered,
        "Steps to reproduce\n\n<!-- wokbridge:{\"wokbridge.counterpart\":\"wb-1a2b\"} -->"
    );
    assert_eq!(
        split_body(&rendered),
        (Some("Steps to reproduce".to_string()), metadata.clone())
    );

    let bare = render_body(None, &metadata).unwrap();
    assert_eq!(split_body(&bare), (None, metadata));
}

#[test]
fn body_without_marker_is_kept() {
    assert_eq!(split_body("  plain  "), (Some("plain".into()), BTreeMap::new()));
    assert_eq!(split_body(""), (None, BTreeMap::new()));
    let broken = "text <!-- wokbridge:{not json} -->";
    assert_eq!(split_body(broken), (Some(broken.into()), BTreeMap::new()));
}

#[parameterized(
    unauthorized = { 401, false, "Bad credentials", "PERMISSION_DENIED" },
    forbidden = { 403, false, "Resource not accessible", "PERMISSION_DENIED" },
    forbidden_exhausted = { 403, true, "", "RATE_LIMITED" },
    forbidden_text = { 403, false, "API rate limit exceeded", "RATE_LIMITED" },
    too_many = { 429, false, "", "RATE_LIMITED" },
    missing = { 404, false, "Not Found", "NOT_FOUND" },
    unprocessable = { 422, false, "Validation Failed", "VALIDATION_ERROR" },
    bad_gateway = { 502, false, "", "NETWORK_ERROR" },
    teapot = { 418, false, "", "STORE_ERROR" },
)]
fn http_status_is_classified(status: u16, exhausted: bool, text: &str, code: &str) {
    let status = StatusCode::from_u16(status).unwrap();
    assert_eq!(status_error(status, exhausted, text).code(), code);
}

#[tokio::test]
async fn list_pages_and_skips_pull_requests() {
    let mut server = Server::new_async().await;
    let mut pr = issue(2, "A pull request", "");
    pr["pull_request"] = json!({ "url": "https://example.invalid/pr/2" });

    let first = server
        .mock("GET", ISSUES)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("state".into(), "all".into()),
            Matcher::UrlEncoded("per_page".into(), "2".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
        ]))
        .match_header("authorization", "Bearer tok")
        .with_header("content-type", "application/json")
        .with_body(json!([issue(3, "Three", ""), pr]).to_string())
        .create_async()
        .await;
    let second = server
        .mock("GET", ISSUES)
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_header("content-type", "application/json")
        .with_body(json!([issue(1, "One", "")]).to_string())
        .create_async()
        .await;

    let filter = ItemFilter {
        limit: 2,
        ..ItemFilter::default()
    };
    let items = store(&server).list_items(&filter).await.unwrap();

    first.assert_async().await;
    second.assert_async().await;
    let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "1"]);
    assert_eq!(items[0].assignee.as_deref(), Some("octocat"));
    assert!(items[0].labels.contains("bug"));
}

#[tokio::test]
async fn list_pushes_since_and_single_label_down() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", ISSUES)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("since".into(), "2026-01-01T00:00:00+00:00".into()),
            Matcher::UrlEncoded("labels".into(), "bug".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let mut filter = ItemFilter {
        since: Some("2026-01-01T00:00:00Z".parse().unwrap()),
        ..ItemFilter::default()
    };
    filter.labels.include.insert("bug".into());
    assert!(store(&server).list_items(&filter).await.unwrap().is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn get_strips_metadata_marker() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/acme/widgets/issues/12")
        .with_header("content-type", "application/json")
        .with_body(
            issue(
                12,
                "Fix bug",
                "Details\n\n<!-- wokbridge:{\"wokbridge.counterpart\":\"wb-9\"} -->",
            )
            .to_string(),
        )
        .create_async()
        .await;

    let item = store(&server).get_item("12").await.unwrap();
    assert_eq!(item.body.as_deref(), Some("Details"));
    assert_eq!(item.counterpart(), Some("wb-9"));
}

#[tokio::test]
async fn update_merges_patch_into_fresh_read() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/acme/widgets/issues/12")
        .with_header("content-type", "application/json")
        .with_body(issue(12, "Fix bug", "Details").to_string())
        .create_async()
        .await;
    let patch_mock = server
        .mock("PATCH", "/repos/acme/widgets/issues/12")
        .match_body(Matcher::PartialJson(json!({
            "title": "Fix bug",
            "body": "Details\n\n<!-- wokbridge:{\"wokbridge.counterpart\":\"wb-9\"} -->",
            "state": "open",
            "assignees": ["octocat"],
            "labels": ["bug"],
        })))
        .with_header("content-type", "application/json")
        .with_body(
            issue(
                12,
                "Fix bug",
                "Details\n\n<!-- wokbridge:{\"wokbridge.counterpart\":\"wb-9\"} -->",
            )
            .to_string(),
        )
        .create_async()
        .await;

    let item = store(&server)
        .update_item("12", &ItemPatch::link("wb-9"))
        .await
        .unwrap();
    patch_mock.assert_async().await;
    assert_eq!(item.counterpart(), Some("wb-9"));
}

#[tokio::test]
async fn closed_drafts_are_closed_after_creation() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", ISSUES)
        .match_body(Matcher::PartialJson(json!({ "title": "Done already" })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(issue(40, "Done already", "").to_string())
        .create_async()
        .await;
    let mut closed = issue(40, "Done already", "");
    closed["state"] = json!("closed");
    let close = server
        .mock("PATCH", "/repos/acme/widgets/issues/40")
        .match_body(Matcher::PartialJson(json!({ "state": "closed" })))
        .with_header("content-type", "application/json")
        .with_body(closed.to_string())
        .create_async()
        .await;

    let mut origin = Item::new("wb-1", "Done already", Utc::now());
    origin.status = ItemStatus::Closed;
    let item = store(&server)
        .create_item(&ItemDraft::from_item(&origin))
        .await
        .unwrap();

    create.assert_async().await;
    close.assert_async().await;
    assert_eq!(item.status, ItemStatus::Closed);
}

#[tokio::test]
async fn rate_limit_header_maps_to_rate_limited() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/acme/widgets/issues/1")
        .with_status(403)
        .with_header("x-ratelimit-remaining", "0")
        .with_body("{}")
        .create_async()
        .await;

    let err = store(&server).get_item("1").await.unwrap_err();
    assert_eq!(err.code(), "RATE_LIMITED");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn labels_are_encoded_and_missing_labels_ignored() {
    let mut server = Server::new_async().await;
    let add = server
        .mock("POST", "/repos/acme/widgets/issues/3/labels")
        .match_body(Matcher::Json(json!({ "labels": ["good first issue"] })))
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;
    let remove = server
        .mock("DELETE", "/repos/acme/widgets/issues/3/labels/good%20first%20issue")
        .with_status(404)
        .create_async()
        .await;

    let store = store(&server);
    store
        .add_labels("3", &["good first issue".to_string()])
        .await
        .unwrap();
    store.remove_label("3", "good first issue").await.unwrap();
    add.assert_async().await;
    remove.assert_async().await;
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let store = GitHubStore::new(
        GitHubConfig::new("acme", "widgets").with_api_url("http://127.0.0.1:1"),
    )
    .unwrap();
    let err = store.get_item("1").await.unwrap_err();
    assert_eq!(err.code(), "NETWORK_ERROR");
    assert!(err.is_retryable());
}
