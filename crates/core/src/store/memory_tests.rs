// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::item::{ItemStatus, COUNTERPART_KEY};
use chrono::TimeZone;

fn seeded() -> MemoryStore {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    MemoryStore::new("target")
        .with_prefix("wb")
        .with_items([Item::new("wb-3", "Existing", at)])
}

#[tokio::test]
async fn create_assigns_ids_after_seeded_items() {
    let store = seeded();
    let draft = ItemDraft::from_item(&Item::new("1", "Fix bug", Utc::now()));

    let created = store.create_item(&draft).await.unwrap();

    assert_eq!(created.id, "wb-4");
    assert_eq!(created.metadata.get(COUNTERPART_KEY).map(String::as_str), Some("1"));
    assert_eq!(store.calls("create"), 1);
    assert_eq!(store.write_calls(), 1);
}

#[tokio::test]
async fn update_applies_patch() {
    let store = seeded();
    let patch = ItemPatch {
        status: Some(ItemStatus::Closed),
        ..ItemPatch::default()
    };

    let updated = store.update_item("wb-3", &patch).await.unwrap();
    assert_eq!(updated.status, ItemStatus::Closed);
    assert_eq!(store.item("wb-3").unwrap().status, ItemStatus::Closed);
}

#[tokio::test]
async fn missing_item_is_not_found() {
    let store = seeded();
    let err = store.get_item("wb-99").await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    let err = store.update_item("wb-99", &ItemPatch::default()).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn comments_and_labels() {
    let store = seeded();
    store.add_comment("wb-3", "synced").await.unwrap();
    store
        .add_labels("wb-3", &["bug".to_string(), "p1".to_string()])
        .await
        .unwrap();
    store.remove_label("wb-3", "p1").await.unwrap();

    assert_eq!(store.comments("wb-3"), vec!["synced".to_string()]);
    let labels: Vec<_> = store.item("wb-3").unwrap().labels.into_iter().collect();
    assert_eq!(labels, vec!["bug".to_string()]);
}

#[tokio::test]
async fn list_respects_filter_and_limit() {
    let store = seeded();
    for title in ["a", "b", "c"] {
        store.insert(Item::new(format!("wb-{}", title), title, Utc::now()));
    }

    let filter = ItemFilter {
        limit: 2,
        ..ItemFilter::default()
    };
    assert_eq!(store.list_items(&filter).await.unwrap().len(), 2);
}

#[tokio::test]
async fn injected_failures() {
    let store = seeded();
    store.fail_times("list", 1, || Error::Network("down".into()));
    store.fail_key("update", "wb-3", || Error::Permission("read-only".into()));

    assert!(store.list_items(&ItemFilter::default()).await.is_err());
    assert!(store.list_items(&ItemFilter::default()).await.is_ok());
    assert_eq!(store.calls("list"), 2);

    let err = store.update_item("wb-3", &ItemPatch::default()).await.unwrap_err();
    assert_eq!(err.code(), "PERMISSION_DENIED");

    store.clear_failures();
    assert!(store.update_item("wb-3", &ItemPatch::default()).await.is_ok());
}
