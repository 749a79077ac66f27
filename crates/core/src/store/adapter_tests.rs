// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::error::Error;
use crate::reliability::{CircuitState, ReliabilityConfig, RetryPolicy};
use crate::store::MemoryStore;
use chrono::Utc;

struct Fixture {
    store: Arc<MemoryStore>,
    cache: Arc<Cache>,
    reliability: Arc<Reliability>,
    adapter: StoreAdapter,
}

fn fixture() -> Fixture {
    let store = Arc::new(
        MemoryStore::new("target")
            .with_prefix("wb")
            .with_items([Item::new("wb-1", "First", Utc::now())]),
    );
    let cache = Arc::new(Cache::in_memory());
    let reliability = Arc::new(Reliability::new(ReliabilityConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
        },
        ..ReliabilityConfig::default()
    }));
    let adapter = StoreAdapter::new(
        Side::Target,
        store.clone(),
        Arc::clone(&cache),
        Arc::clone(&reliability),
    );
    Fixture {
        store,
        cache,
        reliability,
        adapter,
    }
}

#[tokio::test]
async fn list_is_served_from_cache_on_second_call() {
    let f = fixture();
    let filter = ItemFilter::default();

    assert_eq!(f.adapter.list_items(&filter).await.unwrap().len(), 1);
    assert_eq!(f.adapter.list_items(&filter).await.unwrap().len(), 1);

    assert_eq!(f.store.calls("list"), 1);
    assert_eq!(f.cache.counters(), (1, 1));
}

#[tokio::test]
async fn get_is_cached_per_id() {
    let f = fixture();
    f.adapter.get_item("wb-1").await.unwrap();
    f.adapter.get_item("wb-1").await.unwrap();
    assert_eq!(f.store.calls("get"), 1);
}

#[tokio::test(start_paused = true)]
async fn reads_are_retried_under_side_label() {
    let f = fixture();
    f.store.fail_times("list", 1, || Error::Network("reset".into()));

    let items = f.adapter.list_items(&ItemFilter::default()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(f.store.calls("list"), 2);
    assert_eq!(f.reliability.breakers()[0].0, "target.list");
}

#[tokio::test(start_paused = true)]
async fn exhausted_writes_surface_retry_exhausted() {
    let f = fixture();
    f.store.fail("create", || Error::Timeout {
        label: "target.create".into(),
        timeout_ms: 10,
    });

    let draft = ItemDraft::from_item(&Item::new("1", "New", Utc::now()));
    let err = f.adapter.create_item(&draft).await.unwrap_err();
    assert_eq!(err.code(), "RETRY_EXHAUSTED");
    assert_eq!(f.store.calls("create"), 2);
    assert_eq!(
        f.reliability.breaker_state("target.create"),
        CircuitState::Closed
    );
}

#[tokio::test]
async fn invalidate_written_drops_lists_and_touched_items_only() {
    let f = fixture();
    f.store.insert(Item::new("wb-2", "Second", Utc::now()));
    let filter = ItemFilter::default();
    f.adapter.list_items(&filter).await.unwrap();
    f.adapter.get_item("wb-1").await.unwrap();
    f.adapter.get_item("wb-2").await.unwrap();
    f.cache.set("source:item:wb-1", &1, None).await.unwrap();

    f.adapter
        .update_item("wb-1", &ItemPatch::link("7"))
        .await
        .unwrap();
    assert_eq!(f.adapter.written_ids(), vec!["wb-1".to_string()]);

    let removed = f.adapter.invalidate_written().await.unwrap();
    assert_eq!(removed, 2);
    assert!(f.adapter.written_ids().is_empty());

    // Untouched item and the other side survive
    assert!(f.cache.get::<Item>("target:item:wb-2").await.is_some());
    assert!(f.cache.get::<i32>("source:item:wb-1").await.is_some());
}

#[tokio::test]
async fn invalidate_without_writes_is_a_no_op() {
    let f = fixture();
    f.adapter.list_items(&ItemFilter::default()).await.unwrap();
    assert_eq!(f.adapter.invalidate_written().await.unwrap(), 0);
    assert_eq!(f.cache.stats().await.unwrap().entries, 1);
}

#[tokio::test]
async fn comment_and_label_writes_are_tracked() {
    let f = fixture();
    f.adapter.add_comment("wb-1", "hello").await.unwrap();
    f.adapter
        .add_labels("wb-1", &["bug".to_string()])
        .await
        .unwrap();
    f.adapter.remove_label("wb-1", "bug").await.unwrap();

    assert_eq!(f.store.comments("wb-1"), vec!["hello".to_string()]);
    assert_eq!(f.adapter.written_ids(), vec!["wb-1".to_string()]);
    let labels: Vec<_> = f.reliability.breakers().into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, vec!["target.comment", "target.label"]);
}
