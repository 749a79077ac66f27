// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::item::ItemStatus;
use crate::reliability::{CircuitState, ReliabilityConfig, RetryPolicy};
use crate::store::MemoryStore;
use chrono::{DateTime, TimeZone};

fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hours)
}

fn linked(id: &str, title: &str, hours: i64, counterpart: &str) -> Item {
    let mut item = Item::new(id, title, at(hours));
    item.set_counterpart(counterpart);
    item
}

struct Fixture {
    source: Arc<MemoryStore>,
    target: Arc<MemoryStore>,
    cache: Arc<Cache>,
    reliability: Arc<Reliability>,
    orchestrator: SyncOrchestrator,
}

fn fixture_with(source: Vec<Item>, target: Vec<Item>, config: OrchestratorConfig) -> Fixture {
    let source = Arc::new(MemoryStore::new("github").with_items(source));
    let target = Arc::new(MemoryStore::new("wok").with_prefix("wb").with_items(target));
    let cache = Arc::new(Cache::in_memory());
    let reliability = Arc::new(Reliability::new(ReliabilityConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
        },
        ..ReliabilityConfig::default()
    }));
    let adapter = |side, store: &Arc<MemoryStore>| {
        StoreAdapter::new(side, store.clone(), Arc::clone(&cache), Arc::clone(&reliability))
    };
    let orchestrator = SyncOrchestrator::new(
        adapter(Side::Source, &source),
        adapter(Side::Target, &target),
        ConflictResolver::default(),
        Arc::clone(&cache),
        Arc::clone(&reliability),
        config,
    );
    Fixture {
        source,
        target,
        cache,
        reliability,
        orchestrator,
    }
}

fn fixture(source: Vec<Item>, target: Vec<Item>) -> Fixture {
    fixture_with(source, target, OrchestratorConfig::default())
}

fn wide_window() -> OrchestratorConfig {
    OrchestratorConfig {
        recency_window: Duration::from_secs(24 * 3600),
        ..OrchestratorConfig::default()
    }
}

#[tokio::test]
async fn new_source_item_is_created_on_target() {
    let f = fixture(vec![Item::new("1", "Fix bug", at(0))], Vec::new());

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::new(SyncDirection::SourceToTarget))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.items_processed, 1);
    assert_eq!(result.items_created, 1);
    assert!(result.errors.is_empty());
    let created = f.target.items();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].title, "Fix bug");
    assert_eq!(created[0].counterpart(), Some("1"));
    // One-way runs never touch the origin
    assert_eq!(f.source.write_calls(), 0);
}

#[tokio::test]
async fn recent_divergence_goes_through_the_resolver() {
    let f = fixture_with(
        vec![Item::new("1", "A", at(2))],
        vec![linked("wb-1", "B", 0, "1")],
        wide_window(),
    );

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::default().strategy("timestamp"))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.resolved.len(), 1);
    assert_eq!(result.resolved[0].resolution, Some(ResolutionAction::SourceWins));
    assert_eq!(
        result.resolved[0].details,
        Some(serde_json::json!({ "strategy": "timestamp" }))
    );
    assert!(result.conflicts.is_empty());
    assert_eq!(f.target.item("wb-1").unwrap().title, "A");
    // Content update on the target, link-only write on the source
    assert_eq!(result.items_updated, 1);
    assert_eq!(f.source.item("1").unwrap().counterpart(), Some("wb-1"));
}

#[tokio::test]
async fn stale_side_is_overwritten_without_the_resolver() {
    let f = fixture(vec![Item::new("1", "A", at(2))], vec![linked("wb-1", "B", 0, "1")]);

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::default().strategy("manual"))
        .await
        .unwrap();

    assert!(result.conflicts.is_empty());
    assert_eq!(result.resolved[0].resolution, Some(ResolutionAction::SourceWins));
    assert_eq!(
        result.resolved[0].details,
        Some(serde_json::json!({ "strategy": "recency" }))
    );
    assert_eq!(f.target.item("wb-1").unwrap().title, "A");
}

#[tokio::test]
async fn one_way_run_leaves_a_newer_destination_alone() {
    let f = fixture(vec![Item::new("1", "A", at(0))], vec![linked("wb-1", "B", 2, "1")]);

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::new(SyncDirection::SourceToTarget))
        .await
        .unwrap();

    assert_eq!(result.resolved[0].resolution, Some(ResolutionAction::TargetWins));
    assert_eq!(result.items_updated, 0);
    assert_eq!(f.target.item("wb-1").unwrap().title, "B");
    assert_eq!(f.target.write_calls(), 0);
    assert_eq!(f.source.write_calls(), 0);
}

#[tokio::test]
async fn manual_outcome_is_reported_and_left_alone() {
    let f = fixture_with(
        vec![Item::new("1", "A", at(0))],
        vec![linked("wb-1", "B", 0, "1")],
        wide_window(),
    );

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::default().strategy("manual"))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].resolution, Some(ResolutionAction::Manual));
    assert!(result.conflicts[0].details.is_some());
    assert!(result.resolved.is_empty());
    assert_eq!(f.target.write_calls() + f.source.write_calls(), 0);
}

#[tokio::test]
async fn force_settles_manual_outcomes_by_timestamp() {
    let f = fixture_with(
        vec![Item::new("1", "A", at(0))],
        vec![linked("wb-1", "B", 0, "1")],
        wide_window(),
    );

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::default().strategy("manual").force(true))
        .await
        .unwrap();

    assert!(result.conflicts.is_empty());
    // Equal timestamps go to the source
    assert_eq!(result.resolved[0].resolution, Some(ResolutionAction::SourceWins));
    assert_eq!(f.target.item("wb-1").unwrap().title, "A");
}

#[tokio::test]
async fn merge_converges_both_sides() {
    let mut source = Item::new("1", "Title", at(0));
    source.labels.insert("a".into());
    source.body = Some("from github".into());
    let mut target = linked("wb-1", "Title", 0, "1");
    target.labels.insert("b".into());
    target.body = Some("from wok".into());
    let f = fixture_with(vec![source], vec![target], wide_window());

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::default().strategy("merge"))
        .await
        .unwrap();

    assert_eq!(result.resolved[0].resolution, Some(ResolutionAction::Merged));
    assert_eq!(result.items_updated, 2);
    let source = f.source.item("1").unwrap();
    let target = f.target.item("wb-1").unwrap();
    assert!(source.content_eq(&target));
    assert_eq!(source.labels.len(), 2);
}

#[tokio::test]
async fn invalid_batch_size_fails_before_any_io() {
    let f = fixture(vec![Item::new("1", "Fix bug", at(0))], Vec::new());

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::default().batch_size(2000))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("VALIDATION_ERROR"));
    assert!(result.errors[0].contains("batchSize"));
    assert_eq!(f.source.total_calls(), 0);
    assert_eq!(f.target.total_calls(), 0);
    assert!(!f.orchestrator.is_running());
}

#[tokio::test]
async fn invalid_direction_is_rejected() {
    let f = fixture(Vec::new(), Vec::new());
    let options = SyncOptions {
        direction: "sideways".into(),
        ..SyncOptions::default()
    };

    let result = f.orchestrator.execute_sync(options).await.unwrap();
    assert!(!result.success);
    assert!(result.errors[0].contains("direction"));
    assert_eq!(result.direction, None);
}

fn mixed_fixture() -> Fixture {
    fixture(
        vec![
            Item::new("1", "Only on github", at(0)),
            Item::new("2", "Shared", at(3)),
            Item::new("3", "Same title", at(0)),
        ],
        vec![
            Item::new("wb-1", "Only on wok", at(0)),
            linked("wb-2", "Shared (old)", 0, "2"),
            Item::new("wb-3", "Same title", at(0)),
        ],
    )
}

#[tokio::test]
async fn second_run_without_changes_writes_nothing() {
    let f = mixed_fixture();

    let first = f.orchestrator.execute_sync(SyncOptions::default()).await.unwrap();
    assert!(first.success);
    assert_eq!(first.items_created, 2);
    assert_eq!(first.items_updated, 1);
    let writes = f.source.write_calls() + f.target.write_calls();

    let second = f.orchestrator.execute_sync(SyncOptions::default()).await.unwrap();
    assert!(second.success);
    assert_eq!(second.items_created, 0);
    assert_eq!(second.items_updated, 0);
    assert!(second.resolved.is_empty());
    assert_eq!(f.source.write_calls() + f.target.write_calls(), writes);
}

#[tokio::test]
async fn dry_run_reports_the_same_plan_without_writing() {
    let wet = mixed_fixture();
    let dry = mixed_fixture();

    let expected = wet.orchestrator.execute_sync(SyncOptions::default()).await.unwrap();
    let result = dry
        .orchestrator
        .execute_sync(SyncOptions::default().dry_run(true))
        .await
        .unwrap();

    assert!(result.dry_run);
    assert_eq!(result.items_processed, expected.items_processed);
    assert_eq!(result.items_created, expected.items_created);
    assert_eq!(result.items_updated, expected.items_updated);
    assert_eq!(result.conflicts.len(), expected.conflicts.len());
    assert_eq!(result.resolved.len(), expected.resolved.len());
    assert_eq!(dry.source.write_calls() + dry.target.write_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn item_failures_do_not_abort_the_batch() {
    let f = fixture(
        vec![Item::new("1", "Good", at(0)), Item::new("2", "Bad", at(0))],
        Vec::new(),
    );
    f.target
        .fail_key("create", "Bad", || Error::Network("connection reset".into()));

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::new(SyncDirection::SourceToTarget))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.items_created, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(
        result.errors[0].starts_with("RETRY_EXHAUSTED: target create 2:"),
        "{}",
        result.errors[0]
    );
    assert_eq!(f.target.calls("create"), 3);
}

#[tokio::test]
async fn permission_failure_aborts_the_run() {
    let f = fixture(
        vec![Item::new("1", "One", at(0)), Item::new("2", "Two", at(0))],
        Vec::new(),
    );
    f.target
        .fail("create", || Error::Permission("token lacks write scope".into()));

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::new(SyncDirection::SourceToTarget))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.errors.last().unwrap().starts_with("PERMISSION_DENIED"));
    assert_eq!(f.target.calls("create"), 1);
    assert!(!f.orchestrator.is_running());
}

#[tokio::test]
async fn fetch_failure_fails_the_run() {
    let f = fixture(vec![Item::new("1", "One", at(0))], Vec::new());
    f.target.fail("list", || Error::Store("database is locked".into()));

    let result = f.orchestrator.execute_sync(SyncOptions::default()).await.unwrap();

    assert!(!result.success);
    assert!(result.errors[0].starts_with("STORE_ERROR"));
    assert_eq!(f.target.write_calls() + f.source.write_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_run_is_rejected() {
    let f = fixture(Vec::new(), Vec::new());
    let slow = Arc::new(
        MemoryStore::new("github")
            .with_latency(Duration::from_millis(50))
            .with_items([Item::new("1", "One", at(0))]),
    );
    let adapter = |side, store: Arc<MemoryStore>| {
        StoreAdapter::new(side, store, Arc::clone(&f.cache), Arc::clone(&f.reliability))
    };
    let orchestrator = SyncOrchestrator::new(
        adapter(Side::Source, slow),
        adapter(Side::Target, f.target.clone()),
        ConflictResolver::default(),
        Arc::clone(&f.cache),
        Arc::clone(&f.reliability),
        OrchestratorConfig::default(),
    );

    let (first, second) = tokio::join!(
        orchestrator.execute_sync(SyncOptions::default()),
        async {
            assert!(orchestrator.is_running());
            assert_eq!(orchestrator.phase(), SyncPhase::Fetching);
            orchestrator.execute_sync(SyncOptions::default()).await
        }
    );

    assert!(first.unwrap().success);
    assert_eq!(second.unwrap_err().code(), "SYNC_IN_PROGRESS");
    assert!(!orchestrator.is_running());
    assert_eq!(orchestrator.phase(), SyncPhase::Idle);
    assert_eq!(f.target.items().len(), 1);
}

#[tokio::test]
async fn dangling_link_fetches_the_counterpart() {
    let f = fixture(
        vec![linked("1", "Renamed", 5, "wb-9")],
        vec![linked("wb-9", "Original", 0, "1")],
    );

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::default().since(at(1).to_rfc3339()))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.items_processed, 1);
    assert_eq!(result.items_updated, 1);
    assert_eq!(f.target.calls("get"), 1);
    assert_eq!(f.target.item("wb-9").unwrap().title, "Renamed");
}

#[tokio::test]
async fn deleted_counterpart_is_not_recreated() {
    let f = fixture(vec![linked("1", "Gone on wok", 0, "wb-9")], Vec::new());

    let result = f.orchestrator.execute_sync(SyncOptions::default()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.items_processed, 0);
    assert!(result.errors.is_empty());
    assert!(f.target.items().is_empty());
}

#[tokio::test]
async fn one_way_copy_outside_since_is_updated_not_recreated() {
    let f = fixture(
        vec![Item::new("1", "Fix bug now", at(48))],
        vec![linked("wb-1", "Fix bug", 0, "1")],
    );

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::new(SyncDirection::SourceToTarget).since(at(24).to_rfc3339()))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.items_created, 0);
    assert_eq!(result.items_updated, 1);
    let items = f.target.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Fix bug now");
    assert_eq!(items[0].counterpart(), Some("1"));
}

#[tokio::test]
async fn one_way_copy_beyond_batch_limit_is_not_recreated() {
    let f = fixture(
        vec![Item::new("1", "Alpha", at(0))],
        vec![
            Item::new("wb-1", "Local one", at(0)),
            Item::new("wb-2", "Local two", at(0)),
        ],
    );
    let options = || SyncOptions::new(SyncDirection::SourceToTarget).batch_size(2);

    let first = f.orchestrator.execute_sync(options()).await.unwrap();
    assert_eq!(first.items_created, 1);

    for _ in 0..2 {
        let again = f.orchestrator.execute_sync(options()).await.unwrap();
        assert!(again.success);
        assert_eq!(again.items_created, 0);
        assert_eq!(again.items_updated, 0);
    }
    assert_eq!(f.target.items().len(), 3);
    assert_eq!(f.target.calls("create"), 1);
}

#[tokio::test]
async fn unlinked_bidirectional_copy_is_found_without_link_back() {
    let f = fixture_with(
        vec![Item::new("1", "One", at(0))],
        vec![
            Item::new("wb-1", "Local one", at(0)),
            Item::new("wb-2", "Local two", at(0)),
        ],
        OrchestratorConfig {
            link_back: false,
            ..OrchestratorConfig::default()
        },
    );
    let options = || SyncOptions::default().batch_size(2);

    f.orchestrator.execute_sync(options()).await.unwrap();
    let second = f.orchestrator.execute_sync(options()).await.unwrap();

    assert!(second.success);
    assert_eq!(second.items_created, 0);
    assert_eq!(f.target.calls("create"), 1);
    assert_eq!(f.source.calls("create"), 2);
}

#[tokio::test]
async fn excluded_labels_are_not_synced() {
    let mut skipped = Item::new("1", "Skip me", at(0));
    skipped.labels.insert("wontsync".into());
    let f = fixture(vec![skipped, Item::new("2", "Take me", at(0))], Vec::new());

    let mut options = SyncOptions::new(SyncDirection::SourceToTarget);
    options.labels.exclude.insert("wontsync".into());
    let result = f.orchestrator.execute_sync(options).await.unwrap();

    assert_eq!(result.items_created, 1);
    assert_eq!(f.target.items()[0].title, "Take me");
}

#[tokio::test]
async fn link_back_can_be_disabled() {
    let f = fixture_with(
        vec![Item::new("1", "One", at(0))],
        Vec::new(),
        OrchestratorConfig {
            link_back: false,
            ..OrchestratorConfig::default()
        },
    );

    f.orchestrator.execute_sync(SyncOptions::default()).await.unwrap();
    assert_eq!(f.source.item("1").unwrap().counterpart(), None);
    assert_eq!(f.source.write_calls(), 0);
}

#[tokio::test]
async fn target_items_flow_back_to_source() {
    let mut closed = Item::new("wb-1", "Done locally", at(0));
    closed.status = ItemStatus::Closed;
    let f = fixture(Vec::new(), vec![closed]);

    let result = f
        .orchestrator
        .execute_sync(SyncOptions::new(SyncDirection::TargetToSource))
        .await
        .unwrap();

    assert_eq!(result.items_created, 1);
    let created = &f.source.items()[0];
    assert_eq!(created.status, ItemStatus::Closed);
    assert_eq!(created.counterpart(), Some("wb-1"));
    assert_eq!(f.target.write_calls(), 0);
}

#[tokio::test]
async fn cache_counters_cover_only_the_run() {
    let f = fixture(Vec::new(), vec![Item::new("wb-1", "One", at(0))]);
    f.cache.get::<i32>("unrelated").await;

    let first = f
        .orchestrator
        .execute_sync(SyncOptions::new(SyncDirection::SourceToTarget))
        .await
        .unwrap();
    assert_eq!((first.cache_hits, first.cache_misses), (0, 2));

    let second = f
        .orchestrator
        .execute_sync(SyncOptions::new(SyncDirection::SourceToTarget))
        .await
        .unwrap();
    assert_eq!((second.cache_hits, second.cache_misses), (2, 0));
}

#[derive(Default)]
struct CollectingRecorder {
    seen: Mutex<Vec<bool>>,
}

impl SyncRecorder for CollectingRecorder {
    fn record_sync_result(&self, result: &SyncResult) -> Result<()> {
        self.seen.lock().unwrap().push(result.success);
        Ok(())
    }
}

struct BrokenRecorder;

impl SyncRecorder for BrokenRecorder {
    fn record_sync_result(&self, _: &SyncResult) -> Result<()> {
        Err(Error::Store("disk full".into()))
    }
}

#[tokio::test]
async fn recorder_sees_every_run() {
    let recorder = Arc::new(CollectingRecorder::default());
    let f = fixture(Vec::new(), Vec::new());
    let orchestrator = f.orchestrator.with_recorder(recorder.clone());

    orchestrator.execute_sync(SyncOptions::default()).await.unwrap();
    orchestrator
        .execute_sync(SyncOptions::default().batch_size(0))
        .await
        .unwrap();

    assert_eq!(*recorder.seen.lock().unwrap(), vec![true, false]);
}

#[tokio::test]
async fn recorder_failure_does_not_fail_the_run() {
    let f = fixture(Vec::new(), Vec::new());
    let orchestrator = f.orchestrator.with_recorder(Arc::new(BrokenRecorder));

    let result = orchestrator.execute_sync(SyncOptions::default()).await.unwrap();
    assert!(result.success);
}

#[tokio::test]
async fn status_and_statistics_track_runs() {
    let f = fixture_with(
        vec![Item::new("1", "One", at(0))],
        Vec::new(),
        OrchestratorConfig {
            history_limit: 2,
            ..OrchestratorConfig::default()
        },
    );

    let idle = f.orchestrator.get_status();
    assert!(!idle.is_running);
    assert_eq!(idle.phase, SyncPhase::Idle);
    assert_eq!(idle.success_rate, 0.0);

    f.orchestrator.execute_sync(SyncOptions::default()).await.unwrap();
    f.orchestrator
        .execute_sync(SyncOptions::default().batch_size(0))
        .await
        .unwrap();
    f.orchestrator.execute_sync(SyncOptions::default()).await.unwrap();

    let status = f.orchestrator.get_status();
    assert_eq!(status.recent_syncs.len(), 2);
    assert!(!status.recent_syncs[0].success);
    assert!(status.recent_syncs[1].success);
    assert!((status.success_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!(status.circuit_breakers.contains_key("source.list"));
    assert!(status.circuit_breakers.contains_key("target.create"));

    let stats = f.orchestrator.get_statistics();
    assert_eq!(stats.total_syncs, 3);
    assert_eq!(stats.successful_syncs, 2);
}

#[tokio::test(start_paused = true)]
async fn reset_closes_open_breakers() {
    let f = fixture(Vec::new(), Vec::new());
    for _ in 0..3 {
        f.target.fail_times("list", 2, || Error::Network("reset".into()));
        f.orchestrator.execute_sync(SyncOptions::default()).await.unwrap();
    }
    assert_eq!(f.reliability.breaker_state("target.list"), CircuitState::Open);
    let status = f.orchestrator.get_status();
    assert_eq!(status.circuit_breakers["target.list"].state, CircuitState::Open);

    f.orchestrator.reset_circuit_breaker();
    assert_eq!(f.reliability.breaker_state("target.list"), CircuitState::Closed);
}
