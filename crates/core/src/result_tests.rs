// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::item::ItemStatus;
use chrono::TimeZone;

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

#[test]
fn conflict_kind_follows_differing_fields() {
    let source = Item::new("1", "Title", at());
    let mut target = Item::new("wb-1", "Title", at());
    target.status = ItemStatus::Closed;

    let conflict = SyncConflict::between(&source, &target);
    assert_eq!(conflict.kind, ConflictType::Status);
    assert_eq!(conflict.source_id, "1");
    assert_eq!(conflict.target_id, "wb-1");

    target.title = "Other".into();
    assert_eq!(SyncConflict::between(&source, &target).kind, ConflictType::Data);
}

#[test]
fn fail_flips_success_and_keeps_entries() {
    let mut result = SyncResult::start(at());
    assert!(result.success);
    result.errors.push("NOT_FOUND: target get wb-9: gone".into());
    result.fail("PERMISSION_DENIED: permission denied: token".into());
    assert!(!result.success);
    assert_eq!(result.errors.len(), 2);
}

#[test]
fn result_serializes_duration_in_millis() {
    let mut result = SyncResult::start(at());
    result.duration = Duration::from_millis(1250);
    result.direction = Some(SyncDirection::SourceToTarget);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["duration"], 1250);
    assert_eq!(json["direction"], "source-to-target");

    let back: SyncResult = serde_json::from_value(json).unwrap();
    assert_eq!(back, result);
}

#[test]
fn record_summarizes_counts() {
    let mut result = SyncResult::start(at());
    result.items_processed = 4;
    result.items_created = 2;
    result.duration = Duration::from_millis(80);
    result.conflicts.push(SyncConflict::between(
        &Item::new("1", "A", at()),
        &Item::new("wb-1", "B", at()),
    ));

    let record = result.record();
    assert_eq!(record.items_processed, 4);
    assert_eq!(record.items_created, 2);
    assert_eq!(record.conflicts, 1);
    assert_eq!(record.duration_ms, 80);
    assert!(record.success);
}

#[test]
fn resolution_actions_are_kebab_case() {
    assert_eq!(
        serde_json::to_string(&ResolutionAction::SourceWins).unwrap(),
        "\"source-wins\""
    );
    assert_eq!(ResolutionAction::Merged.as_str(), "merged");
}
