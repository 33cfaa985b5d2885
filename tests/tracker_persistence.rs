//! Event history persistence tests
//!
//! Exercises the tracker through its public API only: ordering rules,
//! reload behaviour and corrupt storage handling.

use event_quota::quota::{EventQuotaTracker, HistoryError, QuotaRegistry};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn history_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("alarms.hist")
}

#[test]
fn test_three_events_scenario() {
    let dir = TempDir::new().unwrap();
    let tracker = EventQuotaTracker::load(history_path(&dir)).unwrap();

    for ts in [100, 200, 300] {
        tracker.record_event(ts).unwrap();
    }

    assert_eq!(tracker.nth_last_event_time(1), Some(300));
    assert_eq!(tracker.nth_last_event_time(2), Some(200));
    assert_eq!(tracker.nth_last_event_time(4), None);
}

#[test]
fn test_out_of_order_scenario() {
    let dir = TempDir::new().unwrap();
    let tracker = EventQuotaTracker::load(history_path(&dir)).unwrap();

    tracker.record_event(100).unwrap();
    tracker.record_event(200).unwrap();
    assert!(!tracker.record_event(150).unwrap());

    assert_eq!(tracker.snapshot().events, vec![100, 200]);

    // The rejected event never reached disk either
    let reloaded = EventQuotaTracker::load(history_path(&dir)).unwrap();
    assert_eq!(reloaded.snapshot().events, vec![100, 200]);
}

#[test]
fn test_truncated_storage_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = history_path(&dir);
    {
        let tracker = EventQuotaTracker::load(&path).unwrap();
        tracker.record_event(100).unwrap();
        tracker.record_event(200).unwrap();
    }

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();

    match EventQuotaTracker::load(&path) {
        Err(HistoryError::StorageCorrupt { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected StorageCorrupt, got {:?}", other),
    }
}

#[test]
fn test_garbage_storage_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = history_path(&dir);
    fs::write(&path, b"\x00\x00\x00\x05garbage").unwrap();

    assert!(EventQuotaTracker::load(&path).unwrap_err().is_corrupt());
}

#[test]
fn test_empty_file_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = history_path(&dir);
    fs::write(&path, b"").unwrap();

    assert!(EventQuotaTracker::load(&path).unwrap_err().is_corrupt());
}

#[test]
fn test_registry_reload_across_instances() {
    let dir = TempDir::new().unwrap();
    {
        let registry = QuotaRegistry::new(dir.path());
        let tracker = registry.tracker("com.example.alarms").unwrap();
        tracker.record_event(1_000).unwrap();
        tracker.record_event(2_000).unwrap();
    }

    let registry = QuotaRegistry::new(dir.path());
    assert_eq!(registry.stored_buckets().unwrap(), vec!["com.example.alarms"]);
    let tracker = registry.tracker("com.example.alarms").unwrap();
    assert_eq!(tracker.nth_last_event_time(2), Some(1_000));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_latest_is_first(events in prop::collection::btree_set(any::<i64>(), 1..40)) {
        let dir = TempDir::new().unwrap();
        let tracker = EventQuotaTracker::load(history_path(&dir)).unwrap();

        let ordered: Vec<i64> = events.into_iter().collect();
        for &ts in &ordered {
            prop_assert!(tracker.record_event(ts).unwrap());
            prop_assert_eq!(tracker.nth_last_event_time(1), Some(ts));
        }
        prop_assert_eq!(tracker.nth_last_event_time(ordered.len() + 1), None);
    }

    #[test]
    fn prop_stale_records_change_nothing(
        events in prop::collection::vec(-1_000i64..1_000, 0..40),
    ) {
        let dir = TempDir::new().unwrap();
        let tracker = EventQuotaTracker::load(history_path(&dir)).unwrap();

        let mut expected: Vec<i64> = Vec::new();
        for ts in events {
            let appended = tracker.record_event(ts).unwrap();
            let should_append = expected.last().map_or(true, |&last| ts > last);
            prop_assert_eq!(appended, should_append);
            if should_append {
                expected.push(ts);
            }
        }
        prop_assert_eq!(tracker.snapshot().events, expected);
    }

    #[test]
    fn prop_reload_answers_identically(
        events in prop::collection::btree_set(any::<i64>(), 0..30),
    ) {
        let dir = TempDir::new().unwrap();
        let tracker = EventQuotaTracker::load(history_path(&dir)).unwrap();
        for &ts in &events {
            tracker.record_event(ts).unwrap();
        }

        let reloaded = EventQuotaTracker::load(history_path(&dir)).unwrap();
        for n in 0..=events.len() + 1 {
            prop_assert_eq!(reloaded.nth_last_event_time(n), tracker.nth_last_event_time(n));
        }
    }
}
