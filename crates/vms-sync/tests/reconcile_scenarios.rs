//! Reconciler scenarios against the in-memory provider and store.
//!
//! - Partial-failure containment: failed items keep their rows
//! - Deletion correctness: only undiscovered keys in the scope go
//! - Idempotence across two runs
//! - Delete guards: empty discovery, sanity ratio, nothing committed
//! - Per-item timeouts, session failures, bounded concurrency

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{Behavior, FakeProvider, MemoryStore, SCOPE, ids, settings};
use vms_core::{BatchStage, DeleteSkipReason, FailureReason, RunState};
use vms_sync::{Reconciler, RunSettings, SyncError};

fn reconciler(
    provider: &FakeProvider,
    store: &MemoryStore,
    settings: RunSettings,
) -> Reconciler<FakeProvider, MemoryStore> {
    Reconciler::with_settings(
        Arc::new(provider.clone()),
        Arc::new(store.clone()),
        settings,
        SCOPE,
    )
    .unwrap()
}

fn reasons_for(report: &vms_core::RunReport, id: &str) -> Vec<FailureReason> {
    report
        .failed_items
        .iter()
        .filter(|f| f.identifier == id)
        .map(|f| f.reason.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Partial failure + deletion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_fetch_keeps_row_and_stale_row_is_deleted() {
    let provider = FakeProvider::with_items(&["a", "b", "c"]);
    provider.set("b", Behavior::FetchError);
    let store = MemoryStore::default();
    store.seed("b", SCOPE, "b-before");
    store.seed("z", SCOPE, "stale");

    let report = reconciler(&provider, &store, settings(2, 4)).run().await.unwrap();

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.discovered, 3);
    assert_eq!(report.transformed, 2);
    assert_eq!(report.upserted, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.batches.len(), 2);
    assert_eq!(report.batches[0].size, 2);
    assert_eq!(report.batches[1].size, 1);
    assert_eq!(report.failure_count(), 1);
    assert!(matches!(
        reasons_for(&report, "b").as_slice(),
        [FailureReason::FetchFailed(_)]
    ));

    assert_eq!(store.keys(), ids(&["a", "b", "c"]));
    assert_eq!(store.row("a").unwrap().name, "vm-a");
    assert_eq!(store.row("b").unwrap().name, "b-before");
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn vanished_item_is_not_found_and_not_deleted() {
    let provider = FakeProvider::with_items(&["a", "gone"]);
    provider.set("gone", Behavior::Missing);
    let store = MemoryStore::default();
    store.seed("gone", SCOPE, "still here");

    let report = reconciler(&provider, &store, settings(50, 4)).run().await.unwrap();

    assert_eq!(reasons_for(&report, "gone"), vec![FailureReason::NotFound]);
    assert_eq!(report.deleted, 0);
    assert_eq!(store.row("gone").unwrap().name, "still here");
}

#[tokio::test]
async fn unmappable_item_is_a_map_failure() {
    let provider = FakeProvider::with_items(&["a", "b"]);
    provider.set("b", Behavior::Unmappable);
    let store = MemoryStore::default();

    let report = reconciler(&provider, &store, settings(50, 1)).run().await.unwrap();

    assert!(matches!(
        reasons_for(&report, "b").as_slice(),
        [FailureReason::MapFailed(_)]
    ));
    assert_eq!(store.keys(), ids(&["a"]));
}

#[tokio::test]
async fn delete_never_touches_other_scopes() {
    let provider = FakeProvider::with_items(&["a"]);
    let store = MemoryStore::default();
    store.seed("old", SCOPE, "old");
    store.seed("other", "vc02", "belongs to vc02");

    let report = reconciler(&provider, &store, settings(50, 4)).run().await.unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(store.keys(), ids(&["a", "other"]));
}

#[tokio::test]
async fn records_are_tagged_with_run_scope() {
    let provider = FakeProvider::with_items(&["a"]);
    let store = MemoryStore::default();

    reconciler(&provider, &store, settings(50, 4)).run().await.unwrap();

    assert_eq!(store.row("a").unwrap().scope, SCOPE);
}

#[tokio::test]
async fn duplicate_and_blank_identifiers_are_dropped() {
    let provider = FakeProvider::with_items(&["a", "b"]);
    provider.set_listing(Some(ids(&["a", "", "b", "a", "  "])));
    let store = MemoryStore::default();

    let report = reconciler(&provider, &store, settings(1, 4)).run().await.unwrap();

    assert_eq!(report.discovered, 2);
    assert_eq!(report.batches.len(), 2);
    assert_eq!(report.upserted, 2);
}

// ---------------------------------------------------------------------------
// Idempotence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_run_is_idempotent() {
    let provider = FakeProvider::with_items(&["a", "b", "c", "d", "e"]);
    let store = MemoryStore::default();
    let reconciler = reconciler(&provider, &store, settings(2, 2));

    let first = reconciler.run().await.unwrap();
    let after_first = store.snapshot();
    let second = reconciler.run().await.unwrap();

    assert_eq!(first.upserted, 5);
    assert_eq!(store.snapshot(), after_first);
    assert_eq!(second.upserted, second.discovered);
    assert_eq!(second.deleted, 0);
}

// ---------------------------------------------------------------------------
// Delete guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_discovery_deletes_nothing() {
    let provider = FakeProvider::with_items(&[]);
    let store = MemoryStore::default();
    store.seed("a", SCOPE, "a");
    store.seed("b", SCOPE, "b");

    let report = reconciler(&provider, &store, settings(50, 4)).run().await.unwrap();

    assert_eq!(report.discovered, 0);
    assert_eq!(report.deleted, 0);
    assert!(report.batches.is_empty());
    assert_eq!(report.delete_skipped, Some(DeleteSkipReason::EmptyDiscovery));
    assert_eq!(store.keys(), ids(&["a", "b"]));
    assert_eq!(store.delete_calls(), 0);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn ratio_guard_blocks_mass_delete() {
    let provider = FakeProvider::with_items(&["a", "b"]);
    let store = MemoryStore::default();
    for i in 0..10 {
        store.seed(&format!("old-{i}"), SCOPE, "old");
    }
    let guarded = RunSettings {
        min_discovery_ratio: 0.5,
        ..settings(50, 4)
    };

    let report = reconciler(&provider, &store, guarded).run().await.unwrap();

    assert!(matches!(
        report.delete_skipped,
        Some(DeleteSkipReason::BelowSanityThreshold {
            discovered: 2,
            existing: 12,
            ..
        })
    ));
    assert_eq!(report.deleted, 0);
    assert_eq!(store.keys().len(), 12);
}

#[tokio::test]
async fn ratio_guard_allows_normal_churn() {
    let provider = FakeProvider::with_items(&["a", "b", "c", "d"]);
    let store = MemoryStore::default();
    store.seed("retired", SCOPE, "old");
    let guarded = RunSettings {
        min_discovery_ratio: 0.5,
        ..settings(50, 4)
    };

    let report = reconciler(&provider, &store, guarded).run().await.unwrap();

    assert_eq!(report.delete_skipped, None);
    assert_eq!(report.deleted, 1);
}

#[tokio::test]
async fn total_persistence_failure_escalates() {
    let provider = FakeProvider::with_items(&["a", "b", "c"]);
    let store = MemoryStore::default();
    store.seed("z", SCOPE, "must survive");
    store.state.fail_upserts.store(true, Ordering::SeqCst);

    let err = reconciler(&provider, &store, settings(2, 4)).run().await.unwrap_err();

    let SyncError::PersistenceUnavailable(report) = err else {
        panic!("expected PersistenceUnavailable, got {err:?}");
    };
    assert!(report.every_batch_failed());
    assert!(report.persistence_unavailable());
    assert_eq!(report.upserted, 0);
    assert_eq!(report.delete_skipped, Some(DeleteSkipReason::NoBatchCommitted));
    assert_eq!(report.exit_code(), 2);
    assert!(
        report
            .failed_items
            .iter()
            .all(|f| matches!(f.reason, FailureReason::PersistenceFailed(_)))
    );
    assert_eq!(store.keys(), ids(&["z"]));
    assert_eq!(store.delete_calls(), 0);
}

#[tokio::test]
async fn failed_delete_is_reported_not_fatal() {
    let provider = FakeProvider::with_items(&["a"]);
    let store = MemoryStore::default();
    store.state.fail_deletes.store(true, Ordering::SeqCst);

    let report = reconciler(&provider, &store, settings(50, 4)).run().await.unwrap();

    assert_eq!(report.state, RunState::Done);
    assert!(report.delete_error.is_some());
    assert_eq!(report.upserted, 1);
}

// ---------------------------------------------------------------------------
// Discovery + sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn discovery_failure_is_fatal_and_writes_nothing() {
    let provider = FakeProvider::with_items(&["a"]);
    provider.set_listing(None);
    let store = MemoryStore::default();
    store.seed("a", SCOPE, "untouched");

    let err = reconciler(&provider, &store, settings(50, 4)).run().await.unwrap_err();

    assert!(matches!(err, SyncError::ProviderUnavailable(_)));
    assert_eq!(store.row("a").unwrap().name, "untouched");
    assert_eq!(store.state.upsert_calls.load(Ordering::SeqCst), 0);
    assert_eq!(provider.closes(), 1);
}

#[tokio::test]
async fn discovery_login_failure_is_fatal() {
    let provider = FakeProvider::with_items(&["a"]);
    provider.fail_open(0);
    let store = MemoryStore::default();

    let err = reconciler(&provider, &store, settings(50, 4)).run().await.unwrap_err();

    assert!(matches!(err, SyncError::ProviderUnavailable(_)));
}

#[tokio::test]
async fn batch_session_failure_fails_only_that_batch() {
    let provider = FakeProvider::with_items(&["a", "b", "c", "d"]);
    // Call 0 is discovery; call 1 is whichever batch opens first.
    provider.fail_open(1);
    let store = MemoryStore::default();
    for id in ["a", "b", "c", "d"] {
        store.seed(id, SCOPE, "before");
    }

    let report = reconciler(&provider, &store, settings(2, 1)).run().await.unwrap();

    assert_eq!(report.failed_batches(), 1);
    assert_eq!(report.upserted, 2);
    assert_eq!(report.deleted, 0);
    let failed: Vec<&str> = report
        .failed_items
        .iter()
        .map(|f| {
            assert!(matches!(f.reason, FailureReason::SessionUnavailable(_)));
            f.identifier.as_str()
        })
        .collect();
    assert_eq!(failed.len(), 2);
    for id in failed {
        assert_eq!(store.row(id).unwrap().name, "before");
    }
    assert_eq!(store.keys().len(), 4);
}

#[tokio::test]
async fn lost_vcenter_session_in_only_batch_is_not_a_persistence_outage() {
    let provider = FakeProvider::with_items(&["a", "b"]);
    provider.fail_open(1);
    let store = MemoryStore::default();
    store.seed("a", SCOPE, "before");
    store.seed("stale", SCOPE, "kept");

    let report = reconciler(&provider, &store, settings(50, 1)).run().await.unwrap();

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.batches[0].failed_at, Some(BatchStage::Session));
    assert!(report.every_batch_failed());
    assert!(!report.persistence_unavailable());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.delete_skipped, Some(DeleteSkipReason::NoBatchCommitted));
    assert_eq!(store.keys(), ids(&["a", "stale"]));
    assert_eq!(store.state.upsert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_opened_session_is_closed() {
    let provider = FakeProvider::with_items(&["a", "b", "c", "d", "e"]);
    provider.set("b", Behavior::FetchError);
    provider.set("d", Behavior::Unmappable);
    let store = MemoryStore::default();

    reconciler(&provider, &store, settings(2, 2)).run().await.unwrap();

    assert_eq!(provider.opens(), 4);
    assert_eq!(provider.closes(), 4);
}

#[tokio::test]
async fn concurrent_batches_are_bounded_by_workers() {
    let names: Vec<String> = (0..40).map(|i| format!("vm{i:02}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let provider = FakeProvider::with_items(&refs);
    let store = MemoryStore::default();

    let report = reconciler(&provider, &store, settings(3, 2)).run().await.unwrap();

    assert_eq!(report.batches.len(), 14);
    assert_eq!(report.upserted, 40);
    assert!(provider.max_active() <= 2, "max active {}", provider.max_active());
    let indices: Vec<usize> = report.batches.iter().map(|b| b.index).collect();
    assert_eq!(indices, (0..14).collect::<Vec<_>>());
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hung_fetch_times_out_without_blocking_batch() {
    let provider = FakeProvider::with_items(&["a", "b", "c"]);
    provider.set("b", Behavior::FetchHangs);
    let store = MemoryStore::default();
    store.seed("b", SCOPE, "before");
    let mut fast = settings(50, 4);
    fast.limits.fetch_timeout = Duration::from_millis(100);

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        reconciler(&provider, &store, fast).run(),
    )
    .await
    .expect("run finishes")
    .unwrap();

    assert_eq!(reasons_for(&report, "b"), vec![FailureReason::FetchTimeout]);
    assert_eq!(report.upserted, 2);
    assert_eq!(store.row("b").unwrap().name, "before");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hung_map_times_out() {
    let provider = FakeProvider::with_items(&["a", "b"]);
    provider.set("b", Behavior::MapHangs);
    let store = MemoryStore::default();
    let mut fast = settings(50, 4);
    fast.limits.map_timeout = Duration::from_millis(50);

    let report = reconciler(&provider, &store, fast).run().await.unwrap();

    assert_eq!(reasons_for(&report, "b"), vec![FailureReason::MapTimeout]);
    assert_eq!(store.keys(), ids(&["a"]));
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn empty_scope_is_invalid_configuration() {
    let result = Reconciler::with_settings(
        Arc::new(FakeProvider::default()),
        Arc::new(MemoryStore::default()),
        settings(50, 4),
        "  ",
    );
    assert!(matches!(result, Err(SyncError::InvalidConfiguration(_))));
}

#[test]
fn zero_batch_size_from_config_is_invalid() {
    let config = vms_config::SyncConfig {
        batch_size: 0,
        ..Default::default()
    };
    let result = Reconciler::new(
        Arc::new(FakeProvider::default()),
        Arc::new(MemoryStore::default()),
        &config,
        SCOPE,
    );
    assert!(matches!(result, Err(SyncError::InvalidConfiguration(_))));
}
