//! Full runs against an on-disk libsql store.
//!
//! - Concurrent batches writing through separate store sessions
//! - Orphan delete scoped to the run, with a second scope left alone

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use common::{Behavior, FakeProvider, SCOPE, settings};
use vms_core::VmRecord;
use vms_db::VmStore;
use vms_sync::Reconciler;

async fn disk_store(dir: &TempDir) -> VmStore {
    let path = dir.path().join("inventory.db");
    VmStore::open_local(path.to_str().unwrap()).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_writes_and_prunes_through_libsql() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(disk_store(&dir).await);
    {
        let session = store.session().await.unwrap();
        session
            .upsert_records(&[
                VmRecord::new("retired", SCOPE),
                VmRecord::new("kept-elsewhere", "vc02"),
                VmRecord {
                    name: "before".into(),
                    ..VmRecord::new("vm03", SCOPE)
                },
            ])
            .await
            .unwrap();
    }

    let names: Vec<String> = (0..12).map(|i| format!("vm{i:02}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let provider = FakeProvider::with_items(&refs);
    provider.set("vm03", Behavior::FetchError);

    let reconciler =
        Reconciler::with_settings(Arc::new(provider), Arc::clone(&store), settings(4, 3), SCOPE)
            .unwrap();
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.discovered, 12);
    assert_eq!(report.upserted, 11);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed_batches(), 0);

    let session = store.session().await.unwrap();
    let mut keys = session.keys_in_scope(SCOPE).await.unwrap();
    keys.sort();
    assert_eq!(keys, names);
    assert_eq!(session.get("vm03").await.unwrap().unwrap().name, "before");
    assert_eq!(session.get("vm07").await.unwrap().unwrap().name, "vm-vm07");
    assert!(session.get("kept-elsewhere").await.unwrap().is_some());
    assert!(session.get("retired").await.unwrap().is_none());
}

#[tokio::test]
async fn rerun_leaves_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(disk_store(&dir).await);
    let provider = Arc::new(FakeProvider::with_items(&["a", "b", "c"]));
    let reconciler =
        Reconciler::with_settings(provider, Arc::clone(&store), settings(2, 2), SCOPE).unwrap();

    reconciler.run().await.unwrap();
    let session = store.session().await.unwrap();
    let first = session.list_scope(SCOPE).await.unwrap();
    drop(session);

    let second_report = reconciler.run().await.unwrap();
    let session = store.session().await.unwrap();
    assert_eq!(session.list_scope(SCOPE).await.unwrap(), first);
    assert_eq!(second_report.deleted, 0);
}
