//! In-memory provider and store for pipeline scenarios.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use vms_core::provider::{InventoryProvider, InventorySession, RawItem};
use vms_core::store::{InventoryStore, StoreSession};
use vms_core::{MapError, PersistenceError, ProviderError, VmRecord};
use vms_sync::{ItemLimits, RunSettings};

pub const SCOPE: &str = "vc01";

pub fn settings(batch_size: usize, workers: usize) -> RunSettings {
    RunSettings {
        batch_size,
        workers,
        limits: ItemLimits {
            fetch_timeout: Duration::from_secs(5),
            map_timeout: Duration::from_secs(5),
        },
        min_discovery_ratio: 0.0,
    }
}

pub fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// How one identifier behaves when fetched or mapped.
#[derive(Debug, Clone)]
pub enum Behavior {
    Found { name: String, cpus: i64 },
    Missing,
    FetchError,
    FetchHangs,
    Unmappable,
    MapHangs,
}

#[derive(Default)]
pub struct ProviderState {
    pub listing: Mutex<Option<Vec<String>>>,
    pub items: Mutex<HashMap<String, Behavior>>,
    /// Zero-based `open_session` calls that fail.
    pub failing_opens: Mutex<HashSet<usize>>,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct FakeProvider {
    pub state: Arc<ProviderState>,
}

impl FakeProvider {
    /// A provider listing `items`, each found with a name derived from its key.
    pub fn with_items(items: &[&str]) -> Self {
        let provider = Self::default();
        provider.set_listing(Some(ids(items)));
        for id in items {
            provider.set(id, Behavior::Found {
                name: format!("vm-{id}"),
                cpus: 2,
            });
        }
        provider
    }

    pub fn set_listing(&self, listing: Option<Vec<String>>) {
        *self.state.listing.lock().unwrap() = listing;
    }

    pub fn set(&self, id: &str, behavior: Behavior) {
        self.state.items.lock().unwrap().insert(id.to_string(), behavior);
    }

    pub fn fail_open(&self, call: usize) {
        self.state.failing_opens.lock().unwrap().insert(call);
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryProvider for FakeProvider {
    type Session = FakeSession;

    async fn open_session(&self) -> Result<FakeSession, ProviderError> {
        let call = self.state.opens.fetch_add(1, Ordering::SeqCst);
        if self.state.failing_opens.lock().unwrap().contains(&call) {
            return Err(ProviderError::Unavailable("login refused".into()));
        }
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_active.fetch_max(active, Ordering::SeqCst);
        Ok(FakeSession {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        })
    }
}

pub struct FakeSession {
    state: Arc<ProviderState>,
    closed: AtomicBool,
}

#[async_trait]
impl InventorySession for FakeSession {
    async fn list_identifiers(&self) -> Result<Vec<String>, ProviderError> {
        self.state
            .listing
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::Transport("listing refused".into()))
    }

    async fn fetch_item(&self, identifier: &str) -> Result<Option<RawItem>, ProviderError> {
        let behavior = self.state.items.lock().unwrap().get(identifier).cloned();
        // Yield so fetches within a batch interleave.
        tokio::task::yield_now().await;
        match behavior {
            None | Some(Behavior::Missing) => Ok(None),
            Some(Behavior::FetchError) => Err(ProviderError::Api {
                status: 500,
                message: "boom".into(),
            }),
            Some(Behavior::FetchHangs) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
            Some(Behavior::Found { name, cpus }) => Ok(Some(RawItem::new(
                identifier,
                json!({ "name": name, "cpus": cpus }),
            ))),
            Some(Behavior::Unmappable) => Ok(Some(RawItem::new(identifier, json!("garbage")))),
            Some(Behavior::MapHangs) => {
                Ok(Some(RawItem::new(identifier, json!({ "hang": true }))))
            }
        }
    }

    fn map_to_record(&self, raw: &RawItem) -> Result<VmRecord, MapError> {
        let Some(props) = raw.properties.as_object() else {
            return Err(MapError::new(&raw.identifier, "not an object"));
        };
        if props.contains_key("hang") {
            std::thread::sleep(Duration::from_millis(400));
        }
        Ok(VmRecord {
            name: props
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            numcpu: props.get("cpus").and_then(serde_json::Value::as_i64).unwrap_or(0),
            ..VmRecord::new(&raw.identifier, "provider-scope")
        })
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
            self.state.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StoreState {
    pub rows: Mutex<BTreeMap<String, VmRecord>>,
    pub fail_upserts: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub upsert_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    pub state: Arc<StoreState>,
}

impl MemoryStore {
    pub fn seed(&self, key: &str, scope: &str, name: &str) {
        let record = VmRecord {
            name: name.to_string(),
            ..VmRecord::new(key, scope)
        };
        self.state.rows.lock().unwrap().insert(key.to_string(), record);
    }

    pub fn row(&self, key: &str) -> Option<VmRecord> {
        self.state.rows.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.rows.lock().unwrap().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, VmRecord> {
        self.state.rows.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.state.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    type Session = MemorySession;

    async fn open_session(&self) -> Result<MemorySession, PersistenceError> {
        Ok(MemorySession {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MemorySession {
    state: Arc<StoreState>,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn upsert(&self, records: &[VmRecord]) -> Result<usize, PersistenceError> {
        self.state.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_upserts.load(Ordering::SeqCst) {
            return Err(PersistenceError("database is locked".into()));
        }
        let mut rows = self.state.rows.lock().unwrap();
        for record in records {
            rows.insert(record.vm_uuid.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn delete_except(
        &self,
        scope: &str,
        surviving: &HashSet<String>,
    ) -> Result<usize, PersistenceError> {
        self.state.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_deletes.load(Ordering::SeqCst) {
            return Err(PersistenceError("database is locked".into()));
        }
        let mut rows = self.state.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|key, record| record.scope != scope || surviving.contains(key));
        Ok(before - rows.len())
    }

    async fn count_scope(&self, scope: &str) -> Result<usize, PersistenceError> {
        let rows = self.state.rows.lock().unwrap();
        Ok(rows.values().filter(|r| r.scope == scope).count())
    }
}
