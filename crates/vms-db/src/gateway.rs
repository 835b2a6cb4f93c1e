//! `vms-core` store traits backed by libSQL.

use std::collections::HashSet;

use async_trait::async_trait;
use vms_core::PersistenceError;
use vms_core::VmRecord;
use vms_core::store::{InventoryStore, StoreSession};

use crate::VmStore;
use crate::session::VmStoreSession;

#[async_trait]
impl InventoryStore for VmStore {
    type Session = VmStoreSession;

    async fn open_session(&self) -> Result<Self::Session, PersistenceError> {
        Ok(self.session().await?)
    }
}

#[async_trait]
impl StoreSession for VmStoreSession {
    async fn upsert(&self, records: &[VmRecord]) -> Result<usize, PersistenceError> {
        Ok(self.upsert_records(records).await?)
    }

    async fn delete_except(
        &self,
        scope: &str,
        surviving: &HashSet<String>,
    ) -> Result<usize, PersistenceError> {
        Ok(Self::delete_except(self, scope, surviving).await?)
    }

    async fn count_scope(&self, scope: &str) -> Result<usize, PersistenceError> {
        Ok(Self::count_scope(self, scope).await?)
    }
}
