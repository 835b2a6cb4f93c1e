//! The persistence gateway seam.
//!
//! The store hands out sessions, one per worker unit. A session owns its own
//! connection and releases it when dropped; nothing is shared for mutation
//! between sessions.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::errors::PersistenceError;
use crate::record::VmRecord;

/// Factory for store sessions.
#[async_trait]
pub trait InventoryStore: Send + Sync + 'static {
    type Session: StoreSession;

    /// Open a session with its own connection.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if no connection can be established.
    async fn open_session(&self) -> Result<Self::Session, PersistenceError>;
}

#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Insert or fully overwrite each record by key, atomically for the slice.
    ///
    /// Safe to repeat with overlapping keys. Returns the number of rows written.
    async fn upsert(&self, records: &[VmRecord]) -> Result<usize, PersistenceError>;

    /// Delete every row tagged `scope` whose key is not in `surviving`.
    ///
    /// Returns the number of rows deleted.
    async fn delete_except(
        &self,
        scope: &str,
        surviving: &HashSet<String>,
    ) -> Result<usize, PersistenceError>;

    /// Number of rows currently tagged `scope`.
    async fn count_scope(&self, scope: &str) -> Result<usize, PersistenceError>;
}
