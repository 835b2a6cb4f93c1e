//! The inventory provider seam.
//!
//! A provider hands out sessions. Each worker opens its own session, uses it
//! for every item in its batch, and closes it on every exit path. Sessions
//! are shared between the concurrent fetch and map tasks of one batch, so
//! they must be `Send + Sync`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{MapError, ProviderError};
use crate::record::VmRecord;

/// The raw attribute bag for one item, as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// The identifier this item was fetched by.
    pub identifier: String,
    pub properties: serde_json::Value,
}

impl RawItem {
    pub fn new(identifier: impl Into<String>, properties: serde_json::Value) -> Self {
        Self {
            identifier: identifier.into(),
            properties,
        }
    }
}

/// Factory for provider sessions.
#[async_trait]
pub trait InventoryProvider: Send + Sync + 'static {
    type Session: InventorySession;

    /// Open an authenticated session against the remote inventory.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unavailable` if the endpoint cannot be reached
    /// or refuses the credentials.
    async fn open_session(&self) -> Result<Self::Session, ProviderError>;
}

/// One authenticated conversation with the remote inventory.
#[async_trait]
pub trait InventorySession: Send + Sync + 'static {
    /// Every item key currently known in the scope.
    async fn list_identifiers(&self) -> Result<Vec<String>, ProviderError>;

    /// Fetch one item. `Ok(None)` means the item no longer exists.
    async fn fetch_item(&self, identifier: &str) -> Result<Option<RawItem>, ProviderError>;

    /// Turn a raw item into a fully populated record.
    ///
    /// Pure and synchronous. Missing sub-fields are defaulted; an error is
    /// only returned for input that is not an item at all.
    fn map_to_record(&self, raw: &RawItem) -> Result<VmRecord, MapError>;

    /// Release the session. Must be safe to call after a failed fetch.
    async fn close(&self);
}
