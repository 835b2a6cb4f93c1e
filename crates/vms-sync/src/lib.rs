//! # vms-sync
//!
//! The batch reconciliation pipeline.
//!
//! [`Reconciler::run`] lists every identifier in the scope, splits the list
//! with [`chunk`], and hands each batch to a [`BatchWorker`]. At most
//! `workers` batches run at once; each commits its own records as soon as it
//! finishes. Once every batch has settled, rows whose keys were not
//! discovered are deleted, unless one of the delete guards holds:
//!
//! - discovery came back empty
//! - discovery found fewer items than `min_discovery_ratio` of what is stored
//! - no batch committed
//!
//! The run is generic over the two collaborators it talks to, the
//! [`vms_core::provider::InventoryProvider`] and the
//! [`vms_core::store::InventoryStore`].

pub mod chunker;
pub mod error;
pub mod reconciler;
pub mod worker;

pub use chunker::chunk;
pub use error::SyncError;
pub use reconciler::{Reconciler, RunSettings};
pub use worker::{BatchOutcome, BatchWorker, ItemLimits};
