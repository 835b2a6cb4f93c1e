//! # vms-core
//!
//! Core types shared by every vmsync crate:
//! - [`record::VmRecord`], the normalized shape of one virtual machine
//! - synthetic identity keys for items the source reports without one
//! - [`identifiers::IdentifierSet`] and [`identifiers::Batch`]
//! - the run report and its per-batch / per-item entries
//! - the traits the sync pipeline consumes from its two collaborators,
//!   the inventory provider and the persistence gateway

pub mod errors;
pub mod identifiers;
pub mod ids;
pub mod provider;
pub mod record;
pub mod report;
pub mod store;

pub use errors::{CoreError, MapError, PersistenceError, ProviderError};
pub use identifiers::{Batch, IdentifierSet};
pub use record::VmRecord;
pub use report::{BatchReport, BatchStage, DeleteSkipReason, FailureReason, ItemFailure, RunReport, RunState};
