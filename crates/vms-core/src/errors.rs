//! Cross-cutting error types for vmsync.
//!
//! Errors raised by the two collaborators of the sync pipeline live here so
//! the pipeline can stay generic over their implementations. Crate-specific
//! errors (`DatabaseError`, `ConfigError`, `SyncError`) are defined in their
//! own crates and convert into these at the trait boundary.

use thiserror::Error;

/// Errors that can be raised by any vmsync crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Data failed validation (format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors returned by an inventory provider session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The remote endpoint could not be reached or refused the session.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure on an otherwise open session.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The remote answer could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A raw item could not be turned into a record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot map item '{identifier}': {reason}")]
pub struct MapError {
    pub identifier: String,
    pub reason: String,
}

impl MapError {
    pub fn new(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

/// A write or read against the persistence gateway failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("persistence error: {0}")]
pub struct PersistenceError(pub String);
