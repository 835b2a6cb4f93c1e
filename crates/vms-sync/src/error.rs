//! Sync run error types.

use thiserror::Error;
use vms_config::ConfigError;
use vms_core::{CoreError, ProviderError, RunReport};

/// Errors that end a sync run.
///
/// Per-item and per-batch failures never surface here; they are recorded in
/// the [`RunReport`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// Discovery could not be performed. Nothing was written.
    #[error("discovery failed: {0}")]
    ProviderUnavailable(#[source] ProviderError),

    /// Rejected before the run started.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The store rejected every batch that had records to write. The report
    /// is still attached.
    #[error("persistence unavailable: the store rejected every batch with records")]
    PersistenceUnavailable(Box<RunReport>),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<ConfigError> for SyncError {
    fn from(error: ConfigError) -> Self {
        Self::InvalidConfiguration(error.to_string())
    }
}
