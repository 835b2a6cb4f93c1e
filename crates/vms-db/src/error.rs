//! Database error types for vms-db.

use thiserror::Error;
use vms_core::PersistenceError;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// A row could not be turned back into a record.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DatabaseError> for PersistenceError {
    fn from(error: DatabaseError) -> Self {
        Self(error.to_string())
    }
}
