//! Database migration runner.
//!
//! Embeds the SQL migration files at compile time and executes them on
//! database open. All statements use `IF NOT EXISTS` for idempotent re-running.

use crate::error::DatabaseError;

/// Inventory table keyed by VM identity, plus the scope index.
const MIGRATION_001: &str = include_str!("../migrations/001_inventory.sql");

/// Run all embedded migrations in sequence.
pub(crate) async fn run_migrations(conn: &libsql::Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(MIGRATION_001)
        .await
        .map_err(|e| DatabaseError::Migration(format!("001_inventory: {e}")))?;
    Ok(())
}
