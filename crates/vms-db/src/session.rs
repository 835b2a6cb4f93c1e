//! Per-worker store session: upsert, orphan delete, and read queries.

use std::collections::HashSet;
use std::sync::Arc;

use libsql::TransactionBehavior;
use tokio::sync::Mutex;
use vms_core::VmRecord;

use crate::error::DatabaseError;
use crate::helpers::{SELECT_COLUMNS, UPSERT_SQL, record_params, row_to_record};

/// One connection, owned by one worker for the length of a batch.
pub struct VmStoreSession {
    conn: libsql::Connection,
    gate: Option<Arc<Mutex<()>>>,
}

impl VmStoreSession {
    pub(crate) const fn new(conn: libsql::Connection, gate: Option<Arc<Mutex<()>>>) -> Self {
        Self { conn, gate }
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Insert or overwrite every record by key in a single transaction.
    ///
    /// Either every record in the slice lands or none does.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if any statement or the commit fails; the
    /// transaction is rolled back.
    pub async fn upsert_records(&self, records: &[VmRecord]) -> Result<usize, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }
        let _turn = self.take_turn().await;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;
        for record in records {
            let result = tx
                .execute(UPSERT_SQL.as_str(), libsql::params_from_iter(record_params(record)))
                .await;
            if let Err(e) = result {
                tx.rollback().await?;
                return Err(DatabaseError::Query(format!(
                    "upsert of '{}' failed: {e}",
                    record.vm_uuid
                )));
            }
        }
        tx.commit().await?;
        Ok(records.len())
    }

    /// Delete every row in `scope` whose key is not in `surviving`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the scan or any delete fails; deletes are
    /// rolled back together.
    pub async fn delete_except(
        &self,
        scope: &str,
        surviving: &HashSet<String>,
    ) -> Result<usize, DatabaseError> {
        let orphans: Vec<String> = self
            .keys_in_scope(scope)
            .await?
            .into_iter()
            .filter(|key| !surviving.contains(key))
            .collect();
        if orphans.is_empty() {
            return Ok(0);
        }

        let _turn = self.take_turn().await;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;
        let mut deleted = 0usize;
        for key in &orphans {
            let result = tx
                .execute(
                    "DELETE FROM vm_inventory WHERE vm_uuid = ?1 AND scope = ?2",
                    libsql::params![key.as_str(), scope],
                )
                .await;
            match result {
                Ok(n) => deleted += usize::try_from(n).unwrap_or(0),
                Err(e) => {
                    tx.rollback().await?;
                    return Err(DatabaseError::Query(format!("delete of '{key}' failed: {e}")));
                }
            }
        }
        tx.commit().await?;
        tracing::debug!(scope, deleted, "deleted orphaned rows");
        Ok(deleted)
    }

    /// Number of rows tagged `scope`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_scope(&self, scope: &str) -> Result<usize, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM vm_inventory WHERE scope = ?1", [scope])
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|e| DatabaseError::InvalidRow(e.to_string()))
    }

    /// All keys tagged `scope`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn keys_in_scope(&self, scope: &str) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT vm_uuid FROM vm_inventory WHERE scope = ?1 ORDER BY vm_uuid",
                [scope],
            )
            .await?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }
        Ok(keys)
    }

    /// Fetch one record by key.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or the row is malformed.
    pub async fn get(&self, vm_uuid: &str) -> Result<Option<VmRecord>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {} FROM vm_inventory WHERE vm_uuid = ?1", SELECT_COLUMNS.as_str()),
                [vm_uuid],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    /// All records in `scope`, ordered by name then key.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or a row is malformed.
    pub async fn list_scope(&self, scope: &str) -> Result<Vec<VmRecord>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {} FROM vm_inventory WHERE scope = ?1 ORDER BY name, vm_uuid",
                    SELECT_COLUMNS.as_str()
                ),
                [scope],
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(row_to_record(&row)?);
        }
        Ok(results)
    }

    /// Every scope present in the table with its row count.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn scopes(&self) -> Result<Vec<(String, usize)>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT scope, COUNT(*) FROM vm_inventory GROUP BY scope ORDER BY scope",
                (),
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let count = usize::try_from(row.get::<i64>(1)?)
                .map_err(|e| DatabaseError::InvalidRow(e.to_string()))?;
            results.push((row.get::<String>(0)?, count));
        }
        Ok(results)
    }

    async fn take_turn(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        }
    }
}
