//! Row-to-record conversion and SQL built from the record's column list.
//!
//! The statements are derived from `VmRecord::COLUMNS` so the field list is
//! only ever declared once, in `vms-core`.

use std::sync::LazyLock;

use vms_core::VmRecord;
use vms_core::record::FieldValue;

use crate::error::DatabaseError;

pub(crate) static SELECT_COLUMNS: LazyLock<String> = LazyLock::new(|| VmRecord::COLUMNS.join(", "));

/// `INSERT ... ON CONFLICT(vm_uuid) DO UPDATE` overwriting every non-key column.
pub(crate) static UPSERT_SQL: LazyLock<String> = LazyLock::new(|| {
    let columns = VmRecord::COLUMNS;
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let assignments: Vec<String> = columns
        .iter()
        .skip(1)
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    format!(
        "INSERT INTO vm_inventory ({}) VALUES ({})
         ON CONFLICT(vm_uuid) DO UPDATE SET {}, updated_at = datetime('now')",
        columns.join(", "),
        placeholders.join(", "),
        assignments.join(", ")
    )
});

/// Convert a record into positional libSQL values.
pub(crate) fn record_params(record: &VmRecord) -> Vec<libsql::Value> {
    record
        .to_fields()
        .into_iter()
        .map(|field| match field {
            FieldValue::Null => libsql::Value::Null,
            FieldValue::Text(s) => libsql::Value::Text(s),
            FieldValue::Integer(n) => libsql::Value::Integer(n),
        })
        .collect()
}

/// Parse a row selected with [`SELECT_COLUMNS`].
///
/// # Errors
///
/// Returns `DatabaseError::InvalidRow` if a column holds a value the record
/// field cannot take.
pub(crate) fn row_to_record(row: &libsql::Row) -> Result<VmRecord, DatabaseError> {
    let mut values = Vec::with_capacity(VmRecord::COLUMNS.len());
    for idx in 0..VmRecord::COLUMNS.len() {
        let idx = i32::try_from(idx).map_err(|e| DatabaseError::InvalidRow(e.to_string()))?;
        let value = match row.get_value(idx)? {
            libsql::Value::Null => FieldValue::Null,
            libsql::Value::Integer(n) => FieldValue::Integer(n),
            libsql::Value::Text(s) => FieldValue::Text(s),
            other => {
                return Err(DatabaseError::InvalidRow(format!(
                    "unexpected value {other:?} in column {idx}"
                )));
            }
        };
        values.push(value);
    }
    VmRecord::from_fields(values).map_err(|e| DatabaseError::InvalidRow(e.to_string()))
}
