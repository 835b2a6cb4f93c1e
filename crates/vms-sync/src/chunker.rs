//! Order-preserving split of the identifier set into batches.

use vms_core::Batch;

use crate::error::SyncError;

/// Split `identifiers` into consecutive batches of at most `size` items.
///
/// Yields `ceil(n / size)` batches; only the last may be short. Concatenating
/// the batches gives back the input in its original order.
///
/// # Errors
///
/// Returns [`SyncError::InvalidConfiguration`] when `size` is zero.
pub fn chunk(identifiers: &[String], size: usize) -> Result<Vec<Batch>, SyncError> {
    if size == 0 {
        return Err(SyncError::InvalidConfiguration(
            "batch size must be at least 1".to_string(),
        ));
    }
    Ok(identifiers
        .chunks(size)
        .enumerate()
        .map(|(index, ids)| Batch {
            index,
            identifiers: ids.to_vec(),
        })
        .collect())
}
