//! Synthetic identity keys.
//!
//! Some inventory items come back without a native UUID. They still need a
//! stable primary key, so one is derived from the attributes that identify
//! the item inside its scope. Synthetic keys carry [`SYNTHETIC_PREFIX`] so they
//! can never collide with, or be mistaken for, a native key.

use uuid::Uuid;

/// Prefix carried by every generated key.
pub const SYNTHETIC_PREFIX: &str = "synthetic-";

/// Namespace for UUIDv5 derivation of synthetic keys.
const SYNTHETIC_NAMESPACE: Uuid = Uuid::from_u128(0x6d1c_7f0e_2b4a_4c8e_9f3d_51a0_b7e2_c915);

/// Derive a deterministic synthetic key for an item with no native UUID.
///
/// The same inputs always produce the same key. Fields are length-prefixed
/// before hashing so `("ab", "c")` and `("a", "bc")` do not collide.
#[must_use]
pub fn synthetic_key(scope: &str, name: &str, vm_path: &str, moref: &str) -> String {
    let mut material = Vec::with_capacity(scope.len() + name.len() + vm_path.len() + moref.len() + 32);
    for part in [scope, name, vm_path, moref] {
        material.extend_from_slice(&(part.len() as u64).to_le_bytes());
        material.extend_from_slice(part.as_bytes());
    }
    format!(
        "{SYNTHETIC_PREFIX}{}",
        Uuid::new_v5(&SYNTHETIC_NAMESPACE, &material)
    )
}

/// Whether `key` was produced by [`synthetic_key`].
#[must_use]
pub fn is_synthetic_key(key: &str) -> bool {
    key.starts_with(SYNTHETIC_PREFIX)
}
