//! Administrative lock maintenance.

use tracing::info;

use crate::store::{escape_glob, LockStore, LockStoreError};

/// Delete every lock key under `prefix` in one batch.
///
/// Returns the number of keys removed; no matching keys is a no-op.
pub fn clear_all<S: LockStore + ?Sized>(store: &S, prefix: &str) -> Result<u64, LockStoreError> {
    let pattern = format!("{}*", escape_glob(prefix));
    let keys = store.keys(&pattern)?;
    if keys.is_empty() {
        return Ok(0);
    }

    let removed = store.del(&keys)?;
    info!(prefix = %prefix, removed, "cleared unique locks");
    Ok(removed)
}

/// Delete specific lock keys, skipping the store call when there are none.
pub fn clear_keys<S: LockStore + ?Sized>(store: &S, keys: &[String]) -> Result<u64, LockStoreError> {
    if keys.is_empty() {
        return Ok(0);
    }
    store.del(keys)
}
