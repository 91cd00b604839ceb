//! Acquisition strategies: "acquire if absent or already ours".
//!
//! Both strategies report a plain `bool`. A lock held by another run and a
//! transaction aborted by a concurrent writer are indistinguishable to the
//! caller: either way the submission is a duplicate.

use tracing::debug;

use jobunique_core::{LockKey, RunId, StorageMethod};

use crate::store::{LockStore, LockStoreError, PendingWrite, WatchOutcome};

/// An algorithm for claiming a lock record.
pub trait AcquisitionStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Try to make `run_id` the holder of `key` for `ttl_secs`.
    fn acquire(
        &self,
        store: &dyn LockStore,
        key: &LockKey,
        run_id: &RunId,
        ttl_secs: u64,
    ) -> Result<bool, LockStoreError>;
}

/// WATCH the key, GET it, and SETEX inside MULTI/EXEC when it is free or
/// already held by this run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyAcquisition;

impl AcquisitionStrategy for LegacyAcquisition {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn acquire(
        &self,
        store: &dyn LockStore,
        key: &LockKey,
        run_id: &RunId,
        ttl_secs: u64,
    ) -> Result<bool, LockStoreError> {
        let outcome = store.watch_set_ex(key.as_str(), &mut |current| match current {
            None => Some(PendingWrite::new(run_id.as_str(), ttl_secs)),
            Some(holder) if holder == run_id.as_str() => {
                Some(PendingWrite::new(run_id.as_str(), ttl_secs))
            }
            Some(_) => None,
        })?;

        if outcome == WatchOutcome::Aborted {
            debug!(lock_key = %key, run_id = %run_id, "lock acquisition lost to a concurrent writer");
        }
        Ok(outcome == WatchOutcome::Committed)
    }
}

/// `SET key run NX EX ttl`, falling back to a read so the holding run can
/// re-acquire idempotently.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicAcquisition;

impl AcquisitionStrategy for AtomicAcquisition {
    fn name(&self) -> &'static str {
        "atomic"
    }

    fn acquire(
        &self,
        store: &dyn LockStore,
        key: &LockKey,
        run_id: &RunId,
        ttl_secs: u64,
    ) -> Result<bool, LockStoreError> {
        if store.set_nx_ex(key.as_str(), run_id.as_str(), ttl_secs)? {
            return Ok(true);
        }
        Ok(store.get(key.as_str())?.as_deref() == Some(run_id.as_str()))
    }
}

/// Resolve the configured storage method to its strategy.
pub fn strategy_for(method: StorageMethod) -> Box<dyn AcquisitionStrategy> {
    match method {
        StorageMethod::Legacy => Box::new(LegacyAcquisition),
        StorageMethod::Atomic => Box::new(AtomicAcquisition),
    }
}
