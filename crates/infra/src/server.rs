//! Server-side release coordinator.
//!
//! Wraps job execution and releases the job's lock either right before the
//! body runs or after it completes successfully. A failing body under
//! after-execution ordering keeps the lock until its TTL runs out, so retries
//! of the same job cannot stampede.

use std::sync::Arc;

use tracing::{debug, warn};

use jobunique_core::{
    unlock_order_configured, JobOptions, JobPayload, LockKey, UniqueJobsConfig, UnlockOrder,
};

use crate::registry::JobRegistry;
use crate::store::{LockStore, LockStoreError};

/// Job instances executed under the coordinator.
pub trait UniqueJob {
    /// Called after the lock has been released, in inline execution only.
    fn after_unlock(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Failure while executing a job under the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError<E> {
    /// The store failed while releasing the lock.
    #[error(transparent)]
    Store(#[from] LockStoreError),
    /// The job body failed; passed through unchanged.
    #[error("job failed: {0}")]
    Job(E),
    /// The `after_unlock` hook failed.
    #[error("after_unlock hook failed: {0}")]
    Hook(anyhow::Error),
}

impl<E> ExecutionError<E> {
    pub fn job(&self) -> Option<&E> {
        match self {
            ExecutionError::Job(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-invocation lifecycle: the lock is released at most once.
#[derive(Debug)]
struct Invocation<'a> {
    lock_key: &'a LockKey,
    order: UnlockOrder,
    released: bool,
}

impl<'a> Invocation<'a> {
    fn new(lock_key: &'a LockKey, order: UnlockOrder) -> Self {
        Self {
            lock_key,
            order,
            released: false,
        }
    }

    fn release<S: LockStore + ?Sized>(&mut self, store: &S) -> Result<(), LockStoreError> {
        if self.released {
            return Ok(());
        }
        let existed = store.del_one(self.lock_key.as_str())?;
        self.released = true;
        debug!(
            lock_key = %self.lock_key,
            unlock_order = self.order.as_str(),
            existed,
            "unique lock released"
        );
        Ok(())
    }
}

/// Executes jobs and releases their locks according to the unlock order.
pub struct ReleaseCoordinator<S: LockStore> {
    store: S,
    config: UniqueJobsConfig,
    registry: Arc<JobRegistry>,
    inline: bool,
}

impl<S: LockStore> ReleaseCoordinator<S> {
    pub fn new(store: S, config: UniqueJobsConfig, registry: Arc<JobRegistry>) -> Self {
        Self {
            store,
            config,
            registry,
            inline: false,
        }
    }

    /// Enable the `after_unlock` hook (inline execution).
    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    /// Job-type override if present, else the process-wide default.
    pub fn decide_unlock_order(&self, options: &JobOptions) -> UnlockOrder {
        let order = self.config.unlock_order_for(options);
        debug!(
            unlock_order = order.as_str(),
            overridden = unlock_order_configured(options),
            "unlock order resolved"
        );
        order
    }

    /// Lock key for a payload, always recomputed from its identity tuple.
    ///
    /// A carried `unique_hash` is only compared against the recomputed key.
    pub fn lock_key(&self, payload: &JobPayload) -> LockKey {
        let key = payload.fingerprint(&self.config.unique_prefix);
        if let Some(carried) = payload.unique_hash.as_deref() {
            if carried != key.as_str() {
                warn!(
                    carried = %carried,
                    lock_key = %key,
                    class = %payload.class,
                    "carried unique_hash does not match payload; using recomputed key"
                );
            }
        }
        key
    }

    /// Run `body` for `payload`, releasing its lock before or after.
    ///
    /// Job failures are returned as [`ExecutionError::Job`] untouched. Under
    /// before-execution ordering the lock is already gone by then; under
    /// after-execution ordering it is left to expire.
    pub fn call<J, T, E, F>(&self, job: &J, payload: &JobPayload, body: F) -> Result<T, ExecutionError<E>>
    where
        J: UniqueJob + ?Sized,
        F: FnOnce() -> Result<T, E>,
    {
        let order = self.decide_unlock_order(self.registry.options_for(&payload.class));
        let lock_key = self.lock_key(payload);
        let mut invocation = Invocation::new(&lock_key, order);

        if order.is_before() {
            invocation.release(&self.store)?;
        }

        let output = match body() {
            Ok(output) => output,
            Err(e) => {
                debug!(
                    lock_key = %lock_key,
                    run_id = %payload.jid,
                    released = invocation.released,
                    "job body failed"
                );
                return Err(ExecutionError::Job(e));
            }
        };

        if order.is_after() {
            invocation.release(&self.store)?;
        }

        if self.inline {
            job.after_unlock().map_err(ExecutionError::Hook)?;
        }

        Ok(output)
    }
}
