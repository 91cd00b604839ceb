//! Client-side guard: suppress duplicate submissions.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use jobunique_core::{lock_ttl_secs, JobPayload, LockKey, UniqueJobsConfig};

use crate::registry::JobRegistry;
use crate::store::{LockStore, LockStoreError};
use crate::strategy::{strategy_for, AcquisitionStrategy};

/// Result of reviewing a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Review<T> {
    /// The lock was acquired and the submission ran.
    Proceeded(T),
    /// Another run holds the lock; the submission was dropped.
    Suppressed { lock_key: LockKey },
}

impl<T> Review<T> {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Review::Suppressed { .. })
    }

    pub fn proceeded(self) -> Option<T> {
        match self {
            Review::Proceeded(value) => Some(value),
            Review::Suppressed { .. } => None,
        }
    }
}

/// Wraps job submission with a uniqueness check.
///
/// The acquisition strategy is resolved from the configuration once, here.
pub struct UniqueGuard<S: LockStore> {
    store: S,
    config: UniqueJobsConfig,
    registry: Arc<JobRegistry>,
    strategy: Box<dyn AcquisitionStrategy>,
}

impl<S: LockStore> UniqueGuard<S> {
    pub fn new(store: S, config: UniqueJobsConfig, registry: Arc<JobRegistry>) -> Self {
        let strategy = strategy_for(config.unique_storage_method);
        Self {
            store,
            config,
            registry,
            strategy,
        }
    }

    /// Fingerprint the payload, attach the key as `unique_hash`, and run
    /// `submit` only if the lock is acquired.
    ///
    /// A duplicate is reported as [`Review::Suppressed`], not as an error; only
    /// store failures surface as `Err`.
    pub fn review<T, F>(&self, payload: &mut JobPayload, submit: F) -> Result<Review<T>, LockStoreError>
    where
        F: FnOnce(&JobPayload) -> T,
    {
        let lock_key = payload.fingerprint(&self.config.unique_prefix);
        payload.unique_hash = Some(lock_key.to_string());

        let options = self.registry.options_for(&payload.class);
        let ttl_secs = lock_ttl_secs(self.config.expiration_for(options), payload.at, Utc::now());

        let acquired = self
            .strategy
            .acquire(&self.store, &lock_key, &payload.jid, ttl_secs)?;

        if !acquired {
            if self.config.log_duplicate_payload {
                let rendered = serde_json::to_string(&*payload).unwrap_or_else(|e| e.to_string());
                warn!(lock_key = %lock_key, payload = %rendered, "payload is not unique");
            } else {
                debug!(lock_key = %lock_key, class = %payload.class, "duplicate submission suppressed");
            }
            return Ok(Review::Suppressed { lock_key });
        }

        debug!(
            lock_key = %lock_key,
            run_id = %payload.jid,
            ttl_secs,
            strategy = self.strategy.name(),
            "unique lock acquired"
        );
        Ok(Review::Proceeded(submit(payload)))
    }
}
