//! In-memory lock store for tests/dev.
//!
//! Mirrors the store semantics the lock protocol depends on: lazy TTL expiry,
//! atomic `SET NX`, and WATCH-style optimistic transactions that abort when the
//! watched key is written between the read and the commit. A manual clock
//! offset lets tests expire locks without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use super::{key_matcher, LockStore, LockStoreError, PendingWrite, WatchOutcome};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    /// Bumped on every write or delete of a key. Kept while the key is live
    /// or watched, so a delete-then-recreate still aborts an open watch.
    revisions: HashMap<String, u64>,
    /// Open watches per key.
    watchers: HashMap<String, usize>,
    skew: Duration,
}

impl State {
    fn now(&self) -> Instant {
        Instant::now() + self.skew
    }

    fn live(&self, key: &str) -> Option<&Entry> {
        let now = self.now();
        self.entries
            .get(key)
            .filter(|e| e.expires_at.map_or(true, |at| at > now))
    }

    fn revision(&self, key: &str) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    fn put(&mut self, key: &str, value: &str, ttl_secs: u64) {
        let expires_at = Some(self.now() + Duration::from_secs(ttl_secs));
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        *self.revisions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_none() {
            return false;
        }
        *self.revisions.entry(key.to_string()).or_insert(0) += 1;
        self.forget_if_idle(key);
        true
    }

    fn purge_expired(&mut self) {
        let now = self.now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at.is_some_and(|at| at <= now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.entries.remove(&key);
            self.forget_if_idle(&key);
        }
    }

    fn watch(&mut self, key: &str) {
        *self.watchers.entry(key.to_string()).or_insert(0) += 1;
    }

    fn unwatch(&mut self, key: &str) {
        if let Some(count) = self.watchers.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.watchers.remove(key);
            }
        }
        self.forget_if_idle(key);
    }

    /// Drop the revision of a key nobody holds or watches.
    fn forget_if_idle(&mut self, key: &str) {
        if !self.entries.contains_key(key) && !self.watchers.contains_key(key) {
            self.revisions.remove(key);
        }
    }
}

/// In-memory [`LockStore`].
#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    state: RwLock<State>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Move this store's clock forward, expiring anything whose TTL elapses.
    pub fn advance(&self, by: Duration) -> Result<(), LockStoreError> {
        let mut state = self.write()?;
        state.skew += by;
        state.purge_expired();
        Ok(())
    }

    /// Number of live keys.
    pub fn len(&self) -> Result<usize, LockStoreError> {
        let state = self.read()?;
        let now = state.now();
        Ok(state
            .entries
            .values()
            .filter(|e| e.expires_at.map_or(true, |at| at > now))
            .count())
    }

    pub fn is_empty(&self) -> Result<bool, LockStoreError> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, LockStoreError> {
        self.state.read().map_err(|_| LockStoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, LockStoreError> {
        self.state.write().map_err(|_| LockStoreError::Poisoned)
    }

    /// Raw `(entries, revisions)` counts, expired or not.
    #[cfg(test)]
    fn footprint(&self) -> (usize, usize) {
        let state = self.state.read().unwrap();
        (state.entries.len(), state.revisions.len())
    }
}

impl LockStore for InMemoryLockStore {
    fn get(&self, key: &str) -> Result<Option<String>, LockStoreError> {
        Ok(self.read()?.live(key).map(|e| e.value.clone()))
    }

    fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), LockStoreError> {
        if ttl_secs == 0 {
            return Err(LockStoreError::Command("invalid expire time in SETEX".to_string()));
        }
        self.write()?.put(key, value, ttl_secs);
        Ok(())
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, LockStoreError> {
        if ttl_secs == 0 {
            return Err(LockStoreError::Command("invalid expire time in SET".to_string()));
        }
        let mut state = self.write()?;
        state.purge_expired();
        if state.live(key).is_some() {
            return Ok(false);
        }
        state.put(key, value, ttl_secs);
        Ok(true)
    }

    fn del(&self, keys: &[String]) -> Result<u64, LockStoreError> {
        let mut state = self.write()?;
        state.purge_expired();
        let mut removed = 0;
        for key in keys {
            if state.remove(key) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, LockStoreError> {
        let matcher = key_matcher(pattern)?;
        let mut state = self.write()?;
        state.purge_expired();
        let mut keys: Vec<String> = state
            .entries
            .keys()
            .filter(|k| matcher.is_match(k.as_str()))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn ttl(&self, key: &str) -> Result<Option<u64>, LockStoreError> {
        let state = self.read()?;
        let now = state.now();
        Ok(state
            .live(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now).as_secs_f64().round() as u64))
    }

    fn watch_set_ex(
        &self,
        key: &str,
        decide: &mut dyn FnMut(Option<&str>) -> Option<PendingWrite>,
    ) -> Result<WatchOutcome, LockStoreError> {
        // WATCH + GET
        let (observed, revision) = {
            let mut state = self.write()?;
            state.watch(key);
            (state.live(key).map(|e| e.value.clone()), state.revision(key))
        };

        // The guard is released while `decide` runs, so concurrent writers can
        // slip in exactly as they would against a real store.
        let pending = decide(observed.as_deref());

        // MULTI / SETEX / EXEC
        let mut state = self.write()?;
        let unchanged = state.revision(key) == revision;
        state.unwatch(key);
        let Some(pending) = pending else {
            return Ok(WatchOutcome::Unwatched);
        };
        if pending.ttl_secs == 0 {
            return Err(LockStoreError::Command("invalid expire time in SETEX".to_string()));
        }
        if !unchanged {
            return Ok(WatchOutcome::Aborted);
        }
        state.put(key, &pending.value, pending.ttl_secs);
        Ok(WatchOutcome::Committed)
    }
}
