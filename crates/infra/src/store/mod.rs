//! Lock store adapter: the primitives the lock protocol needs from the
//! external key-value store.
//!
//! The acquisition strategies, the release coordinator and the bulk-clear
//! utility only ever talk to a [`LockStore`]. Two implementations ship:
//! [`InMemoryLockStore`] for tests/dev and `RedisLockStore` (feature `redis`).

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_store;

use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};

pub use in_memory::InMemoryLockStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisLockStore;

/// Store failure. Covers every connectivity/protocol problem; the lock layer
/// never retries on its own.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LockStoreError {
    #[error("lock store connection error: {0}")]
    Connection(String),
    #[error("lock store command error: {0}")]
    Command(String),
    #[error("lock store state poisoned")]
    Poisoned,
}

/// A write staged inside an optimistic transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub value: String,
    pub ttl_secs: u64,
}

impl PendingWrite {
    pub fn new(value: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            value: value.into(),
            ttl_secs,
        }
    }
}

/// How an optimistic transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The staged write was applied.
    Committed,
    /// The watched key changed between the read and the write; nothing applied.
    Aborted,
    /// The caller declined to write after reading; the watch was dropped.
    Unwatched,
}

/// Key-value primitives used by the lock protocol.
pub trait LockStore: Send + Sync {
    /// Read a key. Expired keys read as absent.
    fn get(&self, key: &str) -> Result<Option<String>, LockStoreError>;

    /// Unconditionally write a key with an expiry.
    fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), LockStoreError>;

    /// Write a key with an expiry only if it does not exist. Returns whether
    /// the write happened.
    fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, LockStoreError>;

    /// Delete keys, returning how many existed.
    fn del(&self, keys: &[String]) -> Result<u64, LockStoreError>;

    /// List keys matching a glob pattern (`*`, `?`, `[...]`, `\` escapes).
    fn keys(&self, pattern: &str) -> Result<Vec<String>, LockStoreError>;

    /// Remaining time-to-live in whole seconds. `None` when the key is absent
    /// or has no expiry.
    fn ttl(&self, key: &str) -> Result<Option<u64>, LockStoreError>;

    /// Optimistic transaction on one key: watch it, read it, let `decide`
    /// inspect the current value and optionally stage a write, then apply the
    /// write only if the key was not modified in between.
    fn watch_set_ex(
        &self,
        key: &str,
        decide: &mut dyn FnMut(Option<&str>) -> Option<PendingWrite>,
    ) -> Result<WatchOutcome, LockStoreError>;

    /// Delete a single key, returning whether it existed.
    fn del_one(&self, key: &str) -> Result<bool, LockStoreError> {
        Ok(self.del(&[key.to_string()])? > 0)
    }
}

impl<S: LockStore + ?Sized> LockStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, LockStoreError> {
        (**self).get(key)
    }

    fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), LockStoreError> {
        (**self).set_ex(key, value, ttl_secs)
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, LockStoreError> {
        (**self).set_nx_ex(key, value, ttl_secs)
    }

    fn del(&self, keys: &[String]) -> Result<u64, LockStoreError> {
        (**self).del(keys)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, LockStoreError> {
        (**self).keys(pattern)
    }

    fn ttl(&self, key: &str) -> Result<Option<u64>, LockStoreError> {
        (**self).ttl(key)
    }

    fn watch_set_ex(
        &self,
        key: &str,
        decide: &mut dyn FnMut(Option<&str>) -> Option<PendingWrite>,
    ) -> Result<WatchOutcome, LockStoreError> {
        (**self).watch_set_ex(key, decide)
    }
}

/// Compile a Redis-style `KEYS` pattern: `*`, `?`, `[...]` classes and
/// backslash escapes. `*` also crosses `/`.
pub fn key_matcher(pattern: &str) -> Result<GlobMatcher, LockStoreError> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| LockStoreError::Command(format!("invalid key pattern '{pattern}': {e}")))
}

/// Escape glob metacharacters so `literal` only matches itself.
pub fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '{' | '}' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
