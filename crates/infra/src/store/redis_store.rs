//! Redis-backed lock store (optional).
//!
//! Uses the synchronous client with one connection per operation. The
//! optimistic transaction holds a single connection across
//! WATCH / GET / MULTI / SETEX / EXEC, since WATCH is connection-scoped.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::{LockStore, LockStoreError, PendingWrite, WatchOutcome};

#[derive(Debug, Clone)]
pub struct RedisLockStore {
    client: Arc<redis::Client>,
}

impl RedisLockStore {
    /// Create a store for a Redis URL (e.g. "redis://localhost:6379").
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, LockStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| LockStoreError::Connection(e.to_string()))?;
        Ok(Self::from_client(client))
    }

    /// Wrap an already-configured client (shared pool owner, custom TLS, ...).
    pub fn from_client(client: redis::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    fn connection(&self) -> Result<redis::Connection, LockStoreError> {
        self.client
            .get_connection()
            .map_err(|e| LockStoreError::Connection(e.to_string()))
    }
}

fn command_error(command: &'static str) -> impl Fn(redis::RedisError) -> LockStoreError {
    move |e| LockStoreError::Command(format!("{command} failed: {e}"))
}

impl LockStore for RedisLockStore {
    fn get(&self, key: &str) -> Result<Option<String>, LockStoreError> {
        let mut conn = self.connection()?;
        redis::cmd("GET")
            .arg(key)
            .query(&mut conn)
            .map_err(command_error("GET"))
    }

    fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), LockStoreError> {
        let mut conn = self.connection()?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query(&mut conn)
            .map_err(command_error("SETEX"))
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, LockStoreError> {
        let mut conn = self.connection()?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query(&mut conn)
            .map_err(command_error("SET NX"))?;
        Ok(reply.is_some())
    }

    fn del(&self, keys: &[String]) -> Result<u64, LockStoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection()?;
        redis::cmd("DEL")
            .arg(keys)
            .query(&mut conn)
            .map_err(command_error("DEL"))
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, LockStoreError> {
        let mut conn = self.connection()?;
        redis::cmd("KEYS")
            .arg(pattern)
            .query(&mut conn)
            .map_err(command_error("KEYS"))
    }

    fn ttl(&self, key: &str) -> Result<Option<u64>, LockStoreError> {
        let mut conn = self.connection()?;
        let secs: i64 = redis::cmd("TTL")
            .arg(key)
            .query(&mut conn)
            .map_err(command_error("TTL"))?;
        // -2: missing, -1: no expiry
        Ok(u64::try_from(secs).ok())
    }

    #[instrument(level = "debug", skip(self, decide), err)]
    fn watch_set_ex(
        &self,
        key: &str,
        decide: &mut dyn FnMut(Option<&str>) -> Option<PendingWrite>,
    ) -> Result<WatchOutcome, LockStoreError> {
        let mut conn = self.connection()?;

        let _: () = redis::cmd("WATCH")
            .arg(key)
            .query(&mut conn)
            .map_err(command_error("WATCH"))?;

        let current: Option<String> = redis::cmd("GET")
            .arg(key)
            .query(&mut conn)
            .map_err(command_error("GET"))?;

        let Some(pending) = decide(current.as_deref()) else {
            let _: () = redis::cmd("UNWATCH")
                .query(&mut conn)
                .map_err(command_error("UNWATCH"))?;
            return Ok(WatchOutcome::Unwatched);
        };

        // EXEC replies nil when a watched key changed.
        let reply: redis::Value = redis::pipe()
            .atomic()
            .cmd("SETEX")
            .arg(key)
            .arg(pending.ttl_secs)
            .arg(&pending.value)
            .query(&mut conn)
            .map_err(command_error("EXEC"))?;

        if matches!(reply, redis::Value::Nil) {
            debug!(lock_key = %key, "optimistic transaction aborted");
            Ok(WatchOutcome::Aborted)
        } else {
            Ok(WatchOutcome::Committed)
        }
    }
}
