//! Payload fingerprinting: (job type, queue, args) -> lock key.
//!
//! The digest is SHA-256 over a canonical JSON rendering of
//! `[class, queue, args]`, with object keys sorted at every depth so the result
//! does not depend on map insertion order. Client and server compute keys with
//! the same function, so the two sides agree bit-for-bit.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Length of the hex digest appended to the prefix.
pub const DIGEST_HEX_LEN: usize = 64;

/// Store key guarding one logical job identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockKey(String);

impl LockKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for LockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the lock key for a job identity.
pub fn fingerprint(prefix: &str, class: &str, queue: &str, args: &[Value]) -> LockKey {
    let identity = Value::Array(vec![
        Value::String(class.to_string()),
        Value::String(queue.to_string()),
        Value::Array(args.iter().map(canonicalize).collect()),
    ]);

    let digest = Sha256::digest(identity.to_string().as_bytes());
    LockKey(format!("{prefix}{}", hex::encode(digest)))
}

/// Rebuild a value with object keys inserted in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::with_capacity(map.len());
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
