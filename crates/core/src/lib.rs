//! `jobunique-core` — pure building blocks for duplicate-job suppression.
//!
//! No store access lives here: identifiers, payloads, fingerprinting, TTL
//! calculation and configuration. The lock protocol itself is in
//! `jobunique-infra`.

pub mod config;
pub mod error;
pub mod expiration;
pub mod fingerprint;
pub mod id;
pub mod payload;

pub use config::{
    unlock_order_configured, JobOptions, StorageMethod, UniqueJobsConfig, UnlockOrder,
    DEFAULT_EXPIRATION_SECS, DEFAULT_UNIQUE_PREFIX,
};
pub use error::{ConfigError, ConfigResult};
pub use expiration::lock_ttl_secs;
pub use fingerprint::{fingerprint, LockKey, DIGEST_HEX_LEN};
pub use id::RunId;
pub use payload::JobPayload;
