//! The unit of work submitted to the dispatch framework.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::fingerprint::{self, LockKey};
use crate::id::RunId;

/// A submitted job, as seen by the uniqueness layer.
///
/// `unique_hash` is written by the client-side guard once the fingerprint is
/// computed and is read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Job-type identifier (the worker class name).
    pub class: String,
    /// Queue the job is submitted to.
    pub queue: String,
    /// Positional arguments, opaque to this layer.
    #[serde(default)]
    pub args: Vec<Value>,
    /// When the job is due to run, for scheduled/delayed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    /// Run identifier assigned by the dispatch framework.
    pub jid: RunId,
    /// Lock key attached at submission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_hash: Option<String>,
}

impl JobPayload {
    /// Create an immediately-runnable payload with a fresh run identifier.
    pub fn new(class: impl Into<String>, queue: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            class: class.into(),
            queue: queue.into(),
            args,
            at: None,
            jid: RunId::generate(),
            unique_hash: None,
        }
    }

    /// Use an explicit run identifier.
    pub fn with_jid(mut self, jid: impl Into<RunId>) -> Self {
        self.jid = jid.into();
        self
    }

    /// Schedule the job for a specific time.
    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }

    /// Schedule the job with a delay from now.
    ///
    /// Fails when the resulting time is outside the representable range.
    pub fn delayed(mut self, delay: Duration) -> ConfigResult<Self> {
        let out_of_range = || ConfigError::invalid("at", format!("delay of {delay:?} is out of range"));
        let delay = chrono::Duration::from_std(delay).map_err(|_| out_of_range())?;
        let at = Utc::now().checked_add_signed(delay).ok_or_else(out_of_range)?;
        self.at = Some(at);
        Ok(self)
    }

    /// Compute the lock key for this payload's identity tuple.
    ///
    /// Ignores any carried `unique_hash`.
    pub fn fingerprint(&self, prefix: &str) -> LockKey {
        fingerprint::fingerprint(prefix, &self.class, &self.queue, &self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_minimal_map() {
        let payload: JobPayload = serde_json::from_value(json!({
            "class": "Foo",
            "queue": "default",
            "jid": "abc123",
        }))
        .unwrap();

        assert!(payload.args.is_empty());
        assert!(payload.at.is_none());
        assert!(payload.unique_hash.is_none());
        assert_eq!(payload.jid.as_str(), "abc123");
    }

    #[test]
    fn carried_hash_does_not_affect_fingerprint() {
        let mut payload = JobPayload::new("Foo", "default", vec![json!(1)]);
        let before = payload.fingerprint("p:");
        payload.unique_hash = Some("p:forged".to_string());
        assert_eq!(payload.fingerprint("p:"), before);
    }

    #[test]
    fn delayed_sets_future_schedule() {
        let payload = JobPayload::new("Foo", "default", vec![])
            .delayed(Duration::from_secs(60))
            .unwrap();
        assert!(payload.at.unwrap() > Utc::now());
    }

    #[test]
    fn delayed_past_calendar_range_is_rejected() {
        let err = JobPayload::new("Foo", "default", vec![])
            .delayed(Duration::from_secs(10_000_000_000_000))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "at"));
    }

    #[test]
    fn delayed_beyond_time_delta_range_is_rejected() {
        let result = JobPayload::new("Foo", "default", vec![]).delayed(Duration::MAX);
        assert!(result.is_err());
    }
}
