//! Uniqueness settings: process-wide defaults plus per-job-type overrides.
//!
//! Configuration is built once and handed to each component at construction.
//! Override resolution is a pure function of (config, job options).

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default unique window (30 minutes).
pub const DEFAULT_EXPIRATION_SECS: u64 = 30 * 60;

/// Default prefix for lock keys.
pub const DEFAULT_UNIQUE_PREFIX: &str = "jobunique:";

const ENV_STORAGE_METHOD: &str = "JOBUNIQUE_STORAGE_METHOD";
const ENV_DEFAULT_EXPIRATION: &str = "JOBUNIQUE_DEFAULT_EXPIRATION";
const ENV_DEFAULT_UNLOCK_ORDER: &str = "JOBUNIQUE_DEFAULT_UNLOCK_ORDER";
const ENV_PREFIX: &str = "JOBUNIQUE_PREFIX";
const ENV_LOG_DUPLICATE_PAYLOAD: &str = "JOBUNIQUE_LOG_DUPLICATE_PAYLOAD";

/// Which acquisition algorithm guards submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMethod {
    /// WATCH / GET / MULTI+SETEX. For stores without conditional set.
    #[serde(alias = "old")]
    Legacy,
    /// Single `SET NX EX` with a read-back for self re-acquisition.
    #[default]
    #[serde(alias = "new")]
    Atomic,
}

impl StorageMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMethod::Legacy => "legacy",
            StorageMethod::Atomic => "atomic",
        }
    }
}

impl FromStr for StorageMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "old" => Ok(Self::Legacy),
            "atomic" | "new" => Ok(Self::Atomic),
            other => Err(ConfigError::unknown("storage method", other)),
        }
    }
}

/// When the server side releases a job's lock relative to running it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockOrder {
    /// Delete the lock right before the job body starts.
    #[serde(alias = "before_yield")]
    BeforeExecution,
    /// Delete the lock once the job body has completed successfully.
    #[default]
    #[serde(alias = "after_yield")]
    AfterExecution,
}

impl UnlockOrder {
    pub fn is_before(&self) -> bool {
        matches!(self, UnlockOrder::BeforeExecution)
    }

    pub fn is_after(&self) -> bool {
        matches!(self, UnlockOrder::AfterExecution)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnlockOrder::BeforeExecution => "before_execution",
            UnlockOrder::AfterExecution => "after_execution",
        }
    }
}

impl FromStr for UnlockOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before_execution" | "before_yield" => Ok(Self::BeforeExecution),
            "after_execution" | "after_yield" => Ok(Self::AfterExecution),
            other => Err(ConfigError::unknown("unlock order", other)),
        }
    }
}

/// Per-job-type options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Unique window override, in seconds.
    pub unique_job_expiration_secs: Option<u64>,
    /// Unlock order override.
    pub unique_unlock_order: Option<UnlockOrder>,
}

impl JobOptions {
    pub fn with_expiration_secs(mut self, secs: u64) -> Self {
        self.unique_job_expiration_secs = Some(secs);
        self
    }

    pub fn with_unlock_order(mut self, order: UnlockOrder) -> Self {
        self.unique_unlock_order = Some(order);
        self
    }
}

/// Process-wide uniqueness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniqueJobsConfig {
    pub unique_storage_method: StorageMethod,
    pub default_expiration_secs: u64,
    pub default_unlock_order: UnlockOrder,
    pub unique_prefix: String,
    /// Log the full payload when a duplicate is suppressed.
    pub log_duplicate_payload: bool,
}

impl Default for UniqueJobsConfig {
    fn default() -> Self {
        Self {
            unique_storage_method: StorageMethod::default(),
            default_expiration_secs: DEFAULT_EXPIRATION_SECS,
            default_unlock_order: UnlockOrder::default(),
            unique_prefix: DEFAULT_UNIQUE_PREFIX.to_string(),
            log_duplicate_payload: false,
        }
    }
}

impl UniqueJobsConfig {
    /// Load from `JOBUNIQUE_*` environment variables, defaulting unset ones.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_STORAGE_METHOD) {
            config.unique_storage_method = value.parse()?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_EXPIRATION) {
            config.default_expiration_secs = value
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_DEFAULT_EXPIRATION, format!("{e}")))?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_UNLOCK_ORDER) {
            config.default_unlock_order = value.parse()?;
        }
        if let Some(value) = lookup(ENV_PREFIX) {
            config.unique_prefix = value;
        }
        if let Some(value) = lookup(ENV_LOG_DUPLICATE_PAYLOAD) {
            config.log_duplicate_payload = parse_flag(ENV_LOG_DUPLICATE_PAYLOAD, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_expiration_secs == 0 {
            return Err(ConfigError::invalid(
                "default_expiration_secs",
                "must be greater than zero",
            ));
        }
        if self.unique_prefix.is_empty() {
            return Err(ConfigError::invalid("unique_prefix", "must not be empty"));
        }
        Ok(())
    }

    pub fn with_storage_method(mut self, method: StorageMethod) -> Self {
        self.unique_storage_method = method;
        self
    }

    pub fn with_default_expiration_secs(mut self, secs: u64) -> Self {
        self.default_expiration_secs = secs;
        self
    }

    pub fn with_default_unlock_order(mut self, order: UnlockOrder) -> Self {
        self.default_unlock_order = order;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.unique_prefix = prefix.into();
        self
    }

    pub fn with_log_duplicate_payload(mut self, enabled: bool) -> Self {
        self.log_duplicate_payload = enabled;
        self
    }

    /// Unique window for a job type, in seconds.
    pub fn expiration_for(&self, options: &JobOptions) -> u64 {
        options
            .unique_job_expiration_secs
            .unwrap_or(self.default_expiration_secs)
    }

    /// Unlock order for a job type.
    pub fn unlock_order_for(&self, options: &JobOptions) -> UnlockOrder {
        options
            .unique_unlock_order
            .unwrap_or(self.default_unlock_order)
    }

}

/// Whether a job type overrides the default unlock order.
pub fn unlock_order_configured(options: &JobOptions) -> bool {
    options.unique_unlock_order.is_some()
}

fn parse_flag(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::invalid(field, format!("not a boolean: {other}"))),
    }
}
