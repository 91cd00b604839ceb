//! Job-type options lookup.

use std::collections::HashMap;

use jobunique_core::JobOptions;

/// Per-job-type options keyed by class name.
///
/// Classes that were never registered resolve to the registry's default
/// options, so they carry no overrides and fall back to the global config.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    options: HashMap<String, JobOptions>,
    fallback: JobOptions,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the options for a job class.
    pub fn register(&mut self, class: impl Into<String>, options: JobOptions) -> &mut Self {
        self.options.insert(class.into(), options);
        self
    }

    pub fn with(mut self, class: impl Into<String>, options: JobOptions) -> Self {
        self.register(class, options);
        self
    }

    pub fn is_registered(&self, class: &str) -> bool {
        self.options.contains_key(class)
    }

    pub fn options_for(&self, class: &str) -> &JobOptions {
        self.options.get(class).unwrap_or(&self.fallback)
    }
}
