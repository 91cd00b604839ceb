//! Tracing/logging initialization.
//!
//! Lock acquisition and release events are emitted at `debug`; suppressed
//! duplicates with payload logging enabled at `warn`. Without `RUST_LOG` the
//! lock layer logs at `info` and everything else at `warn`, so a host
//! application's own dependencies stay quiet. Set e.g.
//! `RUST_LOG=jobunique_infra=debug` to follow individual locks.

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "warn,jobunique_infra=info,jobunique_core=info";

/// Directives used by [`init_for_tests`] when `RUST_LOG` is unset.
pub const TEST_DIRECTIVES: &str = "warn";

fn filter_or(directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    // JSON lines; keep targets so lock events can be filtered per crate.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(DEFAULT_DIRECTIVES))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init();
}

/// Initialize tracing for test runs.
///
/// Output goes through the test writer so it is only shown for failing tests.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(TEST_DIRECTIVES))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
        assert!(EnvFilter::try_new(TEST_DIRECTIVES).is_ok());
    }
}
