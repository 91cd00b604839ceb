//! Tracing/logging setup shared by binaries and tests.

/// Initialize process-wide logging (JSON, `RUST_LOG`-filtered).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize logging for tests: human-readable, captured per test.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
