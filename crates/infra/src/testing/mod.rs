//! Test-mode job execution.
//!
//! A small in-process stand-in for the dispatch framework: submissions go
//! through the client-side guard into per-queue fake queues, and draining runs
//! them through the release coordinator. Everything is composed explicitly
//! around the guard and coordinator; nothing is patched in place.
//!
//! ## Modes
//!
//! - `Fake`: pushed jobs wait in their queue until `perform_one`/`drain`.
//! - `Inline`: pushed jobs run immediately and `after_unlock` hooks fire.

pub mod harness;
pub mod queue;

pub use harness::{FnWorker, HarnessError, TestHarness, TestHarnessBuilder, Worker};
pub use queue::FakeQueues;

/// How pushed jobs are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestingMode {
    #[default]
    Fake,
    Inline,
}
