//! Lock lifecycle for duplicate-job suppression: store adapters, acquisition
//! strategies, the submission guard, the release coordinator and
//! administrative sweeps.
//!
//! ## Flow
//!
//! submission → [`UniqueGuard`] (fingerprint + acquire) → queue →
//! [`ReleaseCoordinator`] (execute + release) → optional `after_unlock` hook.

pub mod admin;
pub mod client;
pub mod registry;
pub mod server;
pub mod store;
pub mod strategy;
pub mod testing;

mod integration_tests;

pub use client::{Review, UniqueGuard};
pub use registry::JobRegistry;
pub use server::{ExecutionError, ReleaseCoordinator, UniqueJob};
pub use store::{InMemoryLockStore, LockStore, LockStoreError, PendingWrite, WatchOutcome};
pub use strategy::{strategy_for, AcquisitionStrategy, AtomicAcquisition, LegacyAcquisition};
