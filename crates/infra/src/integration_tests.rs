//! Integration tests for the full lock lifecycle.
//!
//! Tests: submission → guard → queue → coordinator → release
//!
//! Verifies:
//! - Immediate resubmission of an identical job is suppressed
//! - Concurrent producers racing on one identity produce exactly one winner
//! - Unlock ordering holds across the whole pipeline

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    use serde_json::json;

    use jobunique_core::{JobOptions, JobPayload, StorageMethod, UniqueJobsConfig, UnlockOrder};

    use crate::client::{Review, UniqueGuard};
    use crate::registry::JobRegistry;
    use crate::server::{ReleaseCoordinator, UniqueJob};
    use crate::store::{InMemoryLockStore, LockStore};
    use crate::testing::{HarnessError, TestHarness, TestingMode};

    struct NoHook;
    impl UniqueJob for NoHook {}

    fn config(method: StorageMethod) -> UniqueJobsConfig {
        UniqueJobsConfig::default()
            .with_storage_method(method)
            .with_default_expiration_secs(60)
    }

    fn foo() -> JobPayload {
        JobPayload::new("Foo", "default", vec![json!(1), json!(2)])
    }

    #[test]
    fn duplicate_submission_is_suppressed_until_key_is_deleted() {
        jobunique_observability::init_for_tests();

        for method in [StorageMethod::Atomic, StorageMethod::Legacy] {
            let store = InMemoryLockStore::arc();
            let guard = UniqueGuard::new(store.clone(), config(method), Arc::new(JobRegistry::new()));
            let queue: Mutex<Vec<JobPayload>> = Mutex::new(Vec::new());
            let enqueue = |p: &JobPayload| queue.lock().unwrap().push(p.clone());

            let mut first = foo();
            assert_eq!(guard.review(&mut first, enqueue).unwrap(), Review::Proceeded(()));

            let mut second = foo();
            let review = guard.review(&mut second, enqueue).unwrap();
            assert!(review.is_suppressed(), "{method:?}");
            assert_eq!(queue.lock().unwrap().len(), 1);

            let key = first.unique_hash.clone().unwrap();
            assert_eq!(store.get(&key).unwrap(), Some(first.jid.to_string()));
            assert_eq!(store.ttl(&key).unwrap(), Some(60));
            store.del_one(&key).unwrap();

            let mut third = foo();
            assert!(!guard.review(&mut third, enqueue).unwrap().is_suppressed());
            assert_eq!(queue.lock().unwrap().len(), 2);
        }
    }

    #[test]
    fn racing_producers_yield_a_single_winner() {
        jobunique_observability::init_for_tests();
        const PRODUCERS: usize = 16;

        for method in [StorageMethod::Atomic, StorageMethod::Legacy] {
            let store = InMemoryLockStore::arc();
            let guard = UniqueGuard::new(store.clone(), config(method), Arc::new(JobRegistry::new()));
            let barrier = Barrier::new(PRODUCERS);
            let submitted = AtomicUsize::new(0);

            thread::scope(|scope| {
                for _ in 0..PRODUCERS {
                    scope.spawn(|| {
                        let mut payload = foo();
                        barrier.wait();
                        guard
                            .review(&mut payload, |_| submitted.fetch_add(1, Ordering::SeqCst))
                            .unwrap();
                    });
                }
            });

            assert_eq!(submitted.load(Ordering::SeqCst), 1, "{method:?}");
            assert_eq!(store.len().unwrap(), 1);
        }
    }

    #[test]
    fn submit_execute_release_roundtrip() {
        jobunique_observability::init_for_tests();

        let store = InMemoryLockStore::arc();
        let registry = Arc::new(JobRegistry::new().with(
            "Early",
            JobOptions::default().with_unlock_order(UnlockOrder::BeforeExecution),
        ));
        let config = config(StorageMethod::Atomic);
        let guard = UniqueGuard::new(store.clone(), config.clone(), registry.clone());
        let coordinator = ReleaseCoordinator::new(store.clone(), config, registry);

        // After-execution (default): duplicate suppressed while the job runs.
        let mut job = foo();
        guard.review(&mut job, |_| ()).unwrap();
        coordinator
            .call(&NoHook, &job, || {
                let mut dup = foo();
                assert!(guard.review(&mut dup, |_| ()).unwrap().is_suppressed());
                Ok::<_, String>(())
            })
            .unwrap();
        assert!(store.is_empty().unwrap());

        // Before-execution: a duplicate may be enqueued while the job runs,
        // even if the body then fails.
        let mut early = JobPayload::new("Early", "default", vec![json!("x")]);
        guard.review(&mut early, |_| ()).unwrap();
        let result = coordinator.call(&NoHook, &early, || {
            let mut dup = JobPayload::new("Early", "default", vec![json!("x")]);
            assert!(!guard.review(&mut dup, |_| ()).unwrap().is_suppressed());
            Err::<(), _>("boom".to_string())
        });
        assert!(result.is_err());
        // The duplicate's lock is the one left behind.
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn harness_drain_reset_cycle() {
        jobunique_observability::init_for_tests();

        let performed = Arc::new(AtomicUsize::new(0));
        let counter = performed.clone();
        let harness = TestHarness::builder(InMemoryLockStore::arc(), config(StorageMethod::Legacy))
            .register_fn("Foo", JobOptions::default(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .mode(TestingMode::Fake)
            .build();

        assert!(!harness.push(foo()).unwrap().is_suppressed());
        assert!(harness.push(foo()).unwrap().is_suppressed());
        assert_eq!(harness.drain("default").unwrap(), 1);
        assert_eq!(performed.load(Ordering::SeqCst), 1);

        assert!(!harness.push(foo()).unwrap().is_suppressed());
        harness.clear_all().unwrap();
        assert!(harness.jobs("default").unwrap().is_empty());
        assert!(matches!(harness.perform_one("default"), Err(HarnessError::EmptyQueue(_))));
        assert!(!harness.push(foo()).unwrap().is_suppressed());
    }
}
