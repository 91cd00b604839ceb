//! Fake/inline job harness.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use jobunique_core::{JobOptions, JobPayload, RunId, UniqueJobsConfig};

use crate::admin;
use crate::client::{Review, UniqueGuard};
use crate::registry::JobRegistry;
use crate::server::{ExecutionError, ReleaseCoordinator, UniqueJob};
use crate::store::{LockStore, LockStoreError};

use super::queue::FakeQueues;
use super::TestingMode;

/// A job implementation the harness can run.
pub trait Worker: UniqueJob + Send + Sync {
    fn perform(&self, args: &[Value]) -> anyhow::Result<()>;
}

/// Adapts a closure into a [`Worker`] with no `after_unlock` hook.
pub struct FnWorker<F>(pub F);

impl<F> UniqueJob for FnWorker<F> {}

impl<F> Worker for FnWorker<F>
where
    F: Fn(&[Value]) -> anyhow::Result<()> + Send + Sync,
{
    fn perform(&self, args: &[Value]) -> anyhow::Result<()> {
        (self.0)(args)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Store(#[from] LockStoreError),
    #[error("no worker registered for job class '{0}'")]
    UnknownJob(String),
    #[error("perform_one called with empty job queue '{0}'")]
    EmptyQueue(String),
    #[error("job {class} failed: {error:#}")]
    Job { class: String, error: anyhow::Error },
    #[error("after_unlock hook for {class} failed: {error:#}")]
    Hook { class: String, error: anyhow::Error },
    #[error("fake queue state poisoned")]
    Poisoned,
}

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder<S: LockStore + Clone> {
    store: S,
    config: UniqueJobsConfig,
    registry: JobRegistry,
    workers: HashMap<String, Arc<dyn Worker>>,
    mode: TestingMode,
}

impl<S: LockStore + Clone> TestHarnessBuilder<S> {
    /// Register a worker for a job class along with its options.
    pub fn register<W>(mut self, class: impl Into<String>, options: JobOptions, worker: W) -> Self
    where
        W: Worker + 'static,
    {
        let class = class.into();
        self.registry.register(class.clone(), options);
        self.workers.insert(class, Arc::new(worker));
        self
    }

    /// Register a closure as the worker for a job class.
    pub fn register_fn<F>(self, class: impl Into<String>, options: JobOptions, perform: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(class, options, FnWorker(perform))
    }

    pub fn mode(mut self, mode: TestingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> TestHarness<S> {
        let registry = Arc::new(self.registry);
        let guard = UniqueGuard::new(self.store.clone(), self.config.clone(), registry.clone());
        let coordinator = ReleaseCoordinator::new(self.store.clone(), self.config.clone(), registry)
            .inline(self.mode == TestingMode::Inline);

        TestHarness {
            store: self.store,
            prefix: self.config.unique_prefix,
            mode: self.mode,
            guard,
            coordinator,
            workers: self.workers,
            queues: FakeQueues::new(),
        }
    }
}

/// Guard → fake queue → coordinator → worker, in one process.
pub struct TestHarness<S: LockStore + Clone> {
    store: S,
    prefix: String,
    mode: TestingMode,
    guard: UniqueGuard<S>,
    coordinator: ReleaseCoordinator<S>,
    workers: HashMap<String, Arc<dyn Worker>>,
    queues: FakeQueues,
}

impl<S: LockStore + Clone> TestHarness<S> {
    pub fn builder(store: S, config: UniqueJobsConfig) -> TestHarnessBuilder<S> {
        TestHarnessBuilder {
            store,
            config,
            registry: JobRegistry::new(),
            workers: HashMap::new(),
            mode: TestingMode::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Submit a job. Duplicates come back as [`Review::Suppressed`].
    pub fn push(&self, mut payload: JobPayload) -> Result<Review<RunId>, HarnessError> {
        if !self.workers.contains_key(&payload.class) {
            return Err(HarnessError::UnknownJob(payload.class));
        }

        let review = self.guard.review(&mut payload, |p| p.jid.clone())?;
        if let Review::Proceeded(_) = &review {
            match self.mode {
                TestingMode::Fake => self.queues.push(payload)?,
                TestingMode::Inline => self.execute(&payload)?,
            }
        }
        Ok(review)
    }

    /// Queued jobs, oldest first.
    pub fn jobs(&self, queue: &str) -> Result<Vec<JobPayload>, HarnessError> {
        self.queues.jobs(queue)
    }

    /// Run the oldest queued job.
    pub fn perform_one(&self, queue: &str) -> Result<(), HarnessError> {
        let payload = self
            .queues
            .pop(queue)?
            .ok_or_else(|| HarnessError::EmptyQueue(queue.to_string()))?;
        self.execute(&payload)
    }

    /// Run queued jobs until the queue is empty, including jobs pushed while
    /// draining. Stops at the first failure.
    pub fn drain(&self, queue: &str) -> Result<usize, HarnessError> {
        let mut performed = 0;
        while let Some(payload) = self.queues.pop(queue)? {
            self.execute(&payload)?;
            performed += 1;
        }
        Ok(performed)
    }

    /// Drop a queue's jobs and delete the locks they were carrying.
    pub fn clear(&self, queue: &str) -> Result<u64, HarnessError> {
        let hashes: Vec<String> = self
            .queues
            .take(queue)?
            .into_iter()
            .filter_map(|p| p.unique_hash)
            .collect();
        Ok(admin::clear_keys(&self.store, &hashes)?)
    }

    /// Drop every queue and sweep all locks under the configured prefix.
    pub fn clear_all(&self) -> Result<u64, HarnessError> {
        self.queues.take_all()?;
        Ok(admin::clear_all(&self.store, &self.prefix)?)
    }

    fn execute(&self, payload: &JobPayload) -> Result<(), HarnessError> {
        let worker = self
            .workers
            .get(&payload.class)
            .cloned()
            .ok_or_else(|| HarnessError::UnknownJob(payload.class.clone()))?;

        debug!(class = %payload.class, run_id = %payload.jid, mode = ?self.mode, "performing job");

        self.coordinator
            .call(worker.as_ref(), payload, || worker.perform(&payload.args))
            .map_err(|e| match e {
                ExecutionError::Store(e) => HarnessError::Store(e),
                ExecutionError::Job(error) => HarnessError::Job {
                    class: payload.class.clone(),
                    error,
                },
                ExecutionError::Hook(error) => HarnessError::Hook {
                    class: payload.class.clone(),
                    error,
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use jobunique_core::UnlockOrder;
    use serde_json::json;

    use crate::store::InMemoryLockStore;

    /// Records performed args and counts hook calls.
    #[derive(Default)]
    struct Recorder {
        performed: Mutex<Vec<Vec<Value>>>,
        unlocked: AtomicUsize,
    }

    struct RecordingWorker(Arc<Recorder>);

    impl UniqueJob for RecordingWorker {
        fn after_unlock(&self) -> anyhow::Result<()> {
            self.0.unlocked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Worker for RecordingWorker {
        fn perform(&self, args: &[Value]) -> anyhow::Result<()> {
            self.0.performed.lock().unwrap().push(args.to_vec());
            Ok(())
        }
    }

    fn harness(
        mode: TestingMode,
    ) -> (Arc<Recorder>, TestHarness<Arc<InMemoryLockStore>>) {
        let recorder = Arc::new(Recorder::default());
        let harness = TestHarness::builder(InMemoryLockStore::arc(), UniqueJobsConfig::default())
            .register("Recorded", JobOptions::default(), RecordingWorker(recorder.clone()))
            .register_fn(
                "Early",
                JobOptions::default().with_unlock_order(UnlockOrder::BeforeExecution),
                |_| Ok(()),
            )
            .register_fn("Broken", JobOptions::default(), |_| anyhow::bail!("kaput"))
            .mode(mode)
            .build();
        (recorder, harness)
    }

    #[test]
    fn fake_mode_queues_until_drained() {
        let (recorder, harness) = harness(TestingMode::Fake);
        harness.push(JobPayload::new("Recorded", "default", vec![json!(1)])).unwrap();
        harness.push(JobPayload::new("Recorded", "default", vec![json!(2)])).unwrap();

        assert_eq!(harness.jobs("default").unwrap().len(), 2);
        assert!(recorder.performed.lock().unwrap().is_empty());

        assert_eq!(harness.drain("default").unwrap(), 2);
        assert_eq!(
            *recorder.performed.lock().unwrap(),
            vec![vec![json!(1)], vec![json!(2)]]
        );
        // Hooks only fire inline.
        assert_eq!(recorder.unlocked.load(Ordering::SeqCst), 0);
        assert!(harness.store().is_empty().unwrap());
    }

    #[test]
    fn duplicates_are_not_queued() {
        let (_, harness) = harness(TestingMode::Fake);
        let first = harness.push(JobPayload::new("Recorded", "default", vec![json!(1)])).unwrap();
        let second = harness.push(JobPayload::new("Recorded", "default", vec![json!(1)])).unwrap();

        assert!(!first.is_suppressed());
        assert!(second.is_suppressed());
        assert_eq!(harness.jobs("default").unwrap().len(), 1);
    }

    #[test]
    fn inline_mode_runs_immediately_and_fires_hook() {
        let (recorder, harness) = harness(TestingMode::Inline);
        harness.push(JobPayload::new("Recorded", "default", vec![json!(7)])).unwrap();

        assert!(harness.jobs("default").unwrap().is_empty());
        assert_eq!(recorder.performed.lock().unwrap().len(), 1);
        assert_eq!(recorder.unlocked.load(Ordering::SeqCst), 1);
        // Released after running, so the same identity can be pushed again.
        assert!(!harness
            .push(JobPayload::new("Recorded", "default", vec![json!(7)]))
            .unwrap()
            .is_suppressed());
    }

    #[test]
    fn perform_one_on_empty_queue_errors() {
        let (_, harness) = harness(TestingMode::Fake);
        assert!(matches!(
            harness.perform_one("default"),
            Err(HarnessError::EmptyQueue(q)) if q == "default"
        ));
    }

    #[test]
    fn unknown_class_is_rejected_before_locking() {
        let (_, harness) = harness(TestingMode::Fake);
        let result = harness.push(JobPayload::new("Nope", "default", vec![]));
        assert!(matches!(result, Err(HarnessError::UnknownJob(c)) if c == "Nope"));
        assert!(harness.store().is_empty().unwrap());
    }

    #[test]
    fn failing_job_keeps_after_execution_lock() {
        let (_, harness) = harness(TestingMode::Fake);
        harness.push(JobPayload::new("Broken", "default", vec![])).unwrap();

        let err = harness.perform_one("default").unwrap_err();
        assert!(matches!(err, HarnessError::Job { ref class, .. } if class == "Broken"));
        assert!(err.to_string().contains("kaput"));
        assert_eq!(harness.store().len().unwrap(), 1);
        assert!(harness
            .push(JobPayload::new("Broken", "default", vec![]))
            .unwrap()
            .is_suppressed());
    }

    #[test]
    fn before_execution_job_releases_on_perform() {
        let (_, harness) = harness(TestingMode::Fake);
        harness.push(JobPayload::new("Early", "default", vec![])).unwrap();
        harness.perform_one("default").unwrap();
        assert!(harness.store().is_empty().unwrap());
    }

    #[test]
    fn clear_deletes_carried_locks() {
        let (_, harness) = harness(TestingMode::Fake);
        harness.push(JobPayload::new("Recorded", "default", vec![json!(1)])).unwrap();
        harness.push(JobPayload::new("Recorded", "critical", vec![json!(1)])).unwrap();

        assert_eq!(harness.clear("default").unwrap(), 1);
        assert!(harness.jobs("default").unwrap().is_empty());
        assert_eq!(harness.jobs("critical").unwrap().len(), 1);
        assert_eq!(harness.store().len().unwrap(), 1);

        assert_eq!(harness.clear("empty").unwrap(), 0);
    }

    #[test]
    fn clear_all_sweeps_every_lock() {
        let (_, harness) = harness(TestingMode::Fake);
        harness.push(JobPayload::new("Recorded", "default", vec![json!(1)])).unwrap();
        harness.push(JobPayload::new("Early", "critical", vec![])).unwrap();
        harness.store().set_ex("unrelated", "x", 60).unwrap();

        assert_eq!(harness.clear_all().unwrap(), 2);
        assert!(harness.jobs("default").unwrap().is_empty());
        assert!(harness.jobs("critical").unwrap().is_empty());
        assert_eq!(harness.store().get("unrelated").unwrap().as_deref(), Some("x"));
        assert_eq!(harness.clear_all().unwrap(), 0);
    }
}
