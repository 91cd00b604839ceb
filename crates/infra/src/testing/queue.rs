//! Per-queue FIFO storage for fake-mode jobs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use jobunique_core::JobPayload;

use super::harness::HarnessError;

#[derive(Debug, Default)]
pub struct FakeQueues {
    queues: Mutex<HashMap<String, VecDeque<JobPayload>>>,
}

impl FakeQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, payload: JobPayload) -> Result<(), HarnessError> {
        self.lock()?
            .entry(payload.queue.clone())
            .or_default()
            .push_back(payload);
        Ok(())
    }

    pub fn pop(&self, queue: &str) -> Result<Option<JobPayload>, HarnessError> {
        Ok(self.lock()?.get_mut(queue).and_then(|q| q.pop_front()))
    }

    /// Snapshot of a queue, oldest first.
    pub fn jobs(&self, queue: &str) -> Result<Vec<JobPayload>, HarnessError> {
        Ok(self
            .lock()?
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn len(&self, queue: &str) -> Result<usize, HarnessError> {
        Ok(self.lock()?.get(queue).map_or(0, |q| q.len()))
    }

    /// Remove and return every job in a queue.
    pub fn take(&self, queue: &str) -> Result<Vec<JobPayload>, HarnessError> {
        Ok(self
            .lock()?
            .remove(queue)
            .map(Vec::from)
            .unwrap_or_default())
    }

    /// Remove and return every job in every queue.
    pub fn take_all(&self) -> Result<Vec<JobPayload>, HarnessError> {
        let drained = std::mem::take(&mut *self.lock()?);
        Ok(drained.into_values().flatten().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, VecDeque<JobPayload>>>, HarnessError> {
        self.queues.lock().map_err(|_| HarnessError::Poisoned)
    }
}
