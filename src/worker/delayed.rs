use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{HandlerError, ValidationError};
use crate::types::{Task, TaskResult};

use super::Worker;

/// Wraps a worker and sleeps before every `handle_task`.
///
/// Simulates a loaded worker; validation is not delayed.
#[derive(Debug, Clone)]
pub struct DelayedWorker<W> {
    inner: W,
    delay: Duration,
}

impl<W: Worker> DelayedWorker<W> {
    /// Delays `inner` by `delay` per task.
    pub fn new(inner: W, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// The configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl<W: Worker> Worker for DelayedWorker<W> {
    fn validate_task(&self, task: &Task) -> Result<(), ValidationError> {
        self.inner.validate_task(task)
    }

    async fn handle_task(&self, task: &Task) -> Result<TaskResult, HandlerError> {
        debug!(task_id = %task.task_id, delay_ms = self.delay.as_millis() as u64, "delaying task");
        tokio::time::sleep(self.delay).await;
        self.inner.handle_task(task).await
    }
}
