//! Transport-independent performer runtime.
//!
//! [`Performer`] owns exactly one [`Worker`] and drives the
//! validate -> execute -> respond cycle for every task a transport hands it.
//! It holds no per-request mutable state, so transports may call it from
//! any number of concurrent requests without locking.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::PerformerError;
use crate::types::{HealthStatus, Task, TaskResult};
use crate::worker::Worker;

/// The performer runtime.
///
/// Cheap to clone; clones share the same worker.
///
/// # Examples
///
/// ```
/// use hourglass::server::Performer;
/// use hourglass::types::{HealthStatus, Task};
/// use hourglass::worker::GreetingWorker;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let performer = Performer::new(GreetingWorker::new());
/// assert_eq!(performer.health(), HealthStatus::Serving);
///
/// let result = performer
///     .execute(Task::new("t1", "0xavs", b"Ada".to_vec()))
///     .await
///     .unwrap();
/// assert_eq!(result.result, b"Hello, Ada!");
/// # });
/// ```
#[derive(Clone)]
pub struct Performer {
    worker: Arc<dyn Worker>,
}

impl fmt::Debug for Performer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Performer").finish_non_exhaustive()
    }
}

impl Performer {
    /// Binds `worker` for the lifetime of the runtime.
    pub fn new<W: Worker + 'static>(worker: W) -> Self {
        Self {
            worker: Arc::new(worker),
        }
    }

    /// Binds an already shared worker.
    pub fn from_arc(worker: Arc<dyn Worker>) -> Self {
        Self { worker }
    }

    /// Runs one task through validation and execution.
    ///
    /// `handle_task` is never invoked when validation fails.
    pub async fn execute(&self, task: Task) -> Result<TaskResult, PerformerError> {
        debug!(
            task_id = %task.task_id,
            avs_address = %task.avs_address,
            operator_set_id = ?task.operator_set_id,
            "received task"
        );

        if let Err(err) = self.worker.validate_task(&task) {
            warn!(task_id = %task.task_id, error = %err, "task failed validation");
            return Err(PerformerError::Validation(err));
        }

        let result = match self.worker.handle_task(&task).await {
            Ok(result) => result,
            Err(err) => {
                error!(
                    task_id = %task.task_id,
                    avs_address = %task.avs_address,
                    operator_set_id = ?task.operator_set_id,
                    error = %err,
                    "task handler failed"
                );
                return Err(PerformerError::Handler(err));
            },
        };

        if result.task_id != task.task_id {
            error!(
                task_id = %task.task_id,
                result_task_id = %result.task_id,
                "worker returned a result for a different task"
            );
            return Err(PerformerError::Handler(
                crate::error::HandlerError::Computation(format!(
                    "result id {} does not match task id {}",
                    result.task_id, task.task_id
                )),
            ));
        }

        debug!(task_id = %task.task_id, bytes = result.result.len(), "task completed");
        Ok(result)
    }

    /// Liveness: always [`HealthStatus::Serving`] once constructed.
    pub fn health(&self) -> HealthStatus {
        HealthStatus::Serving
    }

    /// Streaming health is not implemented and says so immediately.
    pub fn watch_health(&self) -> Result<(), PerformerError> {
        Err(PerformerError::NotImplemented("health.Watch".into()))
    }

    /// Reserved synchronization handshake; currently an empty acknowledgment.
    pub fn start_sync(&self) -> Result<(), PerformerError> {
        Ok(())
    }
}
