use async_trait::async_trait;
use tracing::info;

use crate::error::{HandlerError, ValidationError};
use crate::types::{Task, TaskResult};

use super::Worker;

/// Echoes a greeting for the name carried in the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreetingWorker;

impl GreetingWorker {
    /// Creates the worker.
    pub fn new() -> Self {
        Self
    }

    fn name(payload: &[u8]) -> Result<&str, ValidationError> {
        if payload.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        let name = std::str::from_utf8(payload)
            .map_err(|_| ValidationError::malformed("payload is not valid UTF-8"))?
            .trim();
        if name.is_empty() {
            return Err(ValidationError::malformed("name is blank"));
        }
        Ok(name)
    }
}

#[async_trait]
impl Worker for GreetingWorker {
    fn validate_task(&self, task: &Task) -> Result<(), ValidationError> {
        task.check_envelope()?;
        Self::name(&task.payload).map(|_| ())
    }

    async fn handle_task(&self, task: &Task) -> Result<TaskResult, HandlerError> {
        info!(
            task_id = %task.task_id,
            avs_address = %task.avs_address,
            operator_set_id = ?task.operator_set_id,
            "greeting"
        );
        let name = Self::name(&task.payload)?;
        Ok(task.result(format!("Hello, {name}!").into_bytes()))
    }
}
