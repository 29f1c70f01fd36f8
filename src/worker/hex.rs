use async_trait::async_trait;
use num_bigint::BigUint;
use tracing::info;

use crate::error::{HandlerError, ValidationError};
use crate::types::{Task, TaskResult};

use super::Worker;

/// Squares hex-encoded integers.
///
/// The payload is ASCII hex with an optional `0x` prefix (`"0x4"`, `"ff"`).
/// The result is the `0x`-prefixed lowercase hex of the square (`"0x10"`).
#[derive(Debug, Clone, Copy, Default)]
pub struct HexSquareWorker;

impl HexSquareWorker {
    /// Creates the worker.
    pub fn new() -> Self {
        Self
    }

    fn parse(payload: &[u8]) -> Result<BigUint, ValidationError> {
        if payload.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        let text = std::str::from_utf8(payload)
            .map_err(|_| ValidationError::malformed("payload is not valid UTF-8"))?
            .trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        if digits.is_empty() {
            return Err(ValidationError::malformed("no hex digits in payload"));
        }
        BigUint::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| ValidationError::malformed(format!("not a hex integer: {text}")))
    }
}

#[async_trait]
impl Worker for HexSquareWorker {
    fn validate_task(&self, task: &Task) -> Result<(), ValidationError> {
        task.check_envelope()?;
        Self::parse(&task.payload).map(|_| ())
    }

    async fn handle_task(&self, task: &Task) -> Result<TaskResult, HandlerError> {
        info!(
            task_id = %task.task_id,
            avs_address = %task.avs_address,
            operator_set_id = ?task.operator_set_id,
            "squaring hex number"
        );
        let n = Self::parse(&task.payload)?;
        let squared = &n * &n;
        Ok(task.result(format!("0x{squared:x}").into_bytes()))
    }
}
