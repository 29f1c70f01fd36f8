use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::info;

use crate::error::{HandlerError, ValidationError};
use crate::types::{Task, TaskResult};

use super::Worker;

/// Squares `{"numberToBeSquared": n}` payloads.
///
/// `n` may be a JSON integer or a decimal string of any size. The result is
/// `{"result": n², "timestamp": <unix seconds>}` where `result` is a JSON
/// integer written out at full precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareWorker;

impl SquareWorker {
    /// Creates the worker.
    pub fn new() -> Self {
        Self
    }

    fn parse(payload: &[u8]) -> Result<BigInt, ValidationError> {
        if payload.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        let input: SquareInput = serde_json::from_slice(payload)
            .map_err(|e| ValidationError::malformed(format!("invalid JSON payload: {e}")))?;

        let raw = input.number_to_be_squared.get().trim();
        let digits = if raw.starts_with('"') {
            serde_json::from_str::<String>(raw)
                .map_err(|e| ValidationError::malformed(e.to_string()))?
        } else {
            raw.to_string()
        };

        BigInt::from_str(digits.trim()).map_err(|_| {
            ValidationError::malformed(format!("numberToBeSquared is not an integer: {raw}"))
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SquareInput {
    number_to_be_squared: Box<RawValue>,
}

/// Output document of [`SquareWorker`].
#[derive(Debug, Serialize, Deserialize)]
pub struct SquareOutput {
    /// The square, as a JSON integer of arbitrary length.
    pub result: Box<RawValue>,
    /// Unix timestamp (seconds) at which the square was computed.
    pub timestamp: i64,
}

impl SquareOutput {
    /// Parses the `result` field back into an integer.
    pub fn value(&self) -> Option<BigInt> {
        BigInt::from_str(self.result.get()).ok()
    }
}

#[async_trait]
impl Worker for SquareWorker {
    fn validate_task(&self, task: &Task) -> Result<(), ValidationError> {
        task.check_envelope()?;
        Self::parse(&task.payload).map(|_| ())
    }

    async fn handle_task(&self, task: &Task) -> Result<TaskResult, HandlerError> {
        info!(
            task_id = %task.task_id,
            avs_address = %task.avs_address,
            operator_set_id = ?task.operator_set_id,
            "squaring number"
        );
        let n = Self::parse(&task.payload)?;
        let squared = &n * &n;

        let output = SquareOutput {
            result: RawValue::from_string(squared.to_string())?,
            timestamp: Utc::now().timestamp(),
        };
        Ok(task.result(serde_json::to_vec(&output)?))
    }
}
