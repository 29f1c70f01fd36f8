//! Task and result value types.
//!
//! A [`Task`] is the unit of work an aggregator hands to a performer; a
//! [`TaskResult`] is what the worker produces for it. Both are immutable
//! values: the runtime reads them, never rewrites them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A unit of work submitted to a performer.
///
/// Byte fields travel as base64 strings on JSON transports.
///
/// # Examples
///
/// ```
/// use hourglass::types::Task;
///
/// let task = Task::new("task-1", "0xavs", br#"{"numberToBeSquared": 4}"#.to_vec())
///     .with_operator_set_id(7);
/// assert_eq!(task.task_id, "task-1");
/// assert_eq!(task.operator_set_id, Some(7));
/// assert!(task.check_envelope().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Caller-assigned identifier, unique per submission.
    pub task_id: String,

    /// Target service (AVS) address.
    #[serde(default)]
    pub avs_address: String,

    /// Operator set the task was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_set_id: Option<u32>,

    /// Domain-specific payload, opaque to the runtime.
    #[serde(with = "crate::shared::base64_bytes")]
    pub payload: Vec<u8>,

    /// Optional opaque metadata.
    #[serde(
        default,
        with = "crate::shared::base64_bytes::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub metadata: Option<Vec<u8>>,
}

impl Task {
    /// Creates a task without operator set or metadata.
    pub fn new(task_id: impl Into<String>, avs_address: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            task_id: task_id.into(),
            avs_address: avs_address.into(),
            operator_set_id: None,
            payload,
            metadata: None,
        }
    }

    /// Sets the operator set id.
    pub fn with_operator_set_id(mut self, id: u32) -> Self {
        self.operator_set_id = Some(id);
        self
    }

    /// Attaches opaque metadata.
    pub fn with_metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Checks the invariants every task must satisfy regardless of worker:
    /// a non-empty id and a non-empty payload.
    pub fn check_envelope(&self) -> Result<(), ValidationError> {
        if self.task_id.is_empty() {
            return Err(ValidationError::EmptyTaskId);
        }
        if self.payload.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        Ok(())
    }

    /// Builds a result for this task carrying `result` bytes.
    ///
    /// The result echoes the task id and avs address, which keeps the
    /// id-match invariant by construction.
    pub fn result(&self, result: Vec<u8>) -> TaskResult {
        TaskResult {
            task_id: self.task_id.clone(),
            avs_address: self.avs_address.clone(),
            operator_address: None,
            result,
            signature: None,
        }
    }
}

/// The outcome of executing a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    /// Identifier of the originating task.
    pub task_id: String,

    /// Target service (AVS) address.
    #[serde(default)]
    pub avs_address: String,

    /// Identity of the operator that produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_address: Option<String>,

    /// Result payload.
    #[serde(with = "crate::shared::base64_bytes")]
    pub result: Vec<u8>,

    /// Signature over the result, when a signer is configured.
    #[serde(
        default,
        with = "crate::shared::base64_bytes::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub signature: Option<Vec<u8>>,
}

impl TaskResult {
    /// Creates an unsigned result.
    pub fn new(task_id: impl Into<String>, avs_address: impl Into<String>, result: Vec<u8>) -> Self {
        Self {
            task_id: task_id.into(),
            avs_address: avs_address.into(),
            operator_address: None,
            result,
            signature: None,
        }
    }

    /// Sets the producing operator's address.
    pub fn with_operator_address(mut self, address: impl Into<String>) -> Self {
        self.operator_address = Some(address.into());
        self
    }

    /// Attaches a signature.
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }
}
