//! Messages exchanged by the executor relay, the submitting aggregator and
//! the aggregator's result-submission endpoint.

use serde::{Deserialize, Serialize};

/// A task handed to an executor by an aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmission {
    /// Task identifier.
    pub task_id: String,
    /// Address of the submitting aggregator.
    #[serde(default)]
    pub aggregator_address: String,
    /// Target service (AVS) address.
    #[serde(default)]
    pub avs_address: String,
    /// Task payload.
    #[serde(with = "crate::shared::base64_bytes")]
    pub payload: Vec<u8>,
}

/// The aggregator's answer to a result submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorAck {
    /// Whether the aggregator accepted the result.
    pub success: bool,
    /// Free-form message.
    #[serde(default)]
    pub message: String,
}

/// The executor's reply to a [`TaskSubmission`].
///
/// `received` reflects only that the executor accepted the submission.
/// Delivery to the aggregator is reported separately through `delivered`
/// and never turns the submission call itself into an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAck {
    /// Task identifier.
    pub task_id: String,
    /// Always `true` once the relay accepted the submission.
    pub received: bool,
    /// Whether the aggregator acknowledged the result.
    pub delivered: bool,
    /// Aggregator message, or the delivery failure.
    pub message: String,
}
