//! Wire and value types shared by every transport.

pub mod jsonrpc;
pub mod relay;
pub mod task;

use serde::{Deserialize, Serialize};

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, RpcStatus};
pub use relay::{AggregatorAck, SubmissionAck, TaskSubmission};
pub use task::{Task, TaskResult};

/// Liveness status reported by the RPC health service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Not yet known.
    Unknown,
    /// Accepting requests.
    Serving,
    /// Not accepting requests.
    NotServing,
}

/// Body of `health.Check` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Current status.
    pub status: HealthStatus,
}

/// Body of the HTTP `GET /health` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHealth {
    /// Always `"running"` while the listener is up.
    pub status: String,
}

impl HttpHealth {
    /// The fixed running status.
    pub fn running() -> Self {
        Self {
            status: "running".to_string(),
        }
    }
}
