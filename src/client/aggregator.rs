//! Client for the aggregator's result-submission endpoint.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::RelayError;
use crate::types::{AggregatorAck, JsonRpcRequest, JsonRpcResponse, TaskResult};

/// JSON-RPC method the aggregator exposes for results.
pub const SUBMIT_TASK_RESULT: &str = "aggregator.SubmitTaskResult";

/// Delivers task results to an aggregator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    /// Submits one result and returns the aggregator's acknowledgment.
    async fn submit_task_result(&self, result: &TaskResult) -> Result<AggregatorAck, RelayError>;
}

/// [`AggregatorClient`] speaking JSON-RPC over HTTP.
#[derive(Debug)]
pub struct HttpAggregatorClient {
    endpoint: Url,
    client: reqwest::Client,
    request_id: AtomicI64,
}

impl HttpAggregatorClient {
    /// Creates a client posting to `endpoint` with a per-call timeout.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint,
            client,
            request_id: AtomicI64::new(1),
        })
    }

    /// The endpoint results are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn next_id(&self) -> i64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl AggregatorClient for HttpAggregatorClient {
    async fn submit_task_result(&self, result: &TaskResult) -> Result<AggregatorAck, RelayError> {
        let params = serde_json::to_value(result)
            .map_err(|e| RelayError::InvalidSubmission(format!("failed to encode result: {e}")))?;
        let request = JsonRpcRequest::new(self.next_id(), SUBMIT_TASK_RESULT, Some(params));
        debug!(task_id = %result.task_id, endpoint = %self.endpoint, "submitting result");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Status {
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;
        let value = envelope.into_result().map_err(|e| RelayError::Rejected {
            code: e.code,
            message: e.message,
        })?;
        serde_json::from_value(value).map_err(|e| RelayError::InvalidResponse(e.to_string()))
    }
}
