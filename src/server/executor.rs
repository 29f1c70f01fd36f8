//! Executor relay: accepts task submissions and reports results back to the
//! aggregator over a separate call.
//!
//! The submission call answers with a [`SubmissionAck`]; `received` is the
//! relay's own acceptance and `delivered` is whatever the aggregator said.
//! A failed delivery never fails the submission.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware::map_response,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::client::AggregatorClient;
use crate::error::RelayError;
use crate::types::{HttpHealth, SubmissionAck, TaskResult, TaskSubmission};

use super::http::{method_not_allowed, not_found, timeout_body, timeout_layer, ErrorBody, HEALTH_PATH};

/// Submission path.
pub const SUBMIT_PATH: &str = "/tasks/submit";

/// Message returned when delivery runs in the background.
pub const DELIVERY_SCHEDULED: &str = "delivery scheduled";

/// The executor relay.
#[derive(Clone)]
pub struct ExecutorRelay {
    operator_address: String,
    aggregator: Arc<dyn AggregatorClient>,
    detached: bool,
    deliveries: TaskTracker,
}

impl std::fmt::Debug for ExecutorRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRelay")
            .field("operator_address", &self.operator_address)
            .field("detached", &self.detached)
            .finish_non_exhaustive()
    }
}

impl ExecutorRelay {
    /// Creates a relay that delivers inline.
    pub fn new(operator_address: impl Into<String>, aggregator: Arc<dyn AggregatorClient>) -> Self {
        Self {
            operator_address: operator_address.into(),
            aggregator,
            detached: false,
            deliveries: TaskTracker::new(),
        }
    }

    /// Switches to background delivery.
    pub fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    /// The address results are attributed to.
    pub fn operator_address(&self) -> &str {
        &self.operator_address
    }

    /// Accepts a submission and relays a result to the aggregator.
    ///
    /// Only an unusable submission is an error.
    pub async fn submit_task(&self, submission: TaskSubmission) -> Result<SubmissionAck, RelayError> {
        if submission.task_id.is_empty() {
            return Err(RelayError::InvalidSubmission("task id is empty".into()));
        }
        if submission.payload.is_empty() {
            return Err(RelayError::InvalidSubmission("payload is empty".into()));
        }
        info!(
            task_id = %submission.task_id,
            aggregator = %submission.aggregator_address,
            "received task submission"
        );

        let result = self.synthesize(&submission);
        let task_id = submission.task_id;

        if self.detached {
            let aggregator = Arc::clone(&self.aggregator);
            self.deliveries.spawn(async move {
                deliver(aggregator.as_ref(), &result).await;
            });
            return Ok(SubmissionAck {
                task_id,
                received: true,
                delivered: false,
                message: DELIVERY_SCHEDULED.to_string(),
            });
        }

        let (delivered, message) = deliver(self.aggregator.as_ref(), &result).await;
        Ok(SubmissionAck {
            task_id,
            received: true,
            delivered,
            message,
        })
    }

    /// Waits for background deliveries to finish, up to `grace`.
    ///
    /// Returns `false` when deliveries were still running at the deadline.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.deliveries.close();
        tokio::time::timeout(grace, self.deliveries.wait())
            .await
            .is_ok()
    }

    fn synthesize(&self, submission: &TaskSubmission) -> TaskResult {
        TaskResult::new(
            submission.task_id.clone(),
            submission.avs_address.clone(),
            submission.payload.clone(),
        )
        .with_operator_address(self.operator_address.clone())
    }
}

async fn deliver(aggregator: &dyn AggregatorClient, result: &TaskResult) -> (bool, String) {
    match aggregator.submit_task_result(result).await {
        Ok(ack) => {
            if ack.success {
                info!(task_id = %result.task_id, "aggregator accepted result");
            } else {
                warn!(task_id = %result.task_id, message = %ack.message, "aggregator declined result");
            }
            (ack.success, ack.message)
        },
        Err(err) => {
            warn!(task_id = %result.task_id, error = %err, "failed to deliver result");
            (false, err.to_string())
        },
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            Self::InvalidSubmission(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            _ => (StatusCode::BAD_GATEWAY, "relay_error"),
        };
        (status, Json(ErrorBody::new(kind, self.to_string()))).into_response()
    }
}

/// Builds the executor's HTTP router.
pub fn router(relay: ExecutorRelay, request_timeout: Duration) -> Router {
    Router::new()
        .route(SUBMIT_PATH, post(submit).fallback(method_not_allowed))
        .route(HEALTH_PATH, get(health).fallback(method_not_allowed))
        .fallback(not_found)
        .with_state(relay)
        .layer(timeout_layer(request_timeout))
        .layer(map_response(timeout_body))
        .layer(TraceLayer::new_for_http())
}

async fn submit(
    State(relay): State<ExecutorRelay>,
    body: Bytes,
) -> Result<Json<SubmissionAck>, RelayError> {
    let submission: TaskSubmission = serde_json::from_slice(&body)
        .map_err(|e| RelayError::InvalidSubmission(format!("failed to decode submission: {e}")))?;
    relay.submit_task(submission).await.map(Json)
}

async fn health() -> Json<HttpHealth> {
    Json(HttpHealth::running())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::aggregator::MockAggregatorClient;
    use crate::types::AggregatorAck;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn submission() -> TaskSubmission {
        TaskSubmission {
            task_id: "t1".into(),
            aggregator_address: "0xagg".into(),
            avs_address: "0xavs".into(),
            payload: b"work".to_vec(),
        }
    }

    #[tokio::test]
    async fn relays_result_with_operator_identity() {
        let mut aggregator = MockAggregatorClient::new();
        aggregator
            .expect_submit_task_result()
            .withf(|result| {
                result.task_id == "t1"
                    && result.avs_address == "0xavs"
                    && result.operator_address.as_deref() == Some("0xop")
                    && result.result == b"work"
            })
            .times(1)
            .returning(|_| {
                Ok(AggregatorAck {
                    success: true,
                    message: "ok".into(),
                })
            });

        let relay = ExecutorRelay::new("0xop", Arc::new(aggregator));
        let ack = relay.submit_task(submission()).await.unwrap();
        assert_eq!(
            ack,
            SubmissionAck {
                task_id: "t1".into(),
                received: true,
                delivered: true,
                message: "ok".into(),
            }
        );
    }

    #[tokio::test]
    async fn delivery_failure_still_acknowledges_receipt() {
        let mut aggregator = MockAggregatorClient::new();
        aggregator
            .expect_submit_task_result()
            .returning(|_| Err(RelayError::Transport("connection refused".into())));

        let relay = ExecutorRelay::new("0xop", Arc::new(aggregator));
        let ack = relay.submit_task(submission()).await.unwrap();
        assert!(ack.received);
        assert!(!ack.delivered);
        assert!(ack.message.contains("connection refused"));
    }

    #[tokio::test]
    async fn empty_submission_never_reaches_aggregator() {
        let mut aggregator = MockAggregatorClient::new();
        aggregator.expect_submit_task_result().times(0);

        let relay = ExecutorRelay::new("0xop", Arc::new(aggregator));
        let mut empty = submission();
        empty.payload.clear();
        assert!(matches!(
            relay.submit_task(empty).await,
            Err(RelayError::InvalidSubmission(_))
        ));
    }

    #[tokio::test]
    async fn detached_delivery_returns_before_the_callback() {
        let mut aggregator = MockAggregatorClient::new();
        aggregator.expect_submit_task_result().times(1).returning(|_| {
            Ok(AggregatorAck {
                success: true,
                message: String::new(),
            })
        });

        let relay = ExecutorRelay::new("0xop", Arc::new(aggregator)).detached(true);
        let ack = relay.submit_task(submission()).await.unwrap();
        assert!(ack.received);
        assert!(!ack.delivered);
        assert_eq!(ack.message, DELIVERY_SCHEDULED);
        assert!(relay.drain(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn http_surface() {
        let mut aggregator = MockAggregatorClient::new();
        aggregator.expect_submit_task_result().returning(|_| {
            Ok(AggregatorAck {
                success: false,
                message: "duplicate".into(),
            })
        });
        let app = router(
            ExecutorRelay::new("0xop", Arc::new(aggregator)),
            Duration::from_secs(5),
        );

        let response = app
            .clone()
            .oneshot(
                Request::post(SUBMIT_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"taskId":"t1","aggregatorAddress":"0xagg","avsAddress":"0xavs","payload":"d29yaw=="}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let ack: SubmissionAck = serde_json::from_slice(&bytes).unwrap();
        assert!(ack.received);
        assert!(!ack.delivered);
        assert_eq!(ack.message, "duplicate");

        let response = app
            .clone()
            .oneshot(Request::post(SUBMIT_PATH).body(Body::from("nope")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(Request::get("/tasks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.kind, "not_found");
    }
}
