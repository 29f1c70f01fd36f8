//! HTTP transport adapter.
//!
//! Routes:
//! - `POST /tasks`: body is a [`Task`] as JSON, response is a
//!   [`TaskResult`](crate::types::TaskResult) or a JSON error body.
//! - `GET /health`: `{"status":"running"}`.
//!
//! Every response, including method and decode failures, is JSON.

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
use serde::{Deserialize, Serialize};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::debug;

use crate::error::{ErrorClass, PerformerError};
use crate::types::{HttpHealth, Task};

use super::Performer;

/// Task submission path.
pub const TASKS_PATH: &str = "/tasks";
/// Health path.
pub const HEALTH_PATH: &str = "/health";

/// JSON error envelope written on every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error details inside [`ErrorBody`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable kind (`invalid_request`, `validation_error`, ...).
    pub kind: String,
    /// Human-readable cause chain.
    pub message: String,
}

impl ErrorBody {
    /// Builds an error body.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }
}

/// HTTP status for a performer error.
pub fn status_for(err: &PerformerError) -> StatusCode {
    match err.class() {
        ErrorClass::Client => StatusCode::BAD_REQUEST,
        ErrorClass::Server => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorClass::Unimplemented => StatusCode::NOT_IMPLEMENTED,
    }
}

impl IntoResponse for PerformerError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        (status, Json(ErrorBody::new(self.kind(), self.to_string()))).into_response()
    }
}

/// Builds the performer's HTTP router.
///
/// `request_timeout` bounds each request at the transport layer; requests
/// exceeding it get `408 Request Timeout` with a `timeout` error body.
pub fn router(performer: Performer, request_timeout: Duration) -> Router {
    Router::new()
        .route(
            TASKS_PATH,
            post(submit_task).fallback(method_not_allowed),
        )
        .route(HEALTH_PATH, get(health).fallback(method_not_allowed))
        .fallback(not_found)
        .with_state(performer)
        .layer(timeout_layer(request_timeout))
        .layer(map_response(timeout_body))
        .layer(TraceLayer::new_for_http())
}

/// The per-request timeout layer shared by every router.
///
/// Pair it with an outer `map_response(timeout_body)` so the 408 carries a
/// JSON body.
#[allow(deprecated)]
pub fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::new(timeout)
}

/// Replaces the empty body of a timed-out response with an [`ErrorBody`].
pub async fn timeout_body(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    (
        StatusCode::REQUEST_TIMEOUT,
        Json(ErrorBody::new("timeout", "request timed out")),
    )
        .into_response()
}

/// Router fallback for unknown paths.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new("not_found", "no such route")),
    )
        .into_response()
}

async fn submit_task(
    State(performer): State<Performer>,
    body: Bytes,
) -> Result<Json<crate::types::TaskResult>, PerformerError> {
    let task: Task = serde_json::from_slice(&body)
        .map_err(|e| PerformerError::InvalidRequest(format!("failed to decode task: {e}")))?;
    debug!(task_id = %task.task_id, "http task submission");
    performer.execute(task).await.map(Json)
}

async fn health() -> Json<HttpHealth> {
    Json(HttpHealth::running())
}

pub(crate) async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new("invalid_request", "method not allowed")),
    )
        .into_response()
}
