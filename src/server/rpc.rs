//! RPC transport adapter: JSON-RPC 2.0 over `POST /rpc`.
//!
//! | Method | Params | Result |
//! |---|---|---|
//! | `performer.ExecuteTask` | [`Task`] | [`TaskResult`](crate::types::TaskResult) |
//! | `health.Check` | `{"service"?: string}` | `{"status": "SERVING"}` |
//! | `health.Watch` | any | always `UNIMPLEMENTED` |
//! | `performer.StartSync` | `{}` | `{}` |
//!
//! Failures carry a status name in `error.data.status`: `INVALID_ARGUMENT`
//! for caller faults, `INTERNAL` for handler faults and `UNIMPLEMENTED` for
//! streaming health and unknown methods, and `DEADLINE_EXCEEDED` once a call
//! outlives the request timeout. The HTTP status is always 200 once a
//! JSON-RPC response could be produced.

use std::time::Duration;

use axum::{body::Bytes, extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::PerformerError;
use crate::types::jsonrpc::{codes, JSONRPC_VERSION};
use crate::types::{
    HealthCheckResponse, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcStatus, Task,
};

use super::Performer;

/// RPC endpoint path.
pub const RPC_PATH: &str = "/rpc";

/// Method names served by [`RpcService`].
pub mod methods {
    /// Unary task execution.
    pub const EXECUTE_TASK: &str = "performer.ExecuteTask";
    /// Synchronization handshake placeholder.
    pub const START_SYNC: &str = "performer.StartSync";
    /// Liveness check.
    pub const HEALTH_CHECK: &str = "health.Check";
    /// Streaming liveness, not implemented.
    pub const HEALTH_WATCH: &str = "health.Watch";
}

/// Transport-independent JSON-RPC dispatcher over a [`Performer`].
#[derive(Debug, Clone)]
pub struct RpcService {
    performer: Performer,
    request_timeout: Option<Duration>,
}

impl RpcService {
    /// Wraps a performer. Calls run without a deadline.
    pub fn new(performer: Performer) -> Self {
        Self {
            performer,
            request_timeout: None,
        }
    }

    /// Answers `DEADLINE_EXCEEDED` for calls running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Decodes raw bytes into a request and dispatches it.
    ///
    /// Unparsable JSON yields a `-32700` response and a structurally invalid
    /// envelope a `-32600` response; neither reaches the worker.
    pub async fn handle_bytes(&self, body: &[u8]) -> JsonRpcResponse {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                return JsonRpcResponse::failure(
                    None,
                    JsonRpcError {
                        code: codes::PARSE_ERROR,
                        message: format!("parse error: {e}"),
                        data: None,
                    },
                );
            },
        };
        let id = value
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value(id).ok());
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return JsonRpcResponse::failure(id, invalid_request(format!("invalid request: {e}")));
            },
        };
        if request.jsonrpc != JSONRPC_VERSION {
            return JsonRpcResponse::failure(
                Some(request.id),
                invalid_request(format!("unsupported jsonrpc version {}", request.jsonrpc)),
            );
        }
        self.handle(request).await
    }

    /// Dispatches a decoded request.
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, "rpc request");
        let id = Some(request.id.clone());
        let method = request.method.clone();
        let outcome = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.dispatch(request)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(%method, timeout_ms = limit.as_millis() as u64, "rpc request timed out");
                    return JsonRpcResponse::failure(
                        id,
                        JsonRpcError::with_status(RpcStatus::DeadlineExceeded, "request timed out"),
                    );
                },
            },
            None => self.dispatch(request).await,
        };
        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::failure(id, JsonRpcError::from(&err)),
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Result<Value, PerformerError> {
        match request.method.as_str() {
            methods::EXECUTE_TASK => {
                let params = request.params.ok_or_else(|| {
                    PerformerError::InvalidRequest("missing task params".to_string())
                })?;
                let task: Task = serde_json::from_value(params).map_err(|e| {
                    PerformerError::InvalidRequest(format!("failed to decode task: {e}"))
                })?;
                let result = self.performer.execute(task).await?;
                serde_json::to_value(result).map_err(|e| {
                    PerformerError::Handler(crate::error::HandlerError::Encoding(e))
                })
            },
            methods::HEALTH_CHECK => Ok(json!(HealthCheckResponse {
                status: self.performer.health(),
            })),
            methods::HEALTH_WATCH => self.performer.watch_health().map(|()| Value::Null),
            methods::START_SYNC => self.performer.start_sync().map(|()| json!({})),
            other => {
                debug!(method = %other, "unknown rpc method");
                Err(PerformerError::NotImplemented(other.to_string()))
            },
        }
    }
}

fn invalid_request(message: String) -> JsonRpcError {
    JsonRpcError::with_status(RpcStatus::InvalidRequest, message)
}

/// Builds the performer's RPC router.
///
/// The request timeout is applied per call so that a timed-out call still
/// gets a JSON-RPC error echoing its id.
pub fn router(performer: Performer, request_timeout: Duration) -> Router {
    Router::new()
        .route(
            RPC_PATH,
            post(handle_rpc).fallback(super::http::method_not_allowed),
        )
        .fallback(super::http::not_found)
        .with_state(RpcService::new(performer).with_timeout(request_timeout))
        .layer(TraceLayer::new_for_http())
}

async fn handle_rpc(State(service): State<RpcService>, body: Bytes) -> Json<JsonRpcResponse> {
    Json(service.handle_bytes(&body).await)
}
