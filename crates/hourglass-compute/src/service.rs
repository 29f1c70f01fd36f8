//! HTTP surface of the compute-with-verification service.
//!
//! Routes:
//! - `GET /health`: `{"status":"running"}`
//! - `GET /attestation`: the attestor's [`AttestationReport`](crate::attestation::AttestationReport)
//! - `POST /api/compute`: squares `numberToBeSquared`, stores and signs the
//!   result, and names the attestation in `X-Attestation-Id`
//! - `GET /api/verify/{id}`: `{"verified": true, "output_id": id}`, `404` for
//!   unknown ids, `410` once the result has expired

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderValue,
    middleware::map_response,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hourglass::server::http::{not_found, timeout_body, timeout_layer};
use hourglass::server::Performer;
use hourglass::types::{HttpHealth, Task};
use hourglass::worker::{SquareOutput, SquareWorker};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::attestation::Attestor;
use crate::error::ComputeError;
use crate::store::ResultStore;

/// Header carrying the attestation id on signed outputs.
pub const ATTESTATION_HEADER: &str = "x-attestation-id";

/// Body of `POST /api/compute`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequest {
    /// Caller-chosen request identifier.
    pub request_id: String,
    /// JSON integer or decimal string.
    pub number_to_be_squared: Box<RawValue>,
}

/// Response of `POST /api/compute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedOutput {
    /// Store-generated id to verify against.
    pub output_id: String,
    /// Echo of the caller's request id.
    pub request_id: String,
    /// Decimal square.
    pub output: String,
    /// RFC 3339 computation time.
    pub computed_at: String,
    /// Computation time in milliseconds.
    pub duration_ms: u64,
    /// Attestor signature over the output id and output.
    pub signature: String,
}

/// Response of `GET /api/verify/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Whether the output is known and unexpired.
    pub verified: bool,
    /// The id that was looked up.
    pub output_id: String,
}

/// Shared handler state.
#[derive(Clone)]
pub struct ComputeState {
    store: Arc<ResultStore>,
    attestor: Arc<dyn Attestor>,
    performer: Performer,
}

impl std::fmt::Debug for ComputeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeState")
            .field("stored", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl ComputeState {
    /// Wires a store and attestor to the squaring worker.
    pub fn new(store: Arc<ResultStore>, attestor: Arc<dyn Attestor>) -> Self {
        Self {
            store,
            attestor,
            performer: Performer::new(SquareWorker::new()),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Computes, stores and signs one request.
    pub async fn compute(&self, request: ComputeRequest) -> Result<SignedOutput, ComputeError> {
        let payload = format!(
            r#"{{"numberToBeSquared":{}}}"#,
            request.number_to_be_squared.get()
        );
        let nonce = Uuid::new_v4().to_string();
        let task = Task::new(request.request_id.clone(), "", payload.into_bytes());

        let started = Instant::now();
        let result = self.performer.execute(task).await?;
        let elapsed = started.elapsed();

        let output: SquareOutput = serde_json::from_slice(&result.result)
            .map_err(|e| ComputeError::Output(e.to_string()))?;
        let nondeterministic = BTreeMap::from([
            ("timestamp".to_string(), output.timestamp.to_string()),
            ("nonce".to_string(), nonce),
        ]);
        let stored = self.store.insert(
            request.request_id,
            output.result.get(),
            elapsed,
            nondeterministic,
        );
        info!(
            output_id = %stored.id,
            request_id = %stored.request_id,
            duration_ms = stored.duration_ms,
            "stored computed output"
        );

        let signature = self
            .attestor
            .sign(format!("{}:{}", stored.id, stored.output).as_bytes());
        Ok(SignedOutput {
            output_id: stored.id,
            request_id: stored.request_id,
            output: stored.output,
            computed_at: stored.computed_at.to_rfc3339(),
            duration_ms: stored.duration_ms,
            signature,
        })
    }
}

/// Builds the service router.
pub fn router(state: ComputeState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/attestation", get(attestation))
        .route("/api/compute", post(compute))
        .route("/api/verify/{id}", get(verify))
        .fallback(not_found)
        .with_state(state)
        .layer(timeout_layer(request_timeout))
        .layer(map_response(timeout_body))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<HttpHealth> {
    Json(HttpHealth::running())
}

async fn attestation(State(state): State<ComputeState>) -> impl IntoResponse {
    Json(state.attestor.report())
}

async fn compute(State(state): State<ComputeState>, body: Bytes) -> Result<Response, ComputeError> {
    let request: ComputeRequest = serde_json::from_slice(&body)
        .map_err(|e| ComputeError::InvalidRequest(format!("failed to decode request: {e}")))?;
    let signed = state.compute(request).await?;
    let mut response = Json(signed).into_response();
    if let Ok(value) = HeaderValue::from_str(&state.attestor.report().attestation_id) {
        response.headers_mut().insert(ATTESTATION_HEADER, value);
    }
    Ok(response)
}

async fn verify(
    State(state): State<ComputeState>,
    Path(id): Path<String>,
) -> Result<Json<Verification>, ComputeError> {
    let stored = state.store.get(&id)?;
    Ok(Json(Verification {
        verified: true,
        output_id: stored.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::MockAttestor;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn state() -> ComputeState {
        ComputeState::new(Arc::new(ResultStore::new()), Arc::new(MockAttestor::new()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let header = response
            .headers()
            .get(ATTESTATION_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, header, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_compute(body: &str) -> Request<Body> {
        Request::post("/api/compute")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn compute_then_verify() {
        let state = state();
        let app = router(state.clone(), Duration::from_secs(5));

        let (status, header, body) = send(
            app.clone(),
            post_compute(r#"{"requestId": "r1", "numberToBeSquared": 4}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header.unwrap(), state.attestor.report().attestation_id);
        let signed: SignedOutput = serde_json::from_value(body).unwrap();
        assert_eq!(signed.output, "16");
        assert_eq!(signed.request_id, "r1");
        assert!(state
            .attestor
            .verify(format!("{}:16", signed.output_id).as_bytes(), &signed.signature));

        let stored = state.store().get(&signed.output_id).unwrap();
        assert!(stored.nondeterministic.contains_key("nonce"));
        assert!(stored.nondeterministic.contains_key("timestamp"));

        let (status, _, body) = send(
            app,
            Request::get(format!("/api/verify/{}", signed.output_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"verified": true, "output_id": signed.output_id})
        );
    }

    #[tokio::test]
    async fn unknown_id_is_404_and_expired_is_410() {
        let state = state();
        let stale = state.store().insert_at(
            "old",
            "1",
            Duration::ZERO,
            BTreeMap::new(),
            chrono::Utc::now() - chrono::Duration::hours(25),
        );
        let app = router(state, Duration::from_secs(5));

        let (status, _, body) = send(
            app.clone(),
            Request::get("/api/verify/missing").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");

        let (status, _, body) = send(
            app,
            Request::get(format!("/api/verify/{}", stale.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"]["kind"], "expired");
    }

    #[tokio::test]
    async fn bad_input_is_rejected() {
        let app = router(state(), Duration::from_secs(5));
        let (status, _, _) = send(app.clone(), post_compute("not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = send(
            app,
            post_compute(r#"{"requestId": "r1", "numberToBeSquared": "x"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "validation_error");
    }

    #[tokio::test]
    async fn health_and_attestation() {
        let app = router(state(), Duration::from_secs(5));
        let (status, _, body) = send(
            app.clone(),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");

        let (_, _, body) = send(
            app.clone(),
            Request::get("/attestation").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body["mock"], true);

        let (status, _, body) = send(app, Request::get("/api/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");
    }
}
