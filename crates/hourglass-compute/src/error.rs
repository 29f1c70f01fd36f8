//! Error types for the compute service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use hourglass::server::http::ErrorBody;
use thiserror::Error;

/// Result store lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No result with this id was ever stored.
    #[error("result {0} not found")]
    NotFound(String),

    /// The result exists but is past its validity window.
    #[error("result {id} expired (computed at {computed_at})")]
    Expired {
        /// The result id.
        id: String,
        /// When it was computed.
        computed_at: DateTime<Utc>,
    },
}

/// Failures of the compute service's HTTP handlers.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// The request body was unusable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The computation itself failed.
    #[error(transparent)]
    Performer(#[from] hourglass::error::PerformerError),

    /// Lookup failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The computed output could not be decoded.
    #[error("malformed output: {0}")]
    Output(String),
}

impl IntoResponse for ComputeError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Performer(err) => (hourglass::server::http::status_for(err), err.kind()),
            Self::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Store(StoreError::Expired { .. }) => (StatusCode::GONE, "expired"),
            Self::Output(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        (status, Json(ErrorBody::new(kind, self.to_string()))).into_response()
    }
}
