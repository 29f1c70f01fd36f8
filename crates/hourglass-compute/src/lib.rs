//! Compute-with-verification variant of the Hourglass runtime.
//!
//! Squares numbers with the runtime's [`SquareWorker`](hourglass::worker::SquareWorker),
//! keeps every output in a [`ResultStore`] for 24 hours, and signs it with
//! an [`Attestor`]. Callers later prove an output is genuine through
//! `GET /api/verify/{id}`.
//!
//! # Module Organization
//!
//! - [`store`] - result store with read-time expiry
//! - [`attestation`] - attestor trait and the mock implementation
//! - [`service`] - axum router
//! - [`error`] - store and handler errors

pub mod attestation;
pub mod error;
pub mod service;
pub mod store;

use std::sync::Arc;

use hourglass::config::ServerConfig;
use hourglass::server::{HttpServer, HTTP_ENDPOINT};

pub use attestation::{AttestationReport, Attestor, MockAttestor};
pub use error::{ComputeError, StoreError};
pub use service::{ComputeRequest, ComputeState, SignedOutput, Verification};
pub use store::{ComputeResult, ResultStore, RESULT_TTL};

/// Serves the compute service on the configured HTTP port.
pub fn compute_server(store: Arc<ResultStore>, attestor: Arc<dyn Attestor>, config: &ServerConfig) -> HttpServer {
    HttpServer::new("compute", config.shutdown_grace()).endpoint(
        HTTP_ENDPOINT,
        config.http_addr(),
        service::router(ComputeState::new(store, attestor), config.request_timeout()),
    )
}
