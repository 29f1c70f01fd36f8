//! Performer runtime, its transports, and the executor relay.
//!
//! [`performer_server`] and [`ExecutorServer`] wrap the routers in
//! [`Component`]s so a [`LifecycleManager`](crate::lifecycle::LifecycleManager)
//! can start and stop them.

pub mod executor;
pub mod http;
pub mod listener;
pub mod performer;
pub mod rpc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::lifecycle::Component;

pub use executor::ExecutorRelay;
pub use listener::{Endpoint, HttpServer};
pub use performer::Performer;
pub use rpc::RpcService;

/// Endpoint name of the HTTP transport.
pub const HTTP_ENDPOINT: &str = "http";
/// Endpoint name of the RPC transport.
pub const RPC_ENDPOINT: &str = "rpc";

/// Exposes `performer` over both transports on the configured ports.
pub fn performer_server(performer: Performer, config: &ServerConfig) -> HttpServer {
    let timeout = config.request_timeout();
    HttpServer::new("performer", config.shutdown_grace())
        .endpoint(
            HTTP_ENDPOINT,
            config.http_addr(),
            http::router(performer.clone(), timeout),
        )
        .endpoint(RPC_ENDPOINT, config.rpc_addr(), rpc::router(performer, timeout))
}

/// The executor relay's HTTP surface plus its background deliveries.
#[derive(Debug)]
pub struct ExecutorServer {
    relay: ExecutorRelay,
    http: HttpServer,
    grace: std::time::Duration,
}

impl ExecutorServer {
    /// Serves `relay` on the configured HTTP port.
    pub fn new(relay: ExecutorRelay, config: &ServerConfig) -> Self {
        let http = HttpServer::new("executor", config.shutdown_grace()).endpoint(
            HTTP_ENDPOINT,
            config.http_addr(),
            executor::router(relay.clone(), config.request_timeout()),
        );
        Self {
            relay,
            http,
            grace: config.shutdown_grace(),
        }
    }

    /// The bound HTTP address, once started.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.http.local_addr(HTTP_ENDPOINT)
    }
}

#[async_trait]
impl Component for ExecutorServer {
    async fn start(&self, ctx: CancellationToken) -> Result<()> {
        self.http.start(ctx).await
    }

    async fn close(&self) -> Result<()> {
        let closed = self.http.close().await;
        if !self.relay.drain(self.grace).await {
            warn!("result deliveries still pending at shutdown");
        }
        closed
    }
}
