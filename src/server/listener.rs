//! A [`Component`] that serves one or more axum routers.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::lifecycle::Component;
use crate::shared::serve::{bind, serve_until_cancelled};

/// A router to be served on an address.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Label used in logs and for [`HttpServer::local_addr`].
    pub name: &'static str,
    /// Address to bind; port 0 picks an ephemeral port.
    pub addr: SocketAddr,
    /// Routes to serve.
    pub router: Router,
}

struct Running {
    shutdown: CancellationToken,
    bound: Vec<(&'static str, SocketAddr)>,
    tasks: Vec<JoinHandle<Result<()>>>,
}

/// Serves a fixed set of endpoints between `start` and `close`.
///
/// All listeners are bound before any of them starts serving, so a bind
/// failure leaves nothing running.
pub struct HttpServer {
    role: String,
    endpoints: Vec<Endpoint>,
    grace: Duration,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("role", &self.role)
            .field("endpoints", &self.endpoints.iter().map(|e| e.name).collect::<Vec<_>>())
            .field("grace", &self.grace)
            .finish()
    }
}

impl HttpServer {
    /// Creates a server labelled `role` with a shutdown grace period.
    pub fn new(role: impl Into<String>, grace: Duration) -> Self {
        Self {
            role: role.into(),
            endpoints: Vec::new(),
            grace,
            running: Mutex::new(None),
        }
    }

    /// The role label given at construction.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Adds an endpoint.
    pub fn endpoint(mut self, name: &'static str, addr: SocketAddr, router: Router) -> Self {
        self.endpoints.push(Endpoint { name, addr, router });
        self
    }

    /// The bound address of endpoint `name`, once started.
    pub fn local_addr(&self, name: &str) -> Option<SocketAddr> {
        self.running.lock().as_ref().and_then(|running| {
            running
                .bound
                .iter()
                .find(|(endpoint, _)| *endpoint == name)
                .map(|(_, addr)| *addr)
        })
    }

    /// Whether the server is between `start` and `close`.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

#[async_trait]
impl Component for HttpServer {
    async fn start(&self, ctx: CancellationToken) -> Result<()> {
        if self.is_running() {
            return Err(Error::InvalidState(format!("{} already started", self.role)));
        }

        let mut listeners = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            listeners.push((endpoint, bind(endpoint.addr).await?));
        }

        let shutdown = ctx.child_token();
        let mut bound = Vec::with_capacity(listeners.len());
        let mut tasks = Vec::with_capacity(listeners.len());
        for (endpoint, listener) in listeners {
            bound.push((endpoint.name, listener.local_addr()?));
            tasks.push(tokio::spawn(serve_until_cancelled(
                endpoint.name,
                listener,
                endpoint.router.clone(),
                shutdown.clone(),
                self.grace,
            )));
        }

        *self.running.lock() = Some(Running {
            shutdown,
            bound,
            tasks,
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };
        running.shutdown.cancel();
        let mut first_error = None;
        for joined in futures::future::join_all(running.tasks).await {
            let outcome = joined.map_err(Error::from).and_then(|served| served);
            if let (Err(err), None) = (outcome, &first_error) {
                first_error = Some(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
