//! Serving an axum router with cooperative, bounded shutdown.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Binds a TCP listener, surfacing bind failures as construction errors.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to bind {addr}: {e}"),
        ))
    })
}

/// Serves `router` on `listener` until `shutdown` is cancelled.
///
/// On cancellation the listener is closed, idle connections are told to
/// close and in-flight requests get up to `grace` to finish. Connections
/// still open after that are aborted, so their clients see the connection
/// drop.
pub async fn serve_until_cancelled(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(server = name, %addr, "listening");

    let builder = Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(server = name, error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                },
            },
            () = shutdown.cancelled() => break,
        };

        let service = TowerToHyperService::new(router.clone());
        let connection = graceful.watch(
            builder
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .into_owned(),
        );
        connections.spawn(async move {
            if let Err(e) = connection.await {
                debug!(%peer, error = %e, "connection closed with error");
            }
        });
        while connections.try_join_next().is_some() {}
    }
    drop(listener);

    info!(server = name, grace_ms = grace.as_millis() as u64, "draining in-flight requests");
    tokio::select! {
        () = graceful.shutdown() => info!(server = name, "stopped"),
        () = tokio::time::sleep(grace) => {
            warn!(
                server = name,
                open = connections.len(),
                "grace period elapsed; closing remaining connections"
            );
        },
    }
    connections.shutdown().await;
    Ok(())
}

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);
