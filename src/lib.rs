//! # Hourglass
//!
//! A transport-agnostic runtime for AVS task execution.
//!
//! An aggregator dispatches opaque tasks to a [`Worker`](worker::Worker)
//! through the [`Performer`](server::Performer) runtime, which validates,
//! executes and answers each task over HTTP (`POST /tasks`) or JSON-RPC
//! (`POST /rpc`). The [`ExecutorRelay`](server::ExecutorRelay) is the second
//! role: it accepts a submission, builds a result under its own operator
//! identity and reports it back to the aggregator over a separate call.
//!
//! Long-running pieces implement [`Component`](lifecycle::Component) and are
//! driven by a [`LifecycleManager`](lifecycle::LifecycleManager).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hourglass::config::Config;
//! use hourglass::lifecycle::LifecycleManager;
//! use hourglass::server::{performer_server, Performer};
//! use hourglass::worker::SquareWorker;
//!
//! # async fn run() -> hourglass::Result<()> {
//! let config = Config::from_env()?;
//! let performer = Performer::new(SquareWorker::new());
//!
//! let mut manager = LifecycleManager::new();
//! manager.register("performer", Arc::new(performer_server(performer, &config.server)));
//! manager.start().await?;
//! tokio::signal::ctrl_c().await?;
//! manager.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
#[cfg(feature = "logging")]
pub mod logging;
pub mod server;
pub mod shared;
pub mod types;
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::{Component, LifecycleManager};
pub use server::{ExecutorRelay, Performer};
pub use types::{Task, TaskResult};
pub use worker::{Worker, WorkerKind};
