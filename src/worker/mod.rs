//! The worker contract and its built-in implementations.
//!
//! A [`Worker`] is the operator-supplied business logic bound to a
//! performer. The runtime only ever talks to `dyn Worker`; implementations
//! differ in how they interpret the task payload, never in protocol
//! mechanics.
//!
//! # Examples
//!
//! ```
//! use hourglass::types::Task;
//! use hourglass::worker::{HexSquareWorker, Worker};
//!
//! # tokio_test_block_on(async {
//! let worker = HexSquareWorker::new();
//! let task = Task::new("t1", "0xavs", b"0x4".to_vec());
//! worker.validate_task(&task).unwrap();
//! let result = worker.handle_task(&task).await.unwrap();
//! assert_eq!(result.result, b"0x10");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

mod delayed;
mod greeting;
mod hex;
mod square;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, ValidationError};
use crate::types::{Task, TaskResult};

pub use delayed::DelayedWorker;
pub use greeting::GreetingWorker;
pub use hex::HexSquareWorker;
pub use square::{SquareOutput, SquareWorker};

/// Validate-then-execute logic for one task domain.
///
/// `validate_task` must be side-effect free. `handle_task` may be slow but
/// must eventually return; transports bound its duration with their own
/// timeout.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Rejects tasks whose payload is empty or not parseable.
    fn validate_task(&self, task: &Task) -> Result<(), ValidationError>;

    /// Executes the task. The returned result must carry `task.task_id`.
    async fn handle_task(&self, task: &Task) -> Result<TaskResult, HandlerError>;
}

#[async_trait]
impl<W: Worker + ?Sized> Worker for Arc<W> {
    fn validate_task(&self, task: &Task) -> Result<(), ValidationError> {
        (**self).validate_task(task)
    }

    async fn handle_task(&self, task: &Task) -> Result<TaskResult, HandlerError> {
        (**self).handle_task(task).await
    }
}

/// Selects one of the built-in workers, typically from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerKind {
    /// JSON `{"numberToBeSquared": n}` squaring.
    #[default]
    Square,
    /// Hex-encoded integer squaring.
    HexSquare,
    /// Greeting echo.
    Greeting,
}

impl WorkerKind {
    /// Instantiates the worker, wrapping it in a [`DelayedWorker`] when a
    /// non-zero delay is given.
    pub fn build(self, delay: Option<Duration>) -> Arc<dyn Worker> {
        let worker: Arc<dyn Worker> = match self {
            Self::Square => Arc::new(SquareWorker::new()),
            Self::HexSquare => Arc::new(HexSquareWorker::new()),
            Self::Greeting => Arc::new(GreetingWorker::new()),
        };
        match delay {
            Some(delay) if !delay.is_zero() => Arc::new(DelayedWorker::new(worker, delay)),
            _ => worker,
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Square => "square",
            Self::HexSquare => "hex-square",
            Self::Greeting => "greeting",
        };
        f.write_str(name)
    }
}

impl FromStr for WorkerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "square" => Ok(Self::Square),
            "hex-square" | "hex" => Ok(Self::HexSquare),
            "greeting" => Ok(Self::Greeting),
            other => Err(format!("unknown worker kind: {other}")),
        }
    }
}
