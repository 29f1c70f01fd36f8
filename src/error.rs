//! Error types for the Hourglass task runtime.
//!
//! Errors are grouped by the layer that produces them. Worker
//! implementations return [`ValidationError`] and [`HandlerError`]; the
//! performer runtime folds those into [`PerformerError`], whose
//! [`ErrorClass`] decides how each transport reports the failure.

use thiserror::Error;

/// Result type alias for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a worker rejects a task before executing it.
///
/// Validation failures are always the caller's fault and are reported with
/// a client-error class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The task carried no payload bytes.
    #[error("task payload is empty")]
    EmptyPayload,

    /// The task identifier was empty.
    #[error("task id is empty")]
    EmptyTaskId,

    /// The payload could not be parsed into the shape the worker expects.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// Human-readable parse failure.
        reason: String,
    },
}

impl ValidationError {
    /// Convenience constructor for [`ValidationError::MalformedPayload`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }
}

/// Failures raised while a worker executes a task.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload failed validation at execution time.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The worker's computation failed.
    #[error("task computation failed: {0}")]
    Computation(String),

    /// The produced result could not be serialized.
    #[error("failed to encode result: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller sent something wrong (HTTP 4xx, `INVALID_ARGUMENT`).
    Client,
    /// The runtime or worker failed (HTTP 5xx, `INTERNAL`).
    Server,
    /// The operation is deliberately not implemented (`UNIMPLEMENTED`).
    Unimplemented,
}

/// Errors surfaced by the performer runtime to its transports.
#[derive(Debug, Error)]
pub enum PerformerError {
    /// The request envelope could not be decoded or used the wrong method.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The worker rejected the task.
    #[error("task validation failed: {0}")]
    Validation(#[source] ValidationError),

    /// The worker failed to execute the task.
    #[error("task execution failed: {0}")]
    Handler(#[source] HandlerError),

    /// The called operation is not implemented.
    #[error("{0} is not implemented")]
    NotImplemented(String),
}

impl PerformerError {
    /// Returns the transport-neutral error class.
    ///
    /// ```
    /// use hourglass::error::{ErrorClass, PerformerError, ValidationError};
    ///
    /// let err = PerformerError::Validation(ValidationError::EmptyPayload);
    /// assert_eq!(err.class(), ErrorClass::Client);
    ///
    /// let err = PerformerError::NotImplemented("Watch".into());
    /// assert_eq!(err.class(), ErrorClass::Unimplemented);
    /// ```
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidRequest(_) | Self::Validation(_) => ErrorClass::Client,
            Self::Handler(_) => ErrorClass::Server,
            Self::NotImplemented(_) => ErrorClass::Unimplemented,
        }
    }

    /// Short machine-readable kind, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Validation(_) => "validation_error",
            Self::Handler(_) => "handler_error",
            Self::NotImplemented(_) => "not_implemented",
        }
    }
}

/// Failures of the executor relay while delivering a result to an aggregator.
///
/// None of these fail the submission call; they are folded into a
/// negative acknowledgment.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The submission itself was unusable.
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    /// The aggregator could not be reached.
    #[error("aggregator unreachable: {0}")]
    Transport(String),

    /// The aggregator answered with a non-success HTTP status.
    #[error("aggregator returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The aggregator answered with a JSON-RPC error.
    #[error("aggregator rejected result ({code}): {message}")]
    Rejected {
        /// JSON-RPC error code.
        code: i32,
        /// Error message from the aggregator.
        message: String,
    },

    /// The aggregator's reply could not be decoded.
    #[error("invalid aggregator response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value had the wrong shape.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        /// The variable or key name.
        key: String,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A contract address variable did not hold a hex address.
    #[error("{key} does not hold a hex address: {value:?}")]
    InvalidAddress {
        /// The variable name.
        key: String,
        /// The offending value.
        value: String,
    },

    /// A setting required by the selected role is missing.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// Errors from the lifecycle manager.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A component failed to start; components started before it keep running.
    #[error("failed to start component {component} in group {group}: {source}")]
    Start {
        /// Group label the component was registered under.
        group: String,
        /// Component name.
        component: String,
        /// The component's start error.
        #[source]
        source: Error,
    },

    /// One or more components failed to close.
    #[error("{} component(s) failed to close", failures.len())]
    Close {
        /// Every close failure, in registration order.
        failures: Vec<CloseFailure>,
    },
}

/// A single component's close failure.
#[derive(Debug)]
pub struct CloseFailure {
    /// Group label.
    pub group: String,
    /// Component name.
    pub component: String,
    /// The close error.
    pub error: Error,
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// Performer runtime failure.
    #[error(transparent)]
    Performer(#[from] PerformerError),

    /// Relay failure.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Lifecycle failure.
    #[error(transparent)]
    Lifecycle(#[from] Box<LifecycleError>),

    /// I/O failure, typically binding a listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A component was used in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A background task failed.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl From<LifecycleError> for Error {
    fn from(err: LifecycleError) -> Self {
        Self::Lifecycle(Box::new(err))
    }
}
