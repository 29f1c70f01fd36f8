//! JSON-RPC 2.0 envelope types used by the RPC transport and the
//! aggregator client.
//!
//! Errors carry a gRPC-style [`RpcStatus`] name in `error.data.status` so
//! callers can branch on the status vocabulary rather than raw codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorClass, PerformerError};

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes.
pub mod codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server-defined: the request outlived its deadline.
    pub const DEADLINE_EXCEEDED: i32 = -32000;
}

/// Request identifier: string or number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

/// A JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be `"2.0"`.
    pub jsonrpc: String,
    /// Request id.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a request with the given id, method and params.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC response carrying either a result or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Id of the request being answered; `null` when it could not be read.
    pub id: Option<RequestId>,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful response.
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Converts the response into a `Result`, treating a missing result as `null`.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Extra data; carries `{"status": "<RPC status>"}` for runtime errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Builds an error from a status and message.
    pub fn with_status(status: RpcStatus, message: impl Into<String>) -> Self {
        Self {
            code: status.jsonrpc_code(),
            message: message.into(),
            data: Some(serde_json::json!({ "status": status })),
        }
    }

    /// Reads the status name back out of `data`, if present.
    pub fn status(&self) -> Option<RpcStatus> {
        self.data
            .as_ref()
            .and_then(|data| data.get("status"))
            .and_then(|status| serde_json::from_value(status.clone()).ok())
    }
}

impl From<&PerformerError> for JsonRpcError {
    fn from(err: &PerformerError) -> Self {
        let status = match err.class() {
            ErrorClass::Client => RpcStatus::InvalidArgument,
            ErrorClass::Server => RpcStatus::Internal,
            ErrorClass::Unimplemented => RpcStatus::Unimplemented,
        };
        Self::with_status(status, err.to_string())
    }
}

/// Status vocabulary of the RPC transport, named after gRPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcStatus {
    /// Envelope could not be parsed.
    InvalidRequest,
    /// The caller supplied a bad argument.
    InvalidArgument,
    /// The server failed.
    Internal,
    /// The method is not implemented.
    Unimplemented,
    /// The request did not finish within the configured timeout.
    DeadlineExceeded,
}

impl RpcStatus {
    /// Maps the status onto a JSON-RPC error code.
    pub fn jsonrpc_code(self) -> i32 {
        match self {
            Self::InvalidRequest => codes::INVALID_REQUEST,
            Self::InvalidArgument => codes::INVALID_PARAMS,
            Self::Internal => codes::INTERNAL_ERROR,
            Self::Unimplemented => codes::METHOD_NOT_FOUND,
            Self::DeadlineExceeded => codes::DEADLINE_EXCEEDED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use serde_json::json;

    #[test]
    fn performer_errors_map_to_statuses() {
        let err = JsonRpcError::from(&PerformerError::Validation(ValidationError::EmptyPayload));
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert_eq!(err.status(), Some(RpcStatus::InvalidArgument));

        let err = JsonRpcError::from(&PerformerError::NotImplemented("health.Watch".into()));
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);
        assert_eq!(err.data, Some(json!({"status": "UNIMPLEMENTED"})));
    }

    #[test]
    fn response_into_result() {
        let ok = JsonRpcResponse::success(Some(1.into()), json!({"a": 1}));
        assert_eq!(ok.into_result().unwrap(), json!({"a": 1}));

        let err = JsonRpcResponse::failure(
            Some("x".into()),
            JsonRpcError::with_status(RpcStatus::Internal, "boom"),
        );
        assert_eq!(err.into_result().unwrap_err().message, "boom");
    }

    #[test]
    fn request_id_accepts_both_shapes() {
        let req: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": "abc", "method": "m"})).unwrap();
        assert_eq!(req.id, RequestId::String("abc".into()));
        let req: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 5, "method": "m"})).unwrap();
        assert_eq!(req.id, RequestId::Number(5));
        assert!(req.params.is_none());
    }
}
