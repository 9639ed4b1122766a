//! Error types for passage
//!
//! Two error types live here:
//!
//! - **Error**: every failure a caller of the client can observe (uses thiserror)
//! - **JsonRpcErrorData**: the `error` member of a JSON-RPC 2.0 response, as
//!   it appears on the wire
//!
//! # Where Errors Surface
//!
//! Request-scoped failures (`TransportUnavailable`, `Serialization`,
//! `InvalidPayload`, `Remote`, `Timeout`) are delivered exclusively through
//! the callback of the request that caused them. `MalformedFrame` is only
//! ever produced by the codec while decoding inbound frames; the client logs
//! and drops such frames and never hands this variant to a request callback.
//!
//! # Examples
//!
//! ```rust
//! use passage_core::{Error, JsonRpcErrorData};
//!
//! let timeout = Error::Timeout;
//! assert_eq!(timeout.code(), Some(408));
//!
//! let remote = Error::Remote(JsonRpcErrorData::method_not_found("sum"));
//! assert_eq!(remote.code(), Some(-32601));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code attached to [`Error::Timeout`], borrowed from HTTP 408
pub const TIMEOUT_CODE: i64 = 408;

/// Result type for passage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds surfaced by the passage client
///
/// The enum is `Clone` so a single failure (for example a dropped
/// connection) can be fanned out to several pending callbacks.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A send was attempted while no connection was open
    #[error("Transport unavailable")]
    TransportUnavailable,

    /// Parameters or results could not be converted to or from JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A batch entry was rejected before transmission
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The server answered with an error envelope
    ///
    /// Carries the code, message and optional data exactly as received.
    #[error("Remote error: {0}")]
    Remote(#[from] JsonRpcErrorData),

    /// No response arrived before the request deadline
    #[error("Timeout")]
    Timeout,

    /// An inbound frame failed to parse or classify
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The transport or the runtime around it could not be set up
    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Wire-level error code, when the failure has one
    ///
    /// `Timeout` reports 408 and `Remote` reports the server's code; every
    /// other variant is local and has no code.
    pub fn code(&self) -> Option<i64> {
        match self {
            Error::Timeout => Some(TIMEOUT_CODE),
            Error::Remote(data) => Some(data.code),
            _ => None,
        }
    }

    /// Additional error data sent by the server, if any
    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            Error::Remote(data) => data.data.as_ref(),
            _ => None,
        }
    }

    /// Short label used for logs and metric attributes
    pub fn kind(&self) -> &'static str {
        match self {
            Error::TransportUnavailable => "transport_unavailable",
            Error::Serialization(_) => "serialization",
            Error::InvalidPayload(_) => "invalid_payload",
            Error::Remote(_) => "remote",
            Error::Timeout => "timeout",
            Error::MalformedFrame(_) => "malformed_frame",
            Error::Transport(_) => "transport",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// JSON-RPC 2.0 error object
///
/// This is the `error` member of a response envelope:
///
/// ```json
/// {"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "Method not found"}}
/// ```
///
/// `code` and `message` are required; `data` is optional and is omitted
/// from the serialized form when absent. Codes are kept as `i64` because
/// servers in the wild use application codes well outside the reserved
/// `-32768..=-32000` range.
///
/// # Examples
///
/// ```rust
/// use passage_core::JsonRpcErrorData;
/// use serde_json::json;
///
/// let error = JsonRpcErrorData::with_data(500, "an error!", json!({"hmm": "oops"}));
/// assert_eq!(error.to_string(), "[500] an error!");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code
    pub code: i64,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Create a new error with code and message
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new error carrying additional data
    pub fn with_data(code: i64, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Parse error (-32700)
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    /// Invalid request (-32600)
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, msg)
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    /// Invalid params (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, msg)
    }

    /// Internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, msg)
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message", e.g. "[-32601] Method not found: sum"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
