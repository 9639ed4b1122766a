//! JSON-RPC 2.0 envelope types
//!
//! An envelope is one JSON-RPC message unit. The client deals with three
//! shapes:
//!
//! 1. **Request**: `{id, method, params?}`, expects exactly one response
//! 2. **Notification**: `{method, params?}` with no id, expects nothing
//! 3. **Response**: `{id, result}` or `{id, error}`
//!
//! Every envelope carries `"jsonrpc": "2.0"`. A physical frame is either one
//! envelope or a JSON array of envelopes (a batch).
//!
//! Outgoing requests always use positive integer ids allocated by the
//! client. Inbound response ids are kept as [`Id`] because a server may echo
//! anything; only numeric ids can correlate with a pending request.

use crate::error::JsonRpcErrorData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol tag carried by every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Identifier the client assigns to outgoing requests
pub type RequestId = u64;

/// Reserved lifecycle event names
///
/// These names share the listener namespace with RPC method names, so an
/// inbound notification can never use one of them.
pub mod lifecycle {
    /// Fires on every successful (re)connection
    pub const OPEN: &str = "rpc.open";
    /// Fires on every closure, before any reconnect decision
    pub const CLOSE: &str = "rpc.close";
    /// Fires on transport-level errors
    pub const ERROR: &str = "rpc.error";
    /// Fires once per raw inbound frame
    pub const MESSAGE: &str = "rpc.message";

    /// All reserved names
    pub const ALL: [&str; 4] = [OPEN, CLOSE, ERROR, MESSAGE];

    /// Check whether `name` is a reserved lifecycle name
    pub fn is_reserved(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Response identifier as received from the server
///
/// Serialized untagged, so it reads and writes as the bare JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// Numeric identifier, the only kind this client produces
    Number(i64),
    /// String identifier
    String(String),
    /// Explicit null
    Null,
}

impl Id {
    /// The request id this response correlates with, if any
    ///
    /// Non-positive numbers, strings and null never match an outgoing
    /// request.
    pub fn as_request_id(&self) -> Option<RequestId> {
        match self {
            Id::Number(n) if *n > 0 => Some(*n as RequestId),
            _ => None,
        }
    }

    /// Build an id from an arbitrary JSON value
    ///
    /// Returns `None` for shapes that are not valid identifiers (objects,
    /// arrays, booleans, fractional numbers).
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Id::Null),
            serde_json::Value::String(s) => Some(Id::String(s.clone())),
            serde_json::Value::Number(n) => n.as_i64().map(Id::Number),
            _ => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{}", n),
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<RequestId> for Id {
    fn from(id: RequestId) -> Self {
        Id::Number(id as i64)
    }
}

/// Outgoing request envelope
///
/// # Examples
///
/// ```rust
/// use passage_core::JsonRpcRequest;
/// use serde_json::json;
///
/// let req = JsonRpcRequest::new("myapp.sum", Some(json!([1, 2])), 1);
/// assert_eq!(req.jsonrpc, "2.0");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Remote method to invoke
    pub method: String,
    /// Omitted from the wire when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Correlates the eventual response
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Create a request envelope
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// Notification envelope, in either direction
///
/// Outgoing notifications are fire-and-forget calls; inbound ones are
/// server events dispatched to listeners by method name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method or event name
    pub method: String,
    /// Omitted from the wire when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    /// Create a notification envelope
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Inbound response envelope
///
/// Exactly one of `result` and `error` is set. A `"result": null` on the
/// wire is kept as `Some(Value::Null)` so a null result still counts as a
/// successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorData>,
    /// Echo of the request id
    pub id: Id,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(result: serde_json::Value, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(error: JsonRpcErrorData, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Check if the response carries a result
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Check if the response carries an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Convert into the outcome handed to the request callback
    pub fn into_outcome(self) -> std::result::Result<serde_json::Value, JsonRpcErrorData> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// One classified inbound envelope
///
/// Produced by [`crate::codec::decode`]. `Invalid` keeps the offending value
/// so it can be logged; it is never dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Server event, dispatched to listeners by method name
    Notification(JsonRpcNotification),
    /// Answer to an earlier request
    Response(JsonRpcResponse),
    /// Anything else
    Invalid(serde_json::Value),
}

impl Inbound {
    /// Returns true for `Notification`
    pub fn is_notification(&self) -> bool {
        matches!(self, Inbound::Notification(_))
    }

    /// Returns true for `Response`
    pub fn is_response(&self) -> bool {
        matches!(self, Inbound::Response(_))
    }

    /// Returns true for `Invalid`
    pub fn is_invalid(&self) -> bool {
        matches!(self, Inbound::Invalid(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new("test", None, 1);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "method": "test", "id": 1}));
    }

    #[test]
    fn test_notification_has_no_id() {
        let notif = JsonRpcNotification::new("notify", Some(json!({"some": "data"})));
        let json = serde_json::to_string(&notif).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_id_correlation() {
        assert_eq!(Id::Number(7).as_request_id(), Some(7));
        assert_eq!(Id::Number(0).as_request_id(), None);
        assert_eq!(Id::Number(-3).as_request_id(), None);
        assert_eq!(Id::String("7".into()).as_request_id(), None);
        assert_eq!(Id::Null.as_request_id(), None);
    }

    #[test]
    fn test_id_from_value() {
        assert_eq!(Id::from_value(&json!(3)), Some(Id::Number(3)));
        assert_eq!(Id::from_value(&json!("a")), Some(Id::String("a".into())));
        assert_eq!(Id::from_value(&json!(null)), Some(Id::Null));
        assert_eq!(Id::from_value(&json!(1.5)), None);
        assert_eq!(Id::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn test_response_outcome() {
        let ok = JsonRpcResponse::success(json!({"status": "ok"}), Id::Number(1));
        assert!(ok.is_success());
        assert_eq!(ok.into_outcome().unwrap(), json!({"status": "ok"}));

        let err = JsonRpcResponse::error(JsonRpcErrorData::internal_error("boom"), Id::Number(1));
        assert!(err.is_error());
        assert_eq!(err.into_outcome().unwrap_err().code, -32603);
    }

    #[test]
    fn test_lifecycle_names_reserved() {
        for name in lifecycle::ALL {
            assert!(lifecycle::is_reserved(name));
        }
        assert!(!lifecycle::is_reserved("rpc.subscribe"));
        assert!(!lifecycle::is_reserved("myapp.notify"));
    }
}
