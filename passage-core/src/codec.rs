//! Codec for outgoing calls and inbound frames
//!
//! # Encoding
//!
//! Outgoing calls become either a request (when the caller wants a
//! response, so an id is attached) or a notification. Several envelopes can
//! be joined into one frame with [`encode_frame`]: a single envelope goes
//! out bare, more than one goes out as a JSON array.
//!
//! # Decoding
//!
//! [`decode`] parses a frame and classifies each envelope. A non-array
//! payload is treated as a batch of one. Classification, in order:
//!
//! 1. not an object, or `jsonrpc` is not `"2.0"` → `Invalid`
//! 2. `method` present → `Notification` (any id is ignored)
//! 3. `id` present and exactly one of `result` / `error` → `Response`
//! 4. anything else → `Invalid`
//!
//! Only a frame that is not JSON at all fails as a whole
//! ([`Error::MalformedFrame`]); individual bad envelopes come back as
//! [`Inbound::Invalid`] so the rest of a batch is still handled.
//!
//! # Examples
//!
//! ```rust
//! use passage_core::{codec, Inbound};
//! use serde_json::json;
//!
//! let request = codec::encode("myapp.sum", Some(&json!([1, 2])), Some(1)).unwrap();
//! assert_eq!(request, json!({"jsonrpc": "2.0", "method": "myapp.sum", "params": [1, 2], "id": 1}));
//!
//! let inbound = codec::decode(r#"{"jsonrpc":"2.0","id":1,"result":3}"#).unwrap();
//! assert!(matches!(inbound[0], Inbound::Response(_)));
//! ```

use crate::error::{Error, JsonRpcErrorData, Result};
use crate::types::{
    lifecycle, Id, Inbound, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    JSONRPC_VERSION,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Convert call parameters to a JSON value
///
/// Fails with [`Error::Serialization`] when the value has no JSON
/// representation (for example a map with non-string keys).
pub fn encode_params<P: Serialize + ?Sized>(params: &P) -> Result<Value> {
    serde_json::to_value(params).map_err(|e| Error::Serialization(e.to_string()))
}

/// Build an envelope for an outgoing call
///
/// An id is attached only when the caller wants a response; without one
/// the envelope is a notification.
pub fn encode<P: Serialize + ?Sized>(
    method: &str,
    params: Option<&P>,
    id: Option<RequestId>,
) -> Result<Value> {
    let params = params.map(encode_params).transpose()?;
    encode_envelope(method, params, id)
}

/// Build an envelope from already-encoded parameters
pub fn encode_envelope(method: &str, params: Option<Value>, id: Option<RequestId>) -> Result<Value> {
    match id {
        Some(id) => encode_params(&JsonRpcRequest::new(method, params, id)),
        None => encode_params(&JsonRpcNotification::new(method, params)),
    }
}

/// Join envelopes into one text frame
///
/// Returns `None` for an empty slice, the bare envelope for one item and a
/// JSON array otherwise.
pub fn encode_frame(envelopes: &[Value]) -> Result<Option<String>> {
    let text = match envelopes {
        [] => return Ok(None),
        [single] => serde_json::to_string(single),
        many => serde_json::to_string(many),
    };
    text.map(Some).map_err(|e| Error::Serialization(e.to_string()))
}

/// Parse and classify an inbound frame
///
/// Envelopes come back in array order.
pub fn decode(raw: &str) -> Result<Vec<Inbound>> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| Error::MalformedFrame(e.to_string()))?;

    Ok(match value {
        Value::Array(items) => items.into_iter().map(classify).collect(),
        single => vec![classify(single)],
    })
}

/// Classify a single envelope
pub fn classify(value: Value) -> Inbound {
    let object = match value {
        Value::Object(object) => object,
        other => return Inbound::Invalid(other),
    };

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Inbound::Invalid(Value::Object(object));
    }

    if object.contains_key("method") {
        return classify_notification(object);
    }

    let has_result = object.contains_key("result");
    let has_error = object.contains_key("error");
    if !object.contains_key("id") || has_result == has_error {
        return Inbound::Invalid(Value::Object(object));
    }

    classify_response(object)
}

fn classify_notification(mut object: Map<String, Value>) -> Inbound {
    let method = match object.get("method") {
        Some(Value::String(method)) => method.clone(),
        _ => return Inbound::Invalid(Value::Object(object)),
    };
    let params = object.remove("params");

    Inbound::Notification(JsonRpcNotification::new(method, params))
}

fn classify_response(mut object: Map<String, Value>) -> Inbound {
    let id = match object.get("id").and_then(Id::from_value) {
        Some(id) => id,
        None => return Inbound::Invalid(Value::Object(object)),
    };

    if let Some(result) = object.remove("result") {
        return Inbound::Response(JsonRpcResponse::success(result, id));
    }

    let error = object.remove("error").unwrap_or(Value::Null);
    match serde_json::from_value::<JsonRpcErrorData>(error.clone()) {
        Ok(error) => Inbound::Response(JsonRpcResponse::error(error, id)),
        Err(_) => {
            object.insert("error".to_string(), error);
            Inbound::Invalid(Value::Object(object))
        }
    }
}

/// Check whether `name` can be used as an outgoing method name
///
/// A valid name is non-empty, contains no whitespace or control characters
/// and is not a reserved lifecycle event name.
pub fn is_valid_method(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| c.is_whitespace() || c.is_control())
        && !lifecycle::is_reserved(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_encode_notification_without_id() {
        let envelope = encode("myapp.notify", Some(&json!({"some": "data"})), None).unwrap();
        assert_eq!(
            envelope,
            json!({"jsonrpc": "2.0", "method": "myapp.notify", "params": {"some": "data"}})
        );
    }

    #[test]
    fn test_encode_request_omits_absent_params() {
        let envelope = encode::<Value>("myapp.notify", None, Some(1)).unwrap();
        assert_eq!(envelope, json!({"jsonrpc": "2.0", "method": "myapp.notify", "id": 1}));
    }

    #[test]
    fn test_encode_unrepresentable_params() {
        let mut params = HashMap::new();
        params.insert((1, 2), "tuple keys are not JSON");

        let result = encode("myapp.notify", Some(&params), Some(1));
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_encode_frame_shapes() {
        assert_eq!(encode_frame(&[]).unwrap(), None);

        let one = encode_envelope("a", None, None).unwrap();
        let bare = encode_frame(std::slice::from_ref(&one)).unwrap().unwrap();
        assert!(bare.starts_with('{'));

        let two = encode_envelope("b", None, Some(1)).unwrap();
        let batch = encode_frame(&[one, two]).unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&batch).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_decode_single_envelope_is_batch_of_one() {
        let inbound = decode(r#"{"jsonrpc":"2.0","method":"event","params":{"a":1}}"#).unwrap();
        assert_eq!(inbound.len(), 1);
        match &inbound[0] {
            Inbound::Notification(n) => {
                assert_eq!(n.method, "event");
                assert_eq!(n.params, Some(json!({"a": 1})));
            }
            other => panic!("Expected notification, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_not_json() {
        assert!(matches!(decode("some text"), Err(Error::MalformedFrame(_))));
        assert!(matches!(decode(""), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_classify_requires_protocol_tag() {
        assert!(classify(json!({"method": "event"})).is_invalid());
        assert!(classify(json!({"jsonrpc": "1.0", "method": "event"})).is_invalid());
        assert!(classify(json!({"jsonrpc": 2.0, "method": "event"})).is_invalid());
        assert!(classify(json!("2.0")).is_invalid());
        assert!(classify(json!(42)).is_invalid());
    }

    #[test]
    fn test_classify_method_wins_over_id() {
        let inbound = classify(json!({"jsonrpc": "2.0", "method": "event", "id": 5, "result": 1}));
        assert!(inbound.is_notification());
    }

    #[test]
    fn test_classify_non_string_method() {
        assert!(classify(json!({"jsonrpc": "2.0", "method": 12})).is_invalid());
    }

    #[test]
    fn test_classify_response_shapes() {
        assert!(classify(json!({"jsonrpc": "2.0", "id": 1, "result": 3})).is_response());
        assert!(classify(json!({"jsonrpc": "2.0", "id": 1, "result": null})).is_response());
        assert!(classify(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 500, "message": "an error!"}
        }))
        .is_response());

        // No id, both members, neither member
        assert!(classify(json!({"jsonrpc": "2.0", "result": 3})).is_invalid());
        assert!(classify(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": 3,
            "error": {"code": 1, "message": "x"}
        }))
        .is_invalid());
        assert!(classify(json!({"jsonrpc": "2.0", "id": 1})).is_invalid());
    }

    #[test]
    fn test_classify_malformed_error_member() {
        assert!(classify(json!({"jsonrpc": "2.0", "id": 1, "error": "boom"})).is_invalid());
        assert!(classify(json!({"jsonrpc": "2.0", "id": 1, "error": {"code": 1}})).is_invalid());
    }

    #[test]
    fn test_null_result_is_kept() {
        match classify(json!({"jsonrpc": "2.0", "id": 1, "result": null})) {
            Inbound::Response(response) => {
                assert_eq!(response.result, Some(Value::Null));
                assert_eq!(response.into_outcome().unwrap(), Value::Null);
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_mixed_batch_keeps_order() {
        let raw = r#"[
            {"jsonrpc":"2.0","method":"first"},
            {"garbage":true},
            {"jsonrpc":"2.0","id":2,"result":42},
            {"jsonrpc":"2.0","method":"second"}
        ]"#;

        let inbound = decode(raw).unwrap();
        assert_eq!(inbound.len(), 4);
        assert!(inbound[0].is_notification());
        assert!(inbound[1].is_invalid());
        assert!(inbound[2].is_response());
        assert!(inbound[3].is_notification());
    }

    #[test]
    fn test_decode_empty_batch() {
        assert!(decode("[]").unwrap().is_empty());
    }

    #[test]
    fn test_valid_method_names() {
        assert!(is_valid_method("myapp.notify"));
        assert!(is_valid_method("rpc.subscribe"));
        assert!(!is_valid_method(""));
        assert!(!is_valid_method("has space"));
        assert!(!is_valid_method("line\nbreak"));
        assert!(!is_valid_method("rpc.open"));
        assert!(!is_valid_method("rpc.message"));
    }
}
