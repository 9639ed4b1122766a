//! Core JSON-RPC 2.0 types and codec for passage
//!
//! This crate holds everything in the passage client that does not need a
//! runtime:
//!
//! - **Types**: request, notification and response envelopes
//! - **Codec**: encoding of outgoing calls, decoding and classification of
//!   inbound frames
//! - **Error handling**: the failure taxonomy surfaced to request callbacks
//! - **Observability**: `tracing` and OpenTelemetry bootstrap
//!
//! # Example
//!
//! ```rust
//! use passage_core::{codec, Inbound};
//! use serde_json::json;
//!
//! let envelope = codec::encode("myapp.notify", Some(&json!({"some": "data"})), None).unwrap();
//! let frame = codec::encode_frame(&[envelope]).unwrap().unwrap();
//!
//! let decoded = codec::decode(&frame).unwrap();
//! assert!(matches!(&decoded[0], Inbound::Notification(n) if n.method == "myapp.notify"));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, JsonRpcErrorData, Result, TIMEOUT_CODE};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    lifecycle, Id, Inbound, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    JSONRPC_VERSION,
};
