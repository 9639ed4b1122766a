//! Batch building
//!
//! A batch is a list of calls sent together in one frame. Each call is a
//! [`BatchEntry`]: a method, its parameters and, when the caller wants a
//! response, a callback. Entries without a callback go out as
//! notifications.
//!
//! # Validation
//!
//! `PassageClient::send_all` checks every entry before anything is sent:
//!
//! - an invalid method name resolves the entry's callback with
//!   `InvalidPayload`
//! - parameters that could not be serialized resolve it with
//!   `Serialization`
//!
//! Both happen synchronously, inside `send_all`, and the entry is left out.
//! The remaining entries still go out: as a JSON array when more than one
//! is left, as a bare envelope when one is left, not at all when none is.
//!
//! # Examples
//!
//! ```rust,no_run
//! use passage_client::{BatchRequest, PassageClient};
//! use serde_json::json;
//!
//! # fn example(client: &PassageClient) {
//! let mut batch = BatchRequest::new();
//! batch.add_request("myapp.sum", json!([1, 2]), |outcome| println!("sum: {:?}", outcome));
//! batch.add_notification("myapp.ping", json!({}));
//!
//! client.send_all(batch);
//! # }
//! ```

use crate::request::ResponseCallback;
use passage_core::{codec, Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Serialize call parameters
///
/// Parameters that serialize to `null` are treated as absent, so the
/// envelope carries no `params` member.
pub(crate) fn encode_params<P: Serialize + ?Sized>(params: &P) -> Result<Option<Value>> {
    codec::encode_params(params).map(|value| (!value.is_null()).then_some(value))
}

/// One call in a batch
///
/// Params are serialized when the entry is built; `null` params are left
/// out of the envelope.
pub struct BatchEntry {
    method: String,
    params: Result<Option<Value>>,
    callback: Option<ResponseCallback>,
}

impl BatchEntry {
    /// A call that expects a response
    pub fn request<P, F>(method: impl Into<String>, params: P, callback: F) -> Self
    where
        P: Serialize,
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        Self {
            method: method.into(),
            params: encode_params(&params),
            callback: Some(Box::new(callback)),
        }
    }

    /// A call that expects no response
    pub fn notification<P: Serialize>(method: impl Into<String>, params: P) -> Self {
        Self {
            method: method.into(),
            params: encode_params(&params),
            callback: None,
        }
    }

    /// Method name of the call
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Whether the entry carries a callback
    pub fn expects_response(&self) -> bool {
        self.callback.is_some()
    }

    /// Check the entry, resolving its callback if it cannot be sent
    ///
    /// Returns the call when it can go out.
    pub(crate) fn validate(self) -> Option<OutgoingCall> {
        let failure = if !codec::is_valid_method(&self.method) {
            Error::InvalidPayload(format!("invalid method name {:?}", self.method))
        } else {
            match self.params {
                Ok(params) => {
                    return Some(OutgoingCall {
                        method: self.method,
                        params,
                        callback: self.callback,
                    })
                }
                Err(e) => e,
            }
        };

        tracing::warn!(method = %self.method, error = %failure, "Batch entry rejected");
        if let Some(callback) = self.callback {
            callback(Err(failure));
        }
        None
    }
}

impl fmt::Debug for BatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchEntry")
            .field("method", &self.method)
            .field("params", &self.params)
            .field("expects_response", &self.expects_response())
            .finish()
    }
}

/// A validated call on its way to the session
pub(crate) struct OutgoingCall {
    pub(crate) method: String,
    pub(crate) params: Option<Value>,
    pub(crate) callback: Option<ResponseCallback>,
}

/// Builder for a list of batch entries
#[derive(Debug, Default)]
pub struct BatchRequest {
    entries: Vec<BatchEntry>,
}

impl BatchRequest {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a call that expects a response
    pub fn add_request<P, F>(&mut self, method: impl Into<String>, params: P, callback: F) -> &mut Self
    where
        P: Serialize,
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        self.push(BatchEntry::request(method, params, callback))
    }

    /// Add a call that expects no response
    pub fn add_notification<P: Serialize>(&mut self, method: impl Into<String>, params: P) -> &mut Self {
        self.push(BatchEntry::notification(method, params))
    }

    /// Add a prepared entry
    pub fn push(&mut self, entry: BatchEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for BatchRequest {
    type Item = BatchEntry;
    type IntoIter = std::vec::IntoIter<BatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<BatchEntry> for BatchRequest {
    fn from_iter<I: IntoIterator<Item = BatchEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
