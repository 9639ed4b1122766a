//! Client options
//!
//! | Option                  | Default | Meaning                                         |
//! |-------------------------|---------|-------------------------------------------------|
//! | `request_timeout`       | 6000 ms | Deadline for requests sent without an explicit timeout |
//! | `reconnect`             | false   | Reconnect after an unexpected closure           |
//! | `reconnect_timeout`     | 2000 ms | Fixed delay before each reconnect attempt       |
//! | `reconnect_tries`       | 60      | Reconnect attempts per outage                   |
//! | `fail_pending_on_close` | false   | Fail outstanding requests when the connection closes |
//!
//! Options coming from loosely typed sources (a JSON settings blob, a
//! browser-style options object) go through [`ClientOptions::from_json`],
//! which keeps the default for any numeric field that is not a number.

use serde_json::Value;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 6000;
const DEFAULT_RECONNECT_TIMEOUT_MS: u64 = 2000;
const DEFAULT_RECONNECT_TRIES: u32 = 60;

/// Typed client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Deadline applied to requests that do not pass their own
    pub request_timeout: Duration,
    /// Whether to reconnect after a closure the client did not ask for
    pub reconnect: bool,
    /// Delay before each reconnect attempt
    pub reconnect_timeout: Duration,
    /// Maximum reconnect attempts between two successful opens
    pub reconnect_tries: u32,
    /// Fail every outstanding request with `TransportUnavailable` on closure
    ///
    /// Off by default: pending requests then only fail through their own
    /// deadlines, and a response that arrives after a reconnect still
    /// resolves them.
    pub fail_pending_on_close: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            reconnect: false,
            reconnect_timeout: Duration::from_millis(DEFAULT_RECONNECT_TIMEOUT_MS),
            reconnect_tries: DEFAULT_RECONNECT_TRIES,
            fail_pending_on_close: false,
        }
    }
}

impl ClientOptions {
    /// Options with every field at its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default request deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable automatic reconnection
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the delay before each reconnect attempt
    pub fn with_reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    /// Set the reconnect attempt budget per outage
    pub fn with_reconnect_tries(mut self, tries: u32) -> Self {
        self.reconnect_tries = tries;
        self
    }

    /// Fail outstanding requests whenever the connection closes
    pub fn with_fail_pending_on_close(mut self, fail: bool) -> Self {
        self.fail_pending_on_close = fail;
        self
    }

    /// Build options from a loosely typed JSON object
    ///
    /// Recognised keys are `requestTimeout`, `reconnect`,
    /// `reconnectTimeout`, `reconnectTries` and `failPendingOnClose`.
    /// Numeric keys that are not non-negative numbers keep their default;
    /// boolean keys follow JavaScript truthiness. Anything that is not an
    /// object yields the defaults.
    ///
    /// ```rust
    /// use passage_client::ClientOptions;
    /// use serde_json::json;
    ///
    /// let options = ClientOptions::from_json(&json!({"requestTimeout": "1", "reconnect": true}));
    /// assert_eq!(options.request_timeout.as_millis(), 6000);
    /// assert!(options.reconnect);
    /// ```
    pub fn from_json(value: &Value) -> Self {
        let defaults = Self::default();
        let field = |key: &str| value.get(key);

        Self {
            request_timeout: field("requestTimeout")
                .and_then(millis)
                .unwrap_or(defaults.request_timeout),
            reconnect: field("reconnect").map(truthy).unwrap_or(defaults.reconnect),
            reconnect_timeout: field("reconnectTimeout")
                .and_then(millis)
                .unwrap_or(defaults.reconnect_timeout),
            reconnect_tries: field("reconnectTries")
                .and_then(count)
                .unwrap_or(defaults.reconnect_tries),
            fail_pending_on_close: field("failPendingOnClose")
                .map(truthy)
                .unwrap_or(defaults.fail_pending_on_close),
        }
    }
}

fn non_negative(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite() && *n >= 0.0)
}

fn millis(value: &Value) -> Option<Duration> {
    non_negative(value).map(|ms| Duration::from_millis(ms as u64))
}

fn count(value: &Value) -> Option<u32> {
    non_negative(value).map(|n| n.min(u32::MAX as f64) as u32)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
