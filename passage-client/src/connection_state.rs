//! Connection state
//!
//! # Connection States
//!
//! - **Idle**: built, never connected
//! - **Connecting**: a transport is being opened
//! - **Open**: the transport is up; sends go out
//! - **Closing**: `close()` was called, waiting for the transport to finish
//! - **Closed**: the transport is gone, by request or not
//!
//! # State Transitions
//!
//! ```text
//! Idle → Connecting → Open → Closing → Closed
//!            ↑          ↓                 │
//!            │        Closed              │
//!            └────── reconnect ───────────┘
//! ```
//!
//! The session publishes every transition on a `watch` channel, which is
//! what `PassageClient::state` reads.

use std::fmt;

/// Lifecycle state of the client's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected
    Idle,
    /// Opening a transport
    Connecting,
    /// Connected and sending
    Open,
    /// Deliberate close in progress
    Closing,
    /// Not connected
    Closed,
}

impl ConnectionState {
    /// Whether sends can go out
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    /// Numeric code recorded by the connection state gauge
    pub fn as_metric(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::Open => 2,
            Self::Closing => 3,
            Self::Closed => 4,
        }
    }

    /// Lowercase name for logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_open_is_open() {
        assert!(ConnectionState::Open.is_open());
        for state in [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            assert!(!state.is_open(), "{} should not be open", state);
        }
    }

    #[test]
    fn test_metric_codes_are_distinct() {
        let codes: std::collections::HashSet<i64> = [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ]
        .iter()
        .map(|s| s.as_metric())
        .collect();
        assert_eq!(codes.len(), 5);
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
        assert_eq!(ConnectionState::Open.to_string(), "open");
    }
}
