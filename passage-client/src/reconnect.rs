//! Reconnection policy
//!
//! After a closure the client did not ask for, the policy decides whether
//! to try again and how long to wait first. The delay is fixed; there is
//! no backoff and no jitter.
//!
//! # Budget
//!
//! `max_tries` bounds the attempts made during one outage. The counter
//! survives failed attempts and only resets when a connection opens, so a
//! server that stays down is retried `max_tries` times and then left alone.
//!
//! # Examples
//!
//! ```rust
//! use passage_client::ReconnectPolicy;
//! use std::time::Duration;
//!
//! let mut policy = ReconnectPolicy::new(true, Duration::from_millis(200), 2);
//!
//! assert_eq!(policy.next_delay(false), Some(Duration::from_millis(200)));
//! assert_eq!(policy.next_delay(false), Some(Duration::from_millis(200)));
//! assert_eq!(policy.next_delay(false), None);
//!
//! policy.reset();
//! assert!(policy.next_delay(false).is_some());
//! ```

use crate::options::ClientOptions;
use std::time::Duration;

/// Decides if and when to reconnect after a closure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    enabled: bool,
    delay: Duration,
    max_tries: u32,
    tries: u32,
}

impl ReconnectPolicy {
    /// Create a policy
    pub fn new(enabled: bool, delay: Duration, max_tries: u32) -> Self {
        Self {
            enabled,
            delay,
            max_tries,
            tries: 0,
        }
    }

    /// Policy matching the reconnect fields of `options`
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(
            options.reconnect,
            options.reconnect_timeout,
            options.reconnect_tries,
        )
    }

    /// Consume one attempt and return the delay before it
    ///
    /// Returns `None` without touching the counter when reconnection is
    /// disabled, the closure was deliberate (`killed`), or the budget for
    /// this outage is spent.
    pub fn next_delay(&mut self, killed: bool) -> Option<Duration> {
        if !self.enabled || killed || self.tries >= self.max_tries {
            return None;
        }

        self.tries += 1;
        Some(self.delay)
    }

    /// Forget past attempts after a successful open
    pub fn reset(&mut self) {
        self.tries = 0;
    }

    /// Attempts consumed in the current outage
    pub fn tries(&self) -> u32 {
        self.tries
    }

    /// Whether reconnection is enabled at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
