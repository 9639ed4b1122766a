//! Client metrics definitions
//!
//! OpenTelemetry instruments describing connection health and request
//! traffic. They are recorded by the session task and exported by whatever
//! meter provider is installed globally, normally the one set up by
//! `ClientBuilder::with_observability`.
//!
//! # Metrics Collected
//!
//! - **passage.client.connection.state**: current connection state (gauge)
//! - **passage.client.requests.total**: requests sent (counter)
//! - **passage.client.request.duration**: time until resolution (histogram)
//! - **passage.client.errors.total**: failures by kind (counter)
//! - **passage.client.reconnection.attempts**: reconnects scheduled (counter)
//! - **passage.client.reconnection.success**: reconnects that opened (counter)
//! - **passage.client.batch.size**: envelopes per batch frame (histogram)
//! - **passage.client.notifications.received**: notifications dispatched (counter)
//! - **passage.client.frames.dropped**: inbound frames or envelopes dropped (counter)

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    InstrumentationScope, KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state, see [`ConnectionState::as_metric`]
    pub connection_state: Gauge<i64>,
    /// Total number of requests sent
    pub requests_total: Counter<u64>,
    /// Seconds between sending a request and resolving it
    pub request_duration: Histogram<f64>,
    /// Total number of errors
    pub errors_total: Counter<u64>,
    /// Total number of reconnection attempts
    pub reconnection_attempts: Counter<u64>,
    /// Total number of successful reconnections
    pub reconnection_success: Counter<u64>,
    /// Envelopes per batch frame
    pub batch_size: Histogram<u64>,
    /// Total number of notifications received
    pub notifications_received: Counter<u64>,
    /// Total number of dropped inbound frames and envelopes
    pub frames_dropped: Counter<u64>,
}

impl ClientMetrics {
    /// Create instruments on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into())
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        Self::new_with_meter(&global::meter_with_scope(scope))
    }

    /// Create instruments on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("passage.client.connection.state")
                .with_description(
                    "Connection state (0=idle, 1=connecting, 2=open, 3=closing, 4=closed)",
                )
                .build(),
            requests_total: meter
                .u64_counter("passage.client.requests.total")
                .with_description("Total number of requests sent")
                .build(),
            request_duration: meter
                .f64_histogram("passage.client.request.duration")
                .with_description("Request duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("passage.client.errors.total")
                .with_description("Total number of errors by kind")
                .build(),
            reconnection_attempts: meter
                .u64_counter("passage.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("passage.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            batch_size: meter
                .u64_histogram("passage.client.batch.size")
                .with_description("Number of envelopes in batch frames")
                .build(),
            notifications_received: meter
                .u64_counter("passage.client.notifications.received")
                .with_description("Total number of notifications received")
                .build(),
            frames_dropped: meter
                .u64_counter("passage.client.frames.dropped")
                .with_description("Total number of inbound frames or envelopes dropped")
                .build(),
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_metric(), &[]);
    }

    /// Record a request leaving the client
    pub fn record_request_sent(&self, method: &str) {
        self.requests_total
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    /// Record how a request resolved
    pub fn record_request_resolved(&self, method: &str, status: &'static str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status),
        ];
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record an error
    pub fn record_error(&self, kind: &'static str) {
        self.errors_total.add(1, &[KeyValue::new("error_type", kind)]);
    }

    /// Record a reconnection attempt
    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    /// Record a successful reconnection
    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    /// Record a batch frame
    pub fn record_batch(&self, size: u64) {
        self.batch_size.record(size, &[]);
    }

    /// Record a dispatched notification
    pub fn record_notification(&self, method: &str) {
        self.notifications_received
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    /// Record a dropped frame or envelope
    pub fn record_dropped_frame(&self, reason: &'static str) {
        self.frames_dropped.add(1, &[KeyValue::new("reason", reason)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ClientMetrics::new("test-client");

        // No provider is installed, so every instrument is a no-op
        metrics.update_connection_state(ConnectionState::Open);
        metrics.record_request_sent("myapp.sum");
        metrics.record_request_resolved("myapp.sum", "success", 0.05);
        metrics.record_error("timeout");
        metrics.record_reconnection_attempt();
        metrics.record_reconnection_success();
        metrics.record_batch(5);
        metrics.record_notification("myapp.update");
        metrics.record_dropped_frame("malformed");
    }

    #[test]
    fn test_connection_state_metrics() {
        let metrics = ClientMetrics::new("test-client-state");

        for state in [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            metrics.update_connection_state(state);
        }
    }

    #[test]
    fn test_with_custom_meter() {
        let meter = global::meter("passage-test");
        let metrics = ClientMetrics::new_with_meter(&meter);

        metrics.record_request_resolved("myapp.sum", "timeout", 6.0);
        metrics.record_error("remote");
    }
}
