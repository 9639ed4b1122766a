//! Client builder
//!
//! The `ClientBuilder` configures a client before its session starts:
//! - request timeout and reconnection through [`ClientOptions`]
//! - the transport through a [`Connector`] (WebSocket by default)
//! - OpenTelemetry observability and the service name it reports
//!
//! # Examples
//!
//! ```rust,no_run
//! use passage_client::{ClientBuilder, ClientOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> passage_core::Result<()> {
//! // Reconnect every 2 seconds, at most 10 times per outage
//! let client = ClientBuilder::new("ws://localhost:8080")
//!     .with_reconnect(Duration::from_secs(2), 10)
//!     .connect()?;
//!
//! // With observability
//! let client2 = ClientBuilder::new("ws://localhost:8080")
//!     .options(ClientOptions::new().with_request_timeout(Duration::from_secs(1)))
//!     .with_default_observability()
//!     .service_name("dashboard")
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

use crate::metrics::ClientMetrics;
use crate::options::ClientOptions;
use crate::session;
use crate::transport::{Connector, WebSocketConnector};
use crate::PassageClient;
use passage_core::{Error, ObservabilityConfig, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a PassageClient
pub struct ClientBuilder {
    uri: String,
    options: ClientOptions,
    connector: Option<Arc<dyn Connector>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a builder for `uri` with default options
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: ClientOptions::default(),
            connector: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Replace all options at once
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the default request deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    /// Enable reconnection with a fixed delay and a per-outage budget
    pub fn with_reconnect(mut self, delay: Duration, tries: u32) -> Self {
        self.options.reconnect = true;
        self.options.reconnect_timeout = delay;
        self.options.reconnect_tries = tries;
        self
    }

    /// Disable reconnection (default)
    pub fn without_reconnect(mut self) -> Self {
        self.options.reconnect = false;
        self
    }

    /// Fail pending requests whenever the connection closes
    pub fn fail_pending_on_close(mut self) -> Self {
        self.options.fail_pending_on_close = true;
        self
    }

    /// Use a custom transport
    pub fn with_connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Start the session without connecting
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<PassageClient> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Transport(format!("No tokio runtime: {}", e)))?;

        let metrics = match self.observability_config {
            Some(mut config) => {
                if let Some(name) = self.service_name {
                    config.service_name = name;
                }

                passage_core::init_observability(config.clone()).map_err(|e| {
                    Error::Transport(format!("Failed to initialize observability: {}", e))
                })?;

                Some(Arc::new(ClientMetrics::new(config.service_name)))
            }
            None => None,
        };

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector));

        tracing::debug!(uri = %self.uri, options = ?self.options, "Client built");
        let handle = session::spawn(&runtime, self.uri, self.options, connector, metrics);
        Ok(PassageClient::from_session(handle))
    }

    /// Start the session and begin connecting
    pub fn connect(self) -> Result<PassageClient> {
        let client = self.build()?;
        client.connect();
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionState;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new("ws://localhost:8080");

        assert_eq!(builder.uri, "ws://localhost:8080");
        assert_eq!(builder.options, ClientOptions::default());
        assert!(builder.connector.is_none());
        assert!(builder.observability_config.is_none());
        assert!(builder.service_name.is_none());
    }

    #[test]
    fn test_builder_with_reconnect() {
        let builder = ClientBuilder::new("ws://localhost:8080")
            .with_reconnect(Duration::from_millis(500), 10);

        assert!(builder.options.reconnect);
        assert_eq!(builder.options.reconnect_timeout, Duration::from_millis(500));
        assert_eq!(builder.options.reconnect_tries, 10);
    }

    #[test]
    fn test_builder_without_reconnect() {
        let builder = ClientBuilder::new("ws://localhost:8080")
            .with_reconnect(Duration::from_secs(1), 3)
            .without_reconnect();
        assert!(!builder.options.reconnect);
    }

    #[test]
    fn test_builder_options() {
        let options = ClientOptions::new()
            .with_request_timeout(Duration::from_millis(600))
            .with_fail_pending_on_close(true);
        let builder = ClientBuilder::new("ws://localhost:8080").options(options.clone());
        assert_eq!(builder.options, options);

        let builder = ClientBuilder::new("ws://localhost:8080")
            .with_request_timeout(Duration::from_millis(600))
            .fail_pending_on_close();
        assert_eq!(builder.options, options);
    }

    #[test]
    fn test_builder_observability_config() {
        let config = ObservabilityConfig::new("test-client")
            .with_endpoint("http://localhost:4317")
            .with_log_level("debug");

        let builder = ClientBuilder::new("ws://localhost:8080")
            .with_observability(config)
            .service_name("my-service");

        let obs_config = builder.observability_config.unwrap();
        assert_eq!(obs_config.service_name, "test-client");
        assert_eq!(obs_config.log_level, "debug");
        assert_eq!(builder.service_name, Some("my-service".to_string()));
    }

    #[test]
    fn test_builder_default_observability() {
        let builder = ClientBuilder::new("ws://localhost:8080").with_default_observability();
        assert_eq!(builder.observability_config.unwrap().service_name, "passage");
    }

    #[test]
    fn test_build_outside_runtime() {
        let result = ClientBuilder::new("ws://localhost:8080").build();
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_build_starts_idle() {
        let client = ClientBuilder::new("ws://localhost:8080").build().unwrap();
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(!client.is_connected());
    }
}
