//! JSON-RPC 2.0 client runtime over a persistent duplex transport
//!
//! This crate correlates requests with responses over an asynchronous
//! channel, fails requests nobody answers, dispatches inbound notifications
//! to listeners and reconnects after unexpected closures.
//!
//! # Core Features
//!
//! - **Request-Response**: callbacks or `async` requests, correlated by id
//! - **Timeouts**: every request resolves, with `Timeout` (code 408) if need be
//! - **Notifications**: listeners keyed by method name
//! - **Lifecycle events**: `rpc.open`, `rpc.close`, `rpc.error`, `rpc.message`
//! - **Batches**: several calls in one frame
//! - **Auto-Reconnection**: fixed delay, bounded attempts per outage
//! - **Pluggable transport**: WebSocket by default, anything behind [`Connector`]
//! - **Observability**: `tracing` logs and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use passage_client::{ConnectionState, PassageClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PassageClient::new("ws://localhost:8080")?;
//!     client.wait_for_state(ConnectionState::Open).await?;
//!
//!     client.on("myapp.update", |params| {
//!         println!("update: {}", params);
//!     });
//!
//!     let sum: i64 = client.request("myapp.sum", json!([1, 2])).await?;
//!     println!("sum: {}", sum);
//!
//!     client.send("myapp.sum", json!([3, 4]), |outcome| println!("{:?}", outcome));
//!     client.notify("myapp.ping", json!({}))?;
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! # With Reconnection
//!
//! ```rust,no_run
//! use passage_client::ClientBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> passage_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8080")
//!     .with_reconnect(Duration::from_secs(2), 60)
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod client;
mod client_builder;
mod connection_state;
mod events;
mod metrics;
mod options;
mod reconnect;
mod request;
mod session;
mod transport;

pub use batch::{BatchEntry, BatchRequest};
pub use client::PassageClient;
pub use client_builder::ClientBuilder;
pub use connection_state::ConnectionState;
pub use events::{EventBus, EventListener};
pub use metrics::ClientMetrics;
pub use options::ClientOptions;
pub use reconnect::ReconnectPolicy;
pub use request::{RequestRegistry, Resolved, ResponseCallback};
pub use transport::{Connector, Transport, TransportEvent, TransportEvents, WebSocketConnector};
