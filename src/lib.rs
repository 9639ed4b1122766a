//! Passage - JSON-RPC 2.0 client runtime
//!
//! This is the convenience crate that re-exports the passage sub-crates.
//! Use it if you want a single dependency for the client and its wire types.
//!
//! # Architecture
//!
//! - **passage-core**: envelope types, codec, error taxonomy, observability
//! - **passage-client**: the client runtime (correlation, timeouts,
//!   notifications, reconnection, WebSocket transport)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use passage::{ConnectionState, PassageClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PassageClient::new("ws://localhost:8080")?;
//!     client.wait_for_state(ConnectionState::Open).await?;
//!
//!     let result: serde_json::Value = client
//!         .request("myapp.sum", serde_json::json!([5, 3]))
//!         .await?;
//!     println!("Result: {}", result);
//!
//!     Ok(())
//! }
//! ```

pub use passage_client as client;
pub use passage_core as core;

pub use passage_client::{BatchEntry, BatchRequest, ClientBuilder, ClientOptions, ConnectionState, PassageClient};
pub use passage_core::{Error, Result};
