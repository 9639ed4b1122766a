//! Example demonstrating automatic reconnection
//!
//! Start any JSON-RPC 2.0 WebSocket server on ws://127.0.0.1:9004 that
//! answers `ping`, then run:
//! ```bash
//! cargo run --example reconnecting_client
//! ```
//!
//! Stop and restart the server to watch the client reconnect.

use passage::ClientBuilder;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passage_client=debug".into()),
        )
        .init();

    println!("=== Automatic Reconnection Example ===\n");

    // Retry every second, at most 30 times per outage
    let client = ClientBuilder::new("ws://127.0.0.1:9004")
        .with_reconnect(Duration::from_secs(1), 30)
        .with_request_timeout(Duration::from_secs(2))
        .connect()?;

    client.on("rpc.open", |_| println!("connection open"));
    client.on("rpc.close", |_| println!("connection closed"));
    client.on("rpc.error", |error| println!("transport error: {}", error));
    client.on("status", |msg| println!("status update: {}", msg));

    let mut states = client.watch_state();
    let watcher = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            println!("state -> {}", state);
        }
    });

    println!("Try stopping and restarting the server. Press Ctrl+C to exit.\n");

    let mut counter = 1;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(5)) => {}
        }

        match client
            .request::<_, serde_json::Value>("ping", format!("Message {}", counter))
            .await
        {
            Ok(response) => println!("[{}] ok {}", counter, response),
            Err(e) => println!("[{}] error: {}", counter, e),
        }
        counter += 1;
    }

    client.close();
    drop(client);
    watcher.await?;

    Ok(())
}
