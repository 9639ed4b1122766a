//! Simple JSON-RPC client example
//!
//! Expects a JSON-RPC 2.0 server on ws://127.0.0.1:8080 that answers
//! `add`, `echo` and accepts a `log` notification.

use passage::{BatchRequest, ConnectionState, PassageClient};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct AddParams {
    a: i32,
    b: i32,
}

#[derive(Deserialize)]
struct AddResult {
    sum: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passage_client=info".into()),
        )
        .init();

    println!("Connecting to JSON-RPC server at ws://127.0.0.1:8080");

    let client = PassageClient::new("ws://127.0.0.1:8080")?;
    client.wait_for_state(ConnectionState::Open).await?;

    println!("Connected! Sending requests...\n");

    client.on("server.status", |params| {
        println!("status notification: {}", params);
    });

    let add_result: AddResult = client.request("add", AddParams { a: 5, b: 3 }).await?;
    println!("add(5, 3) = {}", add_result.sum);

    let echo_result: serde_json::Value = client
        .request("echo", serde_json::json!({"test": "data", "number": 42}))
        .await?;
    println!("echo({{...}}) = {}", echo_result);

    // Callback style
    client.send("add", AddParams { a: 1, b: 2 }, |outcome| match outcome {
        Ok(value) => println!("callback add(1, 2) = {}", value),
        Err(e) => println!("callback error: {}", e),
    });

    // Batch: two requests and a notification in one frame
    let mut batch = BatchRequest::new();
    batch
        .add_request("add", AddParams { a: 10, b: 20 }, |outcome| {
            println!("batch add(10, 20) -> {:?}", outcome)
        })
        .add_request("echo", "hello", |outcome| println!("batch echo -> {:?}", outcome))
        .add_notification("log", serde_json::json!({"message": "batch sent"}));
    client.send_all(batch);

    println!("\nSending notification...");
    client.notify(
        "log",
        serde_json::json!({"level": "info", "message": "Test log"}),
    )?;

    // Give callbacks a moment to run
    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

    client.close();
    client.wait_for_state(ConnectionState::Closed).await?;
    println!("\nClosed");

    Ok(())
}
