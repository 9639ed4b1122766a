//! Common test utilities for passage-client integration tests
//!
//! Two ways to stand in for a server:
//!
//! - [`MockConnector`]: an in-memory transport. Tests decide exactly when a
//!   connection opens, what arrives on it and when it drops, and can read
//!   back every frame the client wrote.
//! - [`MockWsServer`]: a real WebSocket server on loopback, for end-to-end
//!   checks through the default connector.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use passage_client::{
    ClientBuilder, ClientOptions, ConnectionState, Connector, EventListener, PassageClient,
    Transport, TransportEvents,
};
use passage_core::{Error, Result};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Upper bound for every wait in the tests
pub const WAIT: Duration = Duration::from_secs(3);

/// Poll `condition` until it holds, panicking after [`WAIT`]
pub async fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for {}", description);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait for the client to reach `state`
pub async fn wait_for_state(client: &PassageClient, state: ConnectionState) {
    tokio::time::timeout(WAIT, client.wait_for_state(state))
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for state {}", state))
        .unwrap();
}

/// Give the session time to work through everything already queued
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Shared log of everything a listener or callback saw
#[derive(Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listener that records each payload
    pub fn listener(&self) -> EventListener {
        let entries = Arc::clone(&self.entries);
        EventListener::new(move |payload| entries.lock().unwrap().push(payload.clone()))
    }

    pub fn push(&self, value: Value) {
        self.entries.lock().unwrap().push(value);
    }

    pub fn entries(&self) -> Vec<Value> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Shared log of request outcomes
#[derive(Clone, Default)]
pub struct Outcomes {
    entries: Arc<Mutex<Vec<Result<Value>>>>,
}

impl Outcomes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that records the outcome it receives
    pub fn callback(&self) -> impl FnOnce(Result<Value>) + Send + 'static {
        let entries = Arc::clone(&self.entries);
        move |outcome| entries.lock().unwrap().push(outcome)
    }

    pub fn entries(&self) -> Vec<Result<Value>> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// One connection opened through a [`MockConnector`]
#[derive(Clone)]
pub struct MockConnection {
    pub uri: String,
    events: TransportEvents,
    frames: Arc<Mutex<Vec<String>>>,
    close_requested: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    fail_sends: Arc<AtomicBool>,
    ack_close: bool,
}

impl MockConnection {
    /// Report the connection as usable
    pub fn open(&self) {
        self.events.opened();
    }

    /// Deliver an inbound frame
    pub fn message(&self, text: impl Into<String>) {
        self.events.message(text);
    }

    /// Deliver an inbound JSON frame
    pub fn message_json(&self, value: Value) {
        self.events.message(value.to_string());
    }

    /// Report a transport error
    pub fn error(&self, text: &str) {
        self.events.error(text);
    }

    /// Close the connection from the server side
    pub fn drop_connection(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.events.closed();
        }
    }

    /// Make every further send fail
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Every frame the client wrote, in order
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    /// Every frame the client wrote, parsed
    pub fn frames_json(&self) -> Vec<Value> {
        self.frames()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    /// Whether the client asked for this connection to close
    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }
}

struct MockTransport {
    connection: MockConnection,
}

impl Transport for MockTransport {
    fn send(&mut self, frame: String) -> Result<()> {
        if self.connection.fail_sends.load(Ordering::SeqCst)
            || self.connection.closed.load(Ordering::SeqCst)
        {
            return Err(Error::TransportUnavailable);
        }
        self.connection.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&mut self) {
        self.connection.close_requested.store(true, Ordering::SeqCst);
        if self.connection.ack_close {
            self.connection.drop_connection();
        }
    }
}

/// In-memory connector
#[derive(Clone)]
pub struct MockConnector {
    auto_open: bool,
    ack_close: bool,
    connections: Arc<Mutex<Vec<MockConnection>>>,
}

impl MockConnector {
    /// Connector whose connections open as soon as they are created
    pub fn new() -> Self {
        Self {
            auto_open: true,
            ack_close: true,
            connections: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Connector whose connections wait for [`MockConnection::open`]
    pub fn manual() -> Self {
        Self {
            auto_open: false,
            ..Self::new()
        }
    }

    /// Manual connector whose connections only report closure through
    /// [`MockConnection::drop_connection`], even when the client closes them
    pub fn lingering() -> Self {
        Self {
            auto_open: false,
            ack_close: false,
            ..Self::new()
        }
    }

    /// Number of connection attempts so far
    pub fn connect_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// The `index`th connection attempt
    pub fn connection(&self, index: usize) -> MockConnection {
        self.connections.lock().unwrap()[index].clone()
    }

    /// The most recent connection attempt
    pub fn last(&self) -> MockConnection {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection attempted yet")
    }
}

impl Connector for MockConnector {
    fn connect(&self, uri: &str, events: TransportEvents) -> Box<dyn Transport> {
        let connection = MockConnection {
            uri: uri.to_string(),
            events,
            frames: Arc::new(Mutex::new(Vec::new())),
            close_requested: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
            fail_sends: Arc::new(AtomicBool::new(false)),
            ack_close: self.ack_close,
        };
        self.connections.lock().unwrap().push(connection.clone());

        if self.auto_open {
            connection.open();
        }
        Box::new(MockTransport { connection })
    }
}

/// Build a client over a fresh [`MockConnector`] and wait until it is open
pub async fn open_client(options: ClientOptions) -> (PassageClient, MockConnector) {
    let connector = MockConnector::new();
    let client = ClientBuilder::new("mock://server")
        .options(options)
        .with_connector(connector.clone())
        .connect()
        .unwrap();

    wait_for_state(&client, ConnectionState::Open).await;
    (client, connector)
}

#[derive(Debug, Clone)]
enum ServerAction {
    Push(String),
    Disconnect,
}

/// Mock WebSocket server for end-to-end tests
///
/// Every text frame received goes through the handler, and whatever it
/// returns is sent back. Frames can also be pushed to every connected
/// client, and connections can be dropped from the server side.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    actions: broadcast::Sender<ServerAction>,
    message_rx: mpsc::UnboundedReceiver<String>,
}

impl MockWsServer {
    /// Server that answers nothing
    pub async fn new() -> Self {
        Self::with_handler(|_| None).await
    }

    /// Server that answers with `handler(frame)` when it returns `Some`
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(String) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(handler);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, msg_rx) = mpsc::unbounded_channel::<String>();
        let (actions, _) = broadcast::channel::<ServerAction>(64);
        let actions_for_accept = actions.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let handler = Arc::clone(&handler);
                        let msg_tx = msg_tx.clone();
                        let mut actions = actions_for_accept.subscribe();

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();

                            loop {
                                tokio::select! {
                                    incoming = read.next() => match incoming {
                                        Some(Ok(Message::Text(text))) => {
                                            let _ = msg_tx.send(text.clone());
                                            if let Some(reply) = handler(text) {
                                                let _ = write.send(Message::Text(reply)).await;
                                            }
                                        }
                                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                        Some(Ok(_)) => {}
                                    },
                                    action = actions.recv() => match action {
                                        Ok(ServerAction::Push(text)) => {
                                            let _ = write.send(Message::Text(text)).await;
                                        }
                                        Ok(ServerAction::Disconnect) | Err(_) => {
                                            let _ = write.close().await;
                                            break;
                                        }
                                    },
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            actions,
            message_rx: msg_rx,
        }
    }

    /// WebSocket URL of this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a text frame to every connected client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.actions.send(ServerAction::Push(text.into()));
    }

    /// Close every client connection from the server side
    pub fn disconnect_all(&self) {
        let _ = self.actions.send(ServerAction::Disconnect);
    }

    /// Next frame received from any client
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop accepting connections
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Reply `{id, result}` to whatever request is in `frame`
pub fn echo_result(frame: &str, result: Value) -> Option<String> {
    let request: Value = serde_json::from_str(frame).ok()?;
    let id = request.get("id")?.clone();
    Some(mock_response(id, result))
}

/// A JSON-RPC success response
pub fn mock_response(id: Value, result: Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
    .to_string()
}

/// A JSON-RPC error response
pub fn mock_error_response(id: u64, code: i64, message: &str, data: Option<Value>) -> String {
    let mut error = serde_json::json!({"code": code, "message": message});
    if let Some(data) = data {
        error["data"] = data;
    }
    serde_json::json!({
        "jsonrpc": "2.0",
        "error": error,
        "id": id
    })
    .to_string()
}

/// A JSON-RPC notification
pub fn mock_notification(method: &str, params: Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
    .to_string()
}
