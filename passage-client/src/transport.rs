//! Transport seam
//!
//! The session never touches a socket directly. A [`Connector`] opens a
//! [`Transport`] for a URI, and the transport reports what happens to it
//! through the [`TransportEvents`] handle it was given:
//!
//! - `opened` once the connection is usable
//! - `message` for every inbound text frame
//! - `error` for transport failures (no state change by itself)
//! - `closed` exactly once, also after a failed attempt or after `close()`
//!
//! Events are tagged with the connection they belong to, so a late event
//! from a connection that has since been replaced can be recognised and
//! ignored.
//!
//! [`WebSocketConnector`] is the default connector and runs each
//! connection on its own task with `tokio-tungstenite`.

use futures::{SinkExt, StreamExt};
use passage_core::{Error, Result};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Something that happened to a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is usable
    Opened,
    /// An inbound text frame
    Message(String),
    /// A transport failure
    Error(String),
    /// The connection is gone
    Closed,
}

/// Connection-scoped sender for [`TransportEvent`]s
///
/// Cheap to clone. Sending after the client has gone away is silently
/// dropped.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    connection: u64,
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl TransportEvents {
    pub(crate) fn new(connection: u64, tx: mpsc::UnboundedSender<(u64, TransportEvent)>) -> Self {
        Self { connection, tx }
    }

    /// Generation number of the connection these events belong to
    pub fn connection(&self) -> u64 {
        self.connection
    }

    /// Report that the connection is usable
    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    /// Report an inbound text frame
    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    /// Report a transport failure
    pub fn error(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Error(text.into()));
    }

    /// Report that the connection is gone
    pub fn closed(&self) {
        self.emit(TransportEvent::Closed);
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send((self.connection, event));
    }
}

/// Handle to one open (or opening) connection
pub trait Transport: Send {
    /// Queue a text frame
    fn send(&mut self, frame: String) -> Result<()>;

    /// Start tearing the connection down
    ///
    /// Completion is reported through `TransportEvents::closed`.
    fn close(&mut self);
}

/// Opens transports
pub trait Connector: Send + Sync + 'static {
    /// Start connecting to `uri`
    ///
    /// Must not block; the outcome is reported through `events`.
    fn connect(&self, uri: &str, events: TransportEvents) -> Box<dyn Transport>;
}

/// Default connector over WebSocket
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(&self, uri: &str, events: TransportEvents) -> Box<dyn Transport> {
        let (outgoing, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(uri.to_string(), rx, events));
        Box::new(WebSocketTransport { outgoing })
    }
}

enum Outgoing {
    Frame(String),
    Close,
}

struct WebSocketTransport {
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl Transport for WebSocketTransport {
    fn send(&mut self, frame: String) -> Result<()> {
        self.outgoing
            .send(Outgoing::Frame(frame))
            .map_err(|_| Error::TransportUnavailable)
    }

    fn close(&mut self) {
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

/// Drive one WebSocket connection until either side closes it
///
/// Dropping the transport handle counts as a close request.
async fn run_socket(
    uri: String,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: TransportEvents,
) {
    let connection = events.connection();

    let socket = tokio::select! {
        result = connect_async(uri.as_str()) => match result {
            Ok((socket, _)) => socket,
            Err(e) => {
                tracing::warn!(connection, uri = %uri, error = %e, "Connection attempt failed");
                events.error(e.to_string());
                events.closed();
                return;
            }
        },
        // Nothing but a close can be queued before the socket is open
        _ = outgoing.recv() => {
            tracing::debug!(connection, "Connection attempt abandoned");
            events.closed();
            return;
        }
    };

    events.opened();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = outgoing.recv() => match command {
                Some(Outgoing::Frame(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::warn!(connection, error = %e, "Failed to write frame");
                        events.error(e.to_string());
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => events.message(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => events.message(text),
                    Err(_) => tracing::warn!(connection, "Dropping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(connection, error = %e, "WebSocket error");
                    events.error(e.to_string());
                    break;
                }
            },
        }
    }

    tracing::debug!(connection, "Socket task finished");
    events.closed();
}
