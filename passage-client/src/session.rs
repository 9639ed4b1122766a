//! Session actor
//!
//! One task owns everything mutable about a client: the request registry,
//! the event bus, the reconnect policy and the current transport. Client
//! handles talk to it through a command channel; transports report through
//! a second channel; request deadlines post expired ids on a third. The
//! task handles one message at a time, so callbacks and listeners never run
//! concurrently with each other. They run under `catch_unwind`, so a
//! panicking callback is logged instead of stopping the task.
//!
//! # Connections
//!
//! Every `connect()` starts a new connection generation. Transport events
//! carry the generation they belong to, and anything from a generation
//! other than the current one is ignored: a connection replaced by
//! `connect()` has already been reported closed.
//!
//! # Reconnecting
//!
//! After a closure the policy may hand back a delay. The session then holds
//! a `Sleep` and selects on it with the channels; `connect()` and `close()`
//! drop it, and the kill flag is checked again when it fires.
//!
//! Queued commands are always handled before queued transport events, so
//! anything a caller did before a frame arrived is in effect when it is
//! dispatched.
//!
//! The task ends once every client handle is gone.

use crate::batch::OutgoingCall;
use crate::connection_state::ConnectionState;
use crate::events::{run_guarded, EventBus, EventListener};
use crate::metrics::ClientMetrics;
use crate::options::ClientOptions;
use crate::reconnect::ReconnectPolicy;
use crate::request::{RequestRegistry, ResponseCallback};
use crate::transport::{Connector, Transport, TransportEvent, TransportEvents};
use passage_core::{
    codec, lifecycle, Error, Inbound, JsonRpcNotification, JsonRpcResponse, RequestId,
};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;

/// Requests from client handles to the session
pub(crate) enum Command {
    Connect,
    Close,
    Notify {
        method: String,
        params: Option<Value>,
    },
    Send {
        method: String,
        params: Option<Value>,
        callback: ResponseCallback,
        timeout: Option<Duration>,
    },
    SendAll {
        calls: Vec<OutgoingCall>,
        timeout: Option<Duration>,
    },
    Subscribe {
        name: String,
        listener: EventListener,
    },
    Unsubscribe {
        name: String,
        listener: EventListener,
    },
}

/// Channels a client handle keeps
pub(crate) struct SessionHandle {
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) state: watch::Receiver<ConnectionState>,
}

/// Start a session on `runtime`
pub(crate) fn spawn(
    runtime: &tokio::runtime::Handle,
    uri: String,
    options: ClientOptions,
    connector: Arc<dyn Connector>,
    metrics: Option<Arc<ClientMetrics>>,
) -> SessionHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (expired_tx, expired_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

    let session = Session {
        uri,
        policy: ReconnectPolicy::from_options(&options),
        options,
        connector,
        metrics,
        registry: RequestRegistry::new(expired_tx),
        events: EventBus::new(),
        state: state_tx,
        transport: None,
        transport_tx,
        connection: 0,
        killed: false,
        reconnecting: false,
        reconnect_at: None,
    };

    runtime.spawn(session.run(commands_rx, transport_rx, expired_rx));

    SessionHandle {
        commands: commands_tx,
        state: state_rx,
    }
}

struct Session {
    uri: String,
    options: ClientOptions,
    connector: Arc<dyn Connector>,
    metrics: Option<Arc<ClientMetrics>>,
    registry: RequestRegistry,
    events: EventBus,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    transport: Option<Box<dyn Transport>>,
    transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    /// Generation of the current connection
    connection: u64,
    /// Set by `close()`, cleared by `connect()`
    killed: bool,
    /// The current connection attempt was scheduled by the policy
    reconnecting: bool,
    reconnect_at: Option<Pin<Box<Sleep>>>,
}

impl Session {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut transport_events: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
        mut expired: mpsc::UnboundedReceiver<RequestId>,
    ) {
        tracing::debug!(uri = %self.uri, "Session started");

        loop {
            // Commands first: a listener added before a frame arrives sees it
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some((connection, event)) = transport_events.recv() => {
                    self.handle_transport_event(connection, event);
                }
                Some(id) = expired.recv() => self.handle_expired(id),
                _ = reconnect_delay(&mut self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.handle_reconnect();
                }
            }
        }

        self.shutdown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                self.reconnecting = false;
                self.connect();
            }
            Command::Close => self.close(),
            Command::Notify { method, params } => self.notify(method, params),
            Command::Send {
                method,
                params,
                callback,
                timeout,
            } => self.send_request(method, params, callback, timeout),
            Command::SendAll { calls, timeout } => self.send_batch(calls, timeout),
            Command::Subscribe { name, listener } => self.events.subscribe(name, listener),
            Command::Unsubscribe { name, listener } => {
                self.events.unsubscribe(&name, &listener);
            }
        }
    }

    fn connect(&mut self) {
        self.reconnect_at = None;
        self.killed = false;

        if let Some(mut previous) = self.transport.take() {
            tracing::info!(connection = self.connection, "Replacing existing connection");
            previous.close();
            self.connection_closed();
        }

        self.connection += 1;
        tracing::info!(uri = %self.uri, connection = self.connection, "Connecting");
        self.set_state(ConnectionState::Connecting);

        let events = TransportEvents::new(self.connection, self.transport_tx.clone());
        self.transport = Some(self.connector.connect(&self.uri, events));
    }

    fn close(&mut self) {
        self.killed = true;
        if self.reconnect_at.take().is_some() {
            tracing::debug!("Scheduled reconnect cancelled");
        }

        if self.transport.is_none() {
            self.set_state(ConnectionState::Closed);
            return;
        }

        tracing::info!(connection = self.connection, "Closing connection");
        self.set_state(ConnectionState::Closing);
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
    }

    fn handle_reconnect(&mut self) {
        if self.killed {
            return;
        }

        tracing::info!(attempt = self.policy.tries(), "Reconnecting");
        self.reconnecting = true;
        self.connect();
    }

    fn handle_transport_event(&mut self, connection: u64, event: TransportEvent) {
        if connection != self.connection || self.transport.is_none() {
            tracing::trace!(connection, ?event, "Ignoring event from stale connection");
            return;
        }

        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Message(text) => self.on_message(text),
            TransportEvent::Error(text) => {
                tracing::warn!(connection, error = %text, "Transport error");
                if let Some(ref m) = self.metrics {
                    m.record_error("transport");
                }
                self.events.publish(lifecycle::ERROR, &Value::String(text));
            }
            TransportEvent::Closed => self.on_close(),
        }
    }

    fn on_open(&mut self) {
        if self.killed {
            tracing::debug!(connection = self.connection, "Opened after close was requested");
            return;
        }

        self.policy.reset();
        self.set_state(ConnectionState::Open);
        tracing::info!(uri = %self.uri, connection = self.connection, "Connected");

        if std::mem::take(&mut self.reconnecting) {
            if let Some(ref m) = self.metrics {
                m.record_reconnection_success();
            }
        }

        self.events.publish(lifecycle::OPEN, &Value::Null);
    }

    fn on_close(&mut self) {
        self.transport = None;
        self.set_state(ConnectionState::Closed);
        tracing::info!(connection = self.connection, killed = self.killed, "Connection closed");

        self.connection_closed();

        if let Some(delay) = self.policy.next_delay(self.killed) {
            tracing::info!(
                attempt = self.policy.tries(),
                delay_ms = delay.as_millis() as u64,
                "Reconnect scheduled"
            );
            if let Some(ref m) = self.metrics {
                m.record_reconnection_attempt();
            }
            self.reconnect_at = Some(Box::pin(tokio::time::sleep(delay)));
        } else if self.policy.is_enabled() && !self.killed {
            tracing::warn!(tries = self.policy.tries(), "Reconnect attempts exhausted");
        }
    }

    /// Announce that the current connection is gone
    fn connection_closed(&mut self) {
        self.events.publish(lifecycle::CLOSE, &Value::Null);

        if self.options.fail_pending_on_close && !self.registry.is_empty() {
            let failed = self.registry.fail_all(Error::TransportUnavailable);
            tracing::debug!(count = failed.len(), "Failed pending requests on close");
            if let Some(ref m) = self.metrics {
                for resolved in &failed {
                    m.record_request_resolved(
                        &resolved.method,
                        "error",
                        resolved.elapsed.as_secs_f64(),
                    );
                    m.record_error("transport");
                }
            }
        }
    }

    fn on_message(&mut self, text: String) {
        tracing::debug!(len = text.len(), "Frame received");

        let inbound = match codec::decode(&text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                if let Some(ref m) = self.metrics {
                    m.record_dropped_frame("malformed");
                }
                return;
            }
        };

        // Frames with nothing usable in them are not announced
        if inbound.iter().all(|item| matches!(item, Inbound::Invalid(_))) {
            tracing::warn!(envelopes = inbound.len(), "Dropping frame without valid envelopes");
            if let Some(ref m) = self.metrics {
                m.record_dropped_frame("invalid");
            }
            return;
        }

        self.events.publish(lifecycle::MESSAGE, &Value::String(text));

        for item in inbound {
            match item {
                Inbound::Notification(notification) => self.dispatch_notification(notification),
                Inbound::Response(response) => self.dispatch_response(response),
                Inbound::Invalid(value) => {
                    tracing::warn!(envelope = %value, "Dropping invalid envelope");
                    if let Some(ref m) = self.metrics {
                        m.record_dropped_frame("invalid");
                    }
                }
            }
        }
    }

    fn dispatch_notification(&mut self, notification: JsonRpcNotification) {
        if lifecycle::is_reserved(&notification.method) {
            tracing::warn!(method = %notification.method, "Dropping notification with reserved name");
            if let Some(ref m) = self.metrics {
                m.record_dropped_frame("reserved");
            }
            return;
        }

        if let Some(ref m) = self.metrics {
            m.record_notification(&notification.method);
        }

        let params = notification.params.unwrap_or(Value::Null);
        let delivered = self.events.publish(&notification.method, &params);
        tracing::debug!(method = %notification.method, listeners = delivered, "Notification dispatched");
    }

    fn dispatch_response(&mut self, response: JsonRpcResponse) {
        let Some(id) = response.id.as_request_id() else {
            tracing::debug!(id = %response.id, "Dropping response with foreign id");
            return;
        };

        let outcome = response.into_outcome().map_err(Error::Remote);
        let status = if outcome.is_ok() { "success" } else { "error" };

        match self.registry.resolve(id, outcome) {
            Some(resolved) => {
                tracing::debug!(
                    id,
                    method = %resolved.method,
                    status,
                    duration_secs = resolved.elapsed.as_secs_f64(),
                    "Request resolved"
                );
                if let Some(ref m) = self.metrics {
                    m.record_request_resolved(&resolved.method, status, resolved.elapsed.as_secs_f64());
                    if status == "error" {
                        m.record_error("remote");
                    }
                }
            }
            None => tracing::debug!(id, "Response for unknown or settled request"),
        }
    }

    fn handle_expired(&mut self, id: RequestId) {
        if let Some(resolved) = self.registry.expire(id) {
            tracing::warn!(id, method = %resolved.method, "Request timed out");
            if let Some(ref m) = self.metrics {
                m.record_request_resolved(&resolved.method, "timeout", resolved.elapsed.as_secs_f64());
                m.record_error("timeout");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.state.borrow().is_open() && self.transport.is_some()
    }

    fn notify(&mut self, method: String, params: Option<Value>) {
        if !self.is_open() {
            tracing::warn!(method = %method, "Dropping notification, not connected");
            return;
        }

        match codec::encode_envelope(&method, params, None) {
            Ok(envelope) => self.transmit(vec![envelope], &[]),
            Err(e) => tracing::warn!(method = %method, error = %e, "Failed to encode notification"),
        }
    }

    fn send_request(
        &mut self,
        method: String,
        params: Option<Value>,
        callback: ResponseCallback,
        timeout: Option<Duration>,
    ) {
        if !self.is_open() {
            tracing::debug!(method = %method, "Request rejected, not connected");
            run_guarded("request", &method, move || callback(Err(Error::TransportUnavailable)));
            return;
        }

        let timeout = timeout.unwrap_or(self.options.request_timeout);
        let id = self.registry.register(method.as_str(), callback, timeout);
        if let Some(ref m) = self.metrics {
            m.record_request_sent(&method);
        }

        match codec::encode_envelope(&method, params, Some(id)) {
            Ok(envelope) => {
                tracing::debug!(id, method = %method, "Sending request");
                self.transmit(vec![envelope], &[id]);
            }
            Err(e) => {
                self.registry.resolve(id, Err(e));
            }
        }
    }

    fn send_batch(&mut self, calls: Vec<OutgoingCall>, timeout: Option<Duration>) {
        if calls.is_empty() {
            return;
        }

        if !self.is_open() {
            tracing::debug!(size = calls.len(), "Batch rejected, not connected");
            for call in calls {
                if let Some(callback) = call.callback {
                    run_guarded("request", &call.method, move || {
                        callback(Err(Error::TransportUnavailable))
                    });
                }
            }
            return;
        }

        let timeout = timeout.unwrap_or(self.options.request_timeout);
        let mut envelopes = Vec::with_capacity(calls.len());
        let mut ids = Vec::new();

        for call in calls {
            let id = call
                .callback
                .map(|callback| self.registry.register(call.method.as_str(), callback, timeout));

            match codec::encode_envelope(&call.method, call.params, id) {
                Ok(envelope) => {
                    envelopes.push(envelope);
                    ids.extend(id);
                }
                Err(e) => {
                    if let Some(id) = id {
                        self.registry.resolve(id, Err(e));
                    }
                }
            }
        }

        if let Some(ref m) = self.metrics {
            m.record_batch(envelopes.len() as u64);
        }
        tracing::debug!(size = envelopes.len(), requests = ids.len(), "Sending batch");
        self.transmit(envelopes, &ids);
    }

    /// Write envelopes as one frame, failing `ids` if that is impossible
    fn transmit(&mut self, envelopes: Vec<Value>, ids: &[RequestId]) {
        let result = match codec::encode_frame(&envelopes) {
            Ok(Some(frame)) => match self.transport.as_mut() {
                Some(transport) => transport.send(frame),
                None => Err(Error::TransportUnavailable),
            },
            Ok(None) => return,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to send frame");
            let failure = match e {
                Error::Serialization(_) => e,
                _ => Error::TransportUnavailable,
            };
            for &id in ids {
                self.registry.resolve(id, Err(failure.clone()));
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Connection state changed");
        }
        if let Some(ref m) = self.metrics {
            m.update_connection_state(state);
        }
    }

    fn shutdown(&mut self) {
        tracing::debug!("All client handles dropped, stopping session");
        self.killed = true;
        self.reconnect_at = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.registry.fail_all(Error::TransportUnavailable);
        self.set_state(ConnectionState::Closed);
    }
}

async fn reconnect_delay(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
