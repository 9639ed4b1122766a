//! JSON-RPC client handle
//!
//! `PassageClient` is the type applications hold. Every method enqueues a
//! command for the session task and returns immediately; nothing here
//! blocks on the network.
//!
//! # Client Lifecycle
//!
//! 1. **Build**: `ClientBuilder::build` starts the session in the Idle state
//! 2. **Connect**: `connect()` opens the transport; `rpc.open` fires once it is up
//! 3. **Use**: send requests, notifications and batches; listen for events
//! 4. **Reconnect** (optional): after an unexpected closure, retry on a fixed delay
//! 5. **Close**: `close()` tears the transport down and suppresses reconnects
//!
//! # Cloning
//!
//! `PassageClient` is cheap to clone. All clones drive the same session,
//! which stops once the last clone is dropped.
//!
//! # Callbacks
//!
//! Request callbacks and event listeners run on the session task. They
//! should return quickly; calling back into the client from them is fine
//! since that only enqueues another command. A panic in one of them is
//! caught and logged, and the session keeps running.

use crate::batch::{encode_params, BatchEntry};
use crate::client_builder::ClientBuilder;
use crate::connection_state::ConnectionState;
use crate::events::EventListener;
use crate::session::{Command, SessionHandle};
use passage_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// JSON-RPC client over a persistent duplex transport
#[derive(Clone)]
pub struct PassageClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl PassageClient {
    pub(crate) fn from_session(session: SessionHandle) -> Self {
        Self {
            commands: session.commands,
            state: session.state,
        }
    }

    /// Start configuring a client for `uri`
    pub fn builder(uri: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(uri)
    }

    /// Create a client with default options and start connecting
    ///
    /// Returns as soon as the attempt has started; listen for `rpc.open` or
    /// use [`wait_for_state`](Self::wait_for_state) to know when it is up.
    /// Must be called from within a tokio runtime.
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        ClientBuilder::new(uri).connect()
    }

    /// Open a new connection
    ///
    /// Cancels a scheduled reconnect. An existing connection is closed
    /// first and reported through `rpc.close`.
    #[tracing::instrument(skip(self))]
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Close the connection and suppress reconnection
    ///
    /// Pending requests are left to their deadlines unless the client was
    /// built with `fail_pending_on_close`.
    #[tracing::instrument(skip(self))]
    pub fn close(&self) {
        self.command(Command::Close);
    }

    /// Send a notification
    ///
    /// No id is attached and nothing is tracked. Fails with
    /// `TransportUnavailable` when the connection is not open and with
    /// `Serialization` when `params` has no JSON form.
    ///
    /// Params that serialize to `null` (`Value::Null`, `None`, `()`) mean
    /// "no params": the envelope is sent without a `params` member.
    #[tracing::instrument(skip_all, fields(method = %method))]
    pub fn notify<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
        let params = encode_params(&params)?;
        if !self.is_connected() {
            return Err(Error::TransportUnavailable);
        }

        self.command(Command::Notify {
            method: method.to_string(),
            params,
        });
        Ok(())
    }

    /// Send a request and get the outcome through `callback`
    ///
    /// Uses the client's default request timeout. As with
    /// [`notify`](Self::notify), `null` params are left out of the envelope.
    pub fn send<P, F>(&self, method: &str, params: P, callback: F)
    where
        P: Serialize,
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        self.dispatch(method, params, callback, None);
    }

    /// Send a request with its own deadline
    pub fn send_with_timeout<P, F>(&self, method: &str, params: P, timeout: Duration, callback: F)
    where
        P: Serialize,
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        self.dispatch(method, params, callback, Some(timeout));
    }

    #[tracing::instrument(skip_all, fields(method = %method))]
    fn dispatch<P, F>(&self, method: &str, params: P, callback: F, timeout: Option<Duration>)
    where
        P: Serialize,
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let params = match encode_params(&params) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(error = %e, "Request parameters could not be serialized");
                callback(Err(e));
                return;
            }
        };

        self.command(Command::Send {
            method: method.to_string(),
            params,
            callback: Box::new(callback),
            timeout,
        });
    }

    /// Send several calls in one frame
    ///
    /// Entries that cannot be sent have their callbacks resolved before
    /// this returns; see [`crate::batch`].
    pub fn send_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = BatchEntry>,
    {
        self.dispatch_batch(entries, None);
    }

    /// Send several calls in one frame with a shared deadline
    pub fn send_all_with_timeout<I>(&self, entries: I, timeout: Duration)
    where
        I: IntoIterator<Item = BatchEntry>,
    {
        self.dispatch_batch(entries, Some(timeout));
    }

    fn dispatch_batch<I>(&self, entries: I, timeout: Option<Duration>)
    where
        I: IntoIterator<Item = BatchEntry>,
    {
        let calls: Vec<_> = entries.into_iter().filter_map(BatchEntry::validate).collect();
        if calls.is_empty() {
            return;
        }

        tracing::debug!(size = calls.len(), "Batch queued");
        self.command(Command::SendAll { calls, timeout });
    }

    /// Send a request and wait for its result
    ///
    /// ```rust,no_run
    /// use passage_client::PassageClient;
    /// use serde_json::json;
    ///
    /// # async fn example(client: &PassageClient) -> passage_core::Result<()> {
    /// let sum: i64 = client.request("myapp.sum", json!([1, 2])).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.await_outcome(method, params, None).await
    }

    /// Send a request with its own deadline and wait for its result
    pub async fn request_with_timeout<P, R>(&self, method: &str, params: P, timeout: Duration) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.await_outcome(method, params, Some(timeout)).await
    }

    async fn await_outcome<P, R>(&self, method: &str, params: P, timeout: Option<Duration>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let (tx, rx) = oneshot::channel();
        self.dispatch(
            method,
            params,
            move |outcome| {
                let _ = tx.send(outcome);
            },
            timeout,
        );

        // The callback is dropped unrun only if the session is gone
        let value = rx.await.map_err(|_| Error::TransportUnavailable)??;
        serde_json::from_value(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Listen for a notification method or lifecycle event
    ///
    /// Keep the listener (or a clone) to remove it later; removal matches
    /// on the handle, not on the closure.
    pub fn add_event_listener(&self, name: impl Into<String>, listener: EventListener) {
        self.command(Command::Subscribe {
            name: name.into(),
            listener,
        });
    }

    /// Wrap `callback` in a listener, subscribe it and return the handle
    pub fn on<F>(&self, name: impl Into<String>, callback: F) -> EventListener
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let listener = EventListener::new(callback);
        self.add_event_listener(name, listener.clone());
        listener
    }

    /// Remove the first subscription of `listener` under `name`
    pub fn remove_event_listener(&self, name: impl Into<String>, listener: &EventListener) {
        self.command(Command::Unsubscribe {
            name: name.into(),
            listener: listener.clone(),
        });
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the connection is open
    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the connection reaches `target`
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| Error::TransportUnavailable)
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("Session has stopped, command dropped");
        }
    }
}

impl std::fmt::Debug for PassageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassageClient")
            .field("state", &self.state())
            .finish()
    }
}
