//! Request tracking for the passage client
//!
//! The registry correlates outgoing requests with their responses.
//!
//! # Request Lifecycle
//!
//! 1. **Register**: allocate the next id, store the callback, arm a deadline
//! 2. **Send**: the session transmits the request envelope
//! 3. **Resolve**: a response with the same id arrives, or the deadline fires
//! 4. **Complete**: the callback runs once and the entry is removed
//!
//! # Deadlines
//!
//! Each registration spawns a one-shot sleep that posts the id back on the
//! expiry channel handed to [`RequestRegistry::new`]. The owner of the
//! receiving end calls [`RequestRegistry::expire`] with it. Whichever of
//! response and deadline comes first wins; the other finds no entry and is
//! a no-op. Early resolution also aborts the sleep, which only saves a
//! wakeup.

use crate::events::run_guarded;
use passage_core::{Error, RequestId, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Callback invoked with the outcome of a request
pub type ResponseCallback = Box<dyn FnOnce(Result<Value>) + Send + 'static>;

/// A request waiting for its response or deadline
struct PendingRequest {
    method: String,
    callback: ResponseCallback,
    deadline: AbortHandle,
    sent_at: Instant,
}

/// Summary of a request that just completed
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Id the request was registered under
    pub id: RequestId,
    /// Method the request called
    pub method: String,
    /// Time between registration and resolution
    pub elapsed: Duration,
}

/// Tracks in-flight requests, allocates ids and enforces deadlines
///
/// Not shared: the session task owns the registry and is the only caller.
pub struct RequestRegistry {
    pending: HashMap<RequestId, PendingRequest>,
    next_id: RequestId,
    expired: mpsc::UnboundedSender<RequestId>,
}

impl RequestRegistry {
    /// Create a registry that reports fired deadlines on `expired`
    pub fn new(expired: mpsc::UnboundedSender<RequestId>) -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 1,
            expired,
        }
    }

    /// Allocate the next request id
    ///
    /// Ids start at 1 and only ever increase, so an id can never be handed
    /// out again while its request is still pending.
    pub fn next_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Register a request and arm its deadline
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(
        &mut self,
        method: impl Into<String>,
        callback: ResponseCallback,
        timeout: Duration,
    ) -> RequestId {
        let id = self.next_id();
        let expired = self.expired.clone();
        let deadline = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = expired.send(id);
        })
        .abort_handle();

        self.pending.insert(
            id,
            PendingRequest {
                method: method.into(),
                callback,
                deadline,
                sent_at: Instant::now(),
            },
        );

        id
    }

    /// Complete a pending request with its outcome
    ///
    /// Returns `None` when the id is unknown: already resolved, timed out,
    /// or never registered.
    pub fn resolve(&mut self, id: RequestId, outcome: Result<Value>) -> Option<Resolved> {
        let pending = self.pending.remove(&id)?;
        pending.deadline.abort();
        let callback = pending.callback;
        run_guarded("request", &pending.method, move || callback(outcome));

        Some(Resolved {
            id,
            method: pending.method,
            elapsed: pending.sent_at.elapsed(),
        })
    }

    /// Fail a request whose deadline fired
    pub fn expire(&mut self, id: RequestId) -> Option<Resolved> {
        self.resolve(id, Err(Error::Timeout))
    }

    /// Fail every pending request with the same error
    ///
    /// Callbacks run in id order.
    pub fn fail_all(&mut self, error: Error) -> Vec<Resolved> {
        let mut ids: Vec<RequestId> = self.pending.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.resolve(id, Err(error.clone())))
            .collect()
    }

    /// Check whether `id` is still waiting
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no request is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
