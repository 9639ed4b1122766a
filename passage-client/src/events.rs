//! Event bus for notifications and lifecycle events
//!
//! Inbound notifications and connection lifecycle events share one
//! namespace. Listeners are kept per name in subscription order, and the
//! same listener may be subscribed more than once; it then runs once per
//! subscription.
//!
//! # Lifecycle Events
//!
//! | Name          | Fired when                                | Payload          |
//! |---------------|-------------------------------------------|------------------|
//! | `rpc.open`    | every successful (re)connection           | `null`           |
//! | `rpc.close`   | every closure, before any reconnect       | `null`           |
//! | `rpc.error`   | the transport reports an error            | error text       |
//! | `rpc.message` | every usable inbound frame, before dispatch | raw frame text |
//!
//! Notification listeners receive the notification's `params`, or `null`
//! when it carried none.
//!
//! A frame that does not parse, or holds only invalid envelopes, is dropped
//! without firing `rpc.message`.
//!
//! A listener that panics is logged and skipped; the listeners after it
//! still run.
//!
//! # Examples
//!
//! ```rust
//! use passage_client::{EventBus, EventListener};
//! use serde_json::json;
//!
//! let mut bus = EventBus::new();
//! let listener = EventListener::new(|params| println!("update: {}", params));
//!
//! bus.subscribe("myapp.update", listener.clone());
//! bus.publish("myapp.update", &json!({"id": 7}));
//!
//! bus.unsubscribe("myapp.update", &listener);
//! assert!(!bus.has_listeners("myapp.update"));
//! ```

use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Run user code, turning a panic into an error log
///
/// Returns whether `f` completed.
pub(crate) fn run_guarded(kind: &'static str, name: &str, f: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(kind, name, panic = %panic_message(&*payload), "User callback panicked");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Shared handle to an event callback
///
/// Identity is the handle itself: clones of one listener compare equal,
/// two listeners built from identical closures do not.
#[derive(Clone)]
pub struct EventListener(Arc<dyn Fn(&Value) + Send + Sync + 'static>);

impl EventListener {
    /// Wrap a callback
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Invoke the callback
    pub fn call(&self, payload: &Value) {
        (self.0)(payload)
    }
}

impl PartialEq for EventListener {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for EventListener {}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventListener")
            .field(&Arc::as_ptr(&self.0))
            .finish()
    }
}

/// Multicast dispatch keyed by event or method name
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: HashMap<String, Vec<EventListener>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `name`
    pub fn subscribe(&mut self, name: impl Into<String>, listener: EventListener) {
        self.listeners.entry(name.into()).or_default().push(listener);
    }

    /// Remove the first subscription of `listener` under `name`
    ///
    /// The name is forgotten once its last listener goes. Returns whether
    /// anything was removed.
    pub fn unsubscribe(&mut self, name: &str, listener: &EventListener) -> bool {
        let Some(listeners) = self.listeners.get_mut(name) else {
            return false;
        };
        let Some(index) = listeners.iter().position(|l| l == listener) else {
            return false;
        };

        listeners.remove(index);
        if listeners.is_empty() {
            self.listeners.remove(name);
        }
        true
    }

    /// Call every listener of `name` in subscription order
    ///
    /// Returns the number of listeners called.
    pub fn publish(&self, name: &str, payload: &Value) -> usize {
        let Some(listeners) = self.listeners.get(name) else {
            return 0;
        };

        // Listeners are cloned first so the list cannot change mid-dispatch
        let listeners = listeners.clone();
        for listener in &listeners {
            run_guarded("listener", name, || listener.call(payload));
        }
        listeners.len()
    }

    /// Whether `name` has at least one listener
    pub fn has_listeners(&self, name: &str) -> bool {
        self.listeners.contains_key(name)
    }

    /// Number of subscriptions under `name`
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.get(name).map_or(0, Vec::len)
    }

    /// Names with at least one listener
    pub fn names(&self) -> Vec<String> {
        self.listeners.keys().cloned().collect()
    }
}
