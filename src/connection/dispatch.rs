//! Inbound dispatch: id correlation and notification fan-out.
//!
//! The [`Dispatcher`] owns everything a connection needs to route inbound
//! data: the id counter, the pending callback table and the listener
//! registry. It never references the adapter, so an adapter's inbound sink
//! can hold it without creating a reference cycle.
//!
//! No table lock is held while user callbacks or listeners run; a callback
//! may send on the same connection. A retained callback is locked while it
//! runs, so a response for the same id delivered from inside that callback
//! is logged and dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::CallbackRetention;
use crate::error::{Error, Result};
use crate::identifiers::MessageId;
use crate::protocol::{Envelope, Message, Notification, Payload, Response, decode, split_batch};
use crate::transport::InboundSink;

// ============================================================================
// Types
// ============================================================================

/// Continuation invoked with a response's `result`.
///
/// `FnMut` because a retained entry may be invoked more than once.
pub type ResponseCallback = Box<dyn FnMut(Value) + Send>;

/// Listener invoked for every notification with a matching method.
pub type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Callback shared between the table and an in-progress invocation.
type SharedCallback = Arc<Mutex<ResponseCallback>>;

/// Map of request IDs to their optional callbacks.
type PendingMap = FxHashMap<MessageId, Option<SharedCallback>>;

/// Map of notification methods to listeners, in registration order.
type HandlerMap = FxHashMap<String, Vec<NotificationHandler>>;

// ============================================================================
// Dispatcher
// ============================================================================

/// Correlation and fan-out state shared by a connection and its adapter.
pub(crate) struct Dispatcher {
    next_id: AtomicU64,
    pending: Mutex<PendingMap>,
    handlers: Mutex<HandlerMap>,
    retention: CallbackRetention,
}

impl Dispatcher {
    pub(crate) fn new(retention: CallbackRetention) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(PendingMap::default()),
            handlers: Mutex::new(HandlerMap::default()),
            retention,
        }
    }

    /// Returns an inbound sink that dispatches raw text and logs failures.
    pub(crate) fn sink(self: &Arc<Self>) -> InboundSink {
        let dispatcher = Arc::clone(self);
        Arc::new(move |raw: String| {
            if let Err(e) = dispatcher.accept_response(Payload::Text(raw)) {
                warn!(error = %e, "Failed to dispatch inbound data");
            }
        })
    }

    #[inline]
    pub(crate) fn retention(&self) -> CallbackRetention {
        self.retention
    }

    /// Allocates the next request id.
    pub(crate) fn allocate_id(&self) -> MessageId {
        MessageId::from_counter(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a pending entry for `id`.
    pub(crate) fn register(&self, id: MessageId, callback: Option<ResponseCallback>) {
        let callback = callback.map(|cb| Arc::new(Mutex::new(cb)));
        self.pending.lock().insert(id, callback);
    }

    /// Removes the pending entry for `id`.
    pub(crate) fn forget(&self, id: &MessageId) -> bool {
        self.pending.lock().remove(id).is_some()
    }

    #[inline]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Appends a listener for `method`.
    pub(crate) fn add_listener(&self, method: String, handler: NotificationHandler) {
        self.handlers.lock().entry(method).or_default().push(handler);
    }

    pub(crate) fn listener_count(&self, method: &str) -> usize {
        self.handlers.lock().get(method).map_or(0, Vec::len)
    }

    /// Splits, decodes and dispatches inbound data.
    ///
    /// The first malformed message or error response ends the call; later
    /// messages of the same batch are not processed.
    pub(crate) fn accept_response(&self, payload: Payload) -> Result<()> {
        match payload {
            Payload::Text(text) | Payload::Value(Value::String(text)) => {
                trace!(rx = %text, "Dispatching batch");
                for candidate in split_batch(&text) {
                    self.dispatch(decode(candidate)?)?;
                }
                Ok(())
            }
            Payload::Value(value) => self.dispatch(decode(value)?),
        }
    }

    fn dispatch(&self, envelope: Envelope) -> Result<()> {
        match envelope.into_message()? {
            Message::ErrorResponse(response) => {
                debug!(id = ?response.id, error = %response.error, "Error response received");
                Err(Error::rpc(response.error))
            }
            Message::Response(response) => {
                self.resolve(response);
                Ok(())
            }
            Message::Notification(notification) => {
                self.notify(&notification);
                Ok(())
            }
            // Decoding never yields requests; they are outbound only.
            Message::Request(request) => {
                debug!(id = %request.id, method = %request.method, "Ignoring inbound request");
                Ok(())
            }
        }
    }

    fn resolve(&self, response: Response) {
        let entry = {
            let mut pending = self.pending.lock();
            match self.retention {
                CallbackRetention::Retain => pending.get(&response.id).cloned(),
                CallbackRetention::OneShot => pending.remove(&response.id),
            }
        };

        match entry {
            Some(Some(callback)) => {
                let Some(mut callback) = callback.try_lock() else {
                    warn!(id = %response.id, "Callback already running, dropping response");
                    return;
                };
                trace!(id = %response.id, "Invoking response callback");
                (*callback)(response.result);
            }
            Some(None) => trace!(id = %response.id, "Response for request without callback"),
            None => debug!(id = %response.id, "Response for unknown request"),
        }
    }

    fn notify(&self, notification: &Notification) {
        let handlers = self
            .handlers
            .lock()
            .get(&notification.method)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(method = %notification.method, "No listeners for notification");
            return;
        }

        for handler in &handlers {
            handler(notification);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
