//! RPC connection over a transport adapter.
//!
//! A [`Connection`] allocates request ids, keeps the table of pending
//! callbacks, holds the notification listeners, and dispatches whatever the
//! adapter delivers back.
//!
//! # Lifecycle
//!
//! 1. [`Connection::create`] (or [`Connection::with_adapter`]) builds the
//!    adapter with its inbound path wired to the connection
//! 2. [`Connection::send`] / [`Connection::call`] issue requests
//! 3. Inbound data reaches [`Connection::accept_response`]
//! 4. [`Connection::close`] closes the adapter
//!
//! The connection does not guard against sends after `close`; the adapter
//! decides how to react.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::{CallbackRetention, ConnectionConfig, TransportKind};
use crate::error::{Error, Result};
use crate::identifiers::MessageId;
use crate::protocol::{Notification, Payload, Request};
use crate::transport::{
    Adapter, HttpPoller, InboundSink, PollingAdapter, SocketAdapter, WebSocketAdapter,
};

// ============================================================================
// Submodules
// ============================================================================

mod dispatch;

pub use dispatch::{NotificationHandler, ResponseCallback};

use dispatch::Dispatcher;

// ============================================================================
// Connection
// ============================================================================

/// Client side of a Stratum-style RPC session.
///
/// Cheap to clone; clones share the adapter, id counter, pending table and
/// listeners.
#[derive(Clone)]
pub struct Connection {
    /// Transport used for outgoing messages.
    adapter: Arc<dyn Adapter>,
    /// Correlation and fan-out state.
    dispatcher: Arc<Dispatcher>,
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl Connection {
    /// Creates a connection over an adapter with default retention.
    ///
    /// Inbound data must be routed to [`accept_response`](Self::accept_response)
    /// or through [`inbound`](Self::inbound).
    #[must_use]
    pub fn new<A: Adapter + 'static>(adapter: A) -> Self {
        Self::with_retention(adapter, CallbackRetention::default())
    }

    /// Creates a connection over an adapter with an explicit retention policy.
    #[must_use]
    pub fn with_retention<A: Adapter + 'static>(adapter: A, retention: CallbackRetention) -> Self {
        Self {
            adapter: Arc::new(adapter),
            dispatcher: Arc::new(Dispatcher::new(retention)),
        }
    }

    /// Creates a connection whose adapter is built around its inbound sink.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let connection = Connection::with_adapter(CallbackRetention::Retain, |sink| {
    ///     Ok(PollingAdapter::new(url, poller, sink))
    /// })?;
    /// ```
    ///
    /// # Errors
    ///
    /// Propagates any error returned by `build`.
    pub fn with_adapter<A, F>(retention: CallbackRetention, build: F) -> Result<Self>
    where
        A: Adapter + 'static,
        F: FnOnce(InboundSink) -> Result<A>,
    {
        let dispatcher = Arc::new(Dispatcher::new(retention));
        let adapter = build(dispatcher.sink())?;

        Ok(Self {
            adapter: Arc::new(adapter),
            dispatcher,
        })
    }

    /// Creates a connection from configuration, picking the transport.
    ///
    /// For polling, a ticker is spawned with the configured interval.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] / [`Error::InvalidUrl`] if the configuration is invalid
    /// - [`Error::Connection`] / [`Error::WebSocket`] if the transport cannot connect
    pub async fn create(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let dispatcher = Arc::new(Dispatcher::new(config.retention));
        let sink = dispatcher.sink();
        let transport = config.resolve_transport();

        let adapter: Arc<dyn Adapter> = match transport {
            TransportKind::Socket => {
                let port = config
                    .socket_port
                    .ok_or_else(|| Error::config("Socket transport requires socketPort"))?;
                Arc::new(SocketAdapter::connect(&config.url, port, sink).await?)
            }

            TransportKind::WebSocket => {
                Arc::new(WebSocketAdapter::connect(&config.web_socket_url()?, sink).await?)
            }

            TransportKind::Polling | TransportKind::Auto => {
                let poller = HttpPoller::new(config.request_timeout())?;
                let adapter = PollingAdapter::new(config.polling_url()?, Arc::new(poller), sink);
                adapter.spawn_ticker(config.poll_interval());
                Arc::new(adapter)
            }
        };

        adapter.open()?;

        info!(?transport, url = %config.url, "Connection created");

        Ok(Self {
            adapter,
            dispatcher,
        })
    }
}

// ============================================================================
// Connection - Requests
// ============================================================================

impl Connection {
    /// Sends a request, registering `callback` under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns the adapter's error if transmission fails; the pending entry
    /// is removed in that case.
    pub fn send(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
        callback: Option<ResponseCallback>,
    ) -> Result<MessageId> {
        let id = self.dispatcher.allocate_id();
        let request = Request::new(method, params, id.clone());
        let json = request.to_json()?;

        self.dispatcher.register(id.clone(), callback);

        if let Err(e) = self.adapter.send(json) {
            self.dispatcher.forget(&id);
            return Err(e);
        }

        debug!(id = %id, method = %request.method, "Request sent");
        Ok(id)
    }

    /// Sends a request with a closure callback.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn send_with<F>(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
        callback: F,
    ) -> Result<MessageId>
    where
        F: FnMut(Value) + Send + 'static,
    {
        self.send(method, params, Some(Box::new(callback)))
    }

    /// Sends a request and waits for its result.
    ///
    /// The pending entry is removed once the call returns, whatever the
    /// retention policy.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if no response arrives within `request_timeout`
    /// - the adapter's error if transmission fails
    pub async fn call(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
        request_timeout: Duration,
    ) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);

        let id = self.send_with(method, params, move |result| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(result);
            }
        })?;

        let outcome = timeout(request_timeout, rx).await;
        self.dispatcher.forget(&id);

        match outcome {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::request_timeout(
                id,
                u64::try_from(request_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Closes the underlying adapter.
    ///
    /// # Errors
    ///
    /// Returns the adapter's error.
    pub fn close(&self) -> Result<()> {
        debug!(pending = self.pending_count(), "Closing connection");
        self.adapter.close()
    }
}

// ============================================================================
// Connection - Notifications & Dispatch
// ============================================================================

impl Connection {
    /// Registers a listener for notifications named `name`.
    ///
    /// Listeners accumulate and run in registration order.
    pub fn add_event_listener<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.dispatcher.add_listener(name.into(), Arc::new(handler));
    }

    /// Dispatches raw inbound data.
    ///
    /// Text is split into a newline-delimited batch; a JSON value is a single
    /// message.
    ///
    /// # Errors
    ///
    /// - [`Error::MessageFormat`] on the first malformed message
    /// - [`Error::Rpc`] on the first error response
    ///
    /// Either one stops processing of the remaining batch.
    pub fn accept_response(&self, raw: impl Into<Payload>) -> Result<()> {
        self.dispatcher.accept_response(raw.into())
    }

    /// Returns a sink routing raw text into this connection.
    ///
    /// Dispatch errors are logged rather than returned.
    #[must_use]
    pub fn inbound(&self) -> InboundSink {
        self.dispatcher.sink()
    }

    /// Removes the pending entry for `id`.
    ///
    /// Returns `true` if an entry existed.
    pub fn forget(&self, id: &MessageId) -> bool {
        self.dispatcher.forget(id)
    }

    /// Returns the number of pending entries.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.dispatcher.pending_count()
    }

    /// Returns the number of listeners registered for `name`.
    #[inline]
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.dispatcher.listener_count(name)
    }

    /// Returns the pending callback policy.
    #[inline]
    #[must_use]
    pub fn retention(&self) -> CallbackRetention {
        self.dispatcher.retention()
    }
}

// ============================================================================
// Tests
// ============================================================================
