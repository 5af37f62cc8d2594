//! Stratum RPC - line-delimited JSON RPC client.
//!
//! This library implements the client side of a Stratum-style RPC protocol:
//! JSON requests tagged with string ids, responses matched back by id, and
//! server notifications fanned out to listeners. The protocol logic is
//! independent of the transport carrying it.
//!
//! # Architecture
//!
//! - **[`Connection`]**: id allocation, pending callbacks, listeners, dispatch
//! - **[`Adapter`]**: transport contract (`send`, `close`, optional `open`)
//! - **[`PollingAdapter`]**: batches sends and keeps a single poll in flight
//! - **[`SocketAdapter`] / [`WebSocketAdapter`]**: stream transports
//!
//! Key design principles:
//!
//! - Responses are resolved purely by id, never by arrival order
//! - A malformed message or error response ends the batch being dispatched
//! - Unknown response ids are tolerated
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use serde_json::json;
//! use stratum_rpc::{Connection, ConnectionConfig, Notification, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ConnectionConfig::new("pool.example.com").with_socket_port(3333);
//!     let connection = Connection::create(config).await?;
//!
//!     connection.add_event_listener("mining.notify", |notification: &Notification| {
//!         println!("new job: {:?}", notification.param(0));
//!     });
//!
//!     let subscription = connection
//!         .call("mining.subscribe", vec![json!("miner/1.0")], Duration::from_secs(10))
//!         .await?;
//!     println!("subscribed: {subscription}");
//!
//!     connection.close()
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Connection configuration and transport selection |
//! | [`connection`] | Correlation and dispatch |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Message id type |
//! | [`protocol`] | Message types and codec |
//! | [`transport`] | Adapter contract and transports |

// ============================================================================
// Modules
// ============================================================================

/// Connection configuration and transport selection.
pub mod config;

/// RPC connection: id correlation and notification dispatch.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe message identifiers.
pub mod identifiers;

/// Message types and codec.
pub mod protocol;

/// Transport adapters.
pub mod transport;

#[cfg(test)]
mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{CallbackRetention, ConnectionConfig, TransportKind};

// Connection
pub use connection::{Connection, NotificationHandler, ResponseCallback};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::MessageId;

// Protocol types
pub use protocol::{
    ErrorResponse, Message, MessageKind, Notification, Payload, Request, Response,
};

// Transport types
pub use transport::{
    Adapter, HttpPoller, InboundSink, PollCallback, Poller, PollingAdapter, SocketAdapter,
    WebSocketAdapter,
};
