//! Transport adapters.
//!
//! A [`Connection`](crate::Connection) talks to the server through exactly
//! one [`Adapter`]. Adapters move serialized messages out and hand raw
//! inbound data back through an [`InboundSink`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  send(json)   ┌──────────────┐        ┌──────────┐
//! │  Connection  │──────────────►│   Adapter    │◄──────►│  Server  │
//! │              │               │              │        │          │
//! │  Dispatcher  │◄──────────────│ InboundSink  │        │          │
//! └──────────────┘   raw text    └──────────────┘        └──────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `http` | [`Poller`] over HTTP |
//! | `polling` | Batching, single-flight polling adapter |
//! | `socket` | Line-delimited TCP adapter |
//! | `websocket` | WebSocket text-frame adapter |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// HTTP round-trip primitive for the polling adapter.
pub mod http;

/// Batching, single-flight polling adapter.
pub mod polling;

/// Line-delimited TCP adapter.
pub mod socket;

/// WebSocket adapter.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use http::HttpPoller;
pub use polling::{PollCallback, Poller, PollingAdapter};
pub use socket::SocketAdapter;
pub use websocket::WebSocketAdapter;

// ============================================================================
// Types
// ============================================================================

/// Inbound data path from an adapter to a connection.
///
/// Called with each raw payload as received; batching and decoding happen on
/// the connection side.
pub type InboundSink = Arc<dyn Fn(String) + Send + Sync>;

/// Frame terminator appended by stream transports.
pub(crate) const LINE_TERMINATOR: &str = "\r\n";

// ============================================================================
// Adapter
// ============================================================================

/// Capability contract every transport satisfies.
pub trait Adapter: Send + Sync {
    /// Transmits one serialized message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// once the adapter has been closed.
    fn send(&self, message: String) -> Result<()>;

    /// Closes the transport.
    fn close(&self) -> Result<()>;

    /// Opens the transport.
    ///
    /// Adapters that connect on construction need not override this.
    fn open(&self) -> Result<()> {
        Ok(())
    }
}

impl<A: Adapter + ?Sized> Adapter for Arc<A> {
    fn send(&self, message: String) -> Result<()> {
        (**self).send(message)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn open(&self) -> Result<()> {
        (**self).open()
    }
}
