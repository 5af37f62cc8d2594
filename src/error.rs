//! Error types for the Stratum RPC client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use stratum_rpc::{Connection, Result};
//!
//! fn feed(connection: &Connection, body: &str) -> Result<()> {
//!     connection.accept_response(body)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Protocol | [`Error::MessageFormat`], [`Error::Rpc`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RequestTimeout`], [`Error::ChannelClosed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::InvalidUrl`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::MessageId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a [`ConnectionConfig`](crate::ConnectionConfig) is
    /// invalid or a transport is built outside a tokio runtime.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed inbound message.
    ///
    /// Returned for empty input, non-JSON text, or an `id` that is neither
    /// `null`, a non-empty string, nor a number. Aborts the rest of the batch
    /// being dispatched.
    #[error("Message format error: {message}")]
    MessageFormat {
        /// Description of the format violation.
        message: String,
    },

    /// The server answered with a truthy `error` field.
    ///
    /// Aborts the rest of the batch being dispatched.
    #[error("RPC exception: {error}")]
    Rpc {
        /// The raw `error` payload.
        error: Value,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport could not be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The adapter has been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A `call` did not receive its response in time.
    #[error("Request {id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        id: MessageId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a message format error.
    #[inline]
    pub fn message_format(message: impl Into<String>) -> Self {
        Self::MessageFormat {
            message: message.into(),
        }
    }

    /// Creates an RPC exception from the server's `error` payload.
    #[inline]
    pub fn rpc(error: Value) -> Self {
        Self::Rpc { error }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(id: MessageId, timeout_ms: u64) -> Self {
        Self::RequestTimeout { id, timeout_ms }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a message format error.
    #[inline]
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::MessageFormat { .. })
    }

    /// Returns `true` if the server reported an RPC error.
    #[inline]
    #[must_use]
    pub fn is_rpc_error(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::RequestTimeout { .. }
                | Self::ChannelClosed(_)
                | Self::WebSocket(_)
                | Self::Http(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_rpc_error_display() {
        let err = Error::rpc(json!([21, "Job not found", null]));
        assert_eq!(err.to_string(), r#"RPC exception: [21,"Job not found",null]"#);
    }

    #[test]
    fn test_message_format_display() {
        let err = Error::message_format("can't parse string message: x");
        assert_eq!(
            err.to_string(),
            "Message format error: can't parse string message: x"
        );
    }

    #[test]
    fn test_predicates() {
        assert!(Error::message_format("x").is_format_error());
        assert!(!Error::message_format("x").is_rpc_error());
        assert!(Error::rpc(json!("boom")).is_rpc_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("x").is_connection_error());

        let timeout = Error::request_timeout(MessageId::from_counter(3), 1000);
        assert!(timeout.is_timeout());
        assert!(timeout.is_connection_error());
    }

    #[tokio::test]
    async fn test_channel_closed_is_connection_error() {
        let (tx, rx) = tokio::sync::oneshot::channel::<Value>();
        drop(tx);

        let err: Error = rx.await.expect_err("sender dropped").into();
        assert!(matches!(err, Error::ChannelClosed(_)));
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::ConnectionRefused, "refused");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
