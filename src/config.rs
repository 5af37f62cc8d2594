//! Connection configuration and transport selection.
//!
//! Mirrors the `{url, socketPort, webSocketPort}` object servers hand out to
//! clients, so a config can be deserialized straight from JSON.
//!
//! # Example
//!
//! ```
//! use stratum_rpc::{ConnectionConfig, TransportKind};
//!
//! let config = ConnectionConfig::new("pool.example.com")
//!     .with_socket_port(3333)
//!     .with_web_socket_port(8080);
//!
//! assert_eq!(config.resolve_transport(), TransportKind::Socket);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default interval between poll ticks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default timeout for one poll round trip.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// TransportKind
// ============================================================================

/// Transport used by a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportKind {
    /// Socket if a socket port is set, else WebSocket if a WebSocket port is
    /// set, else polling.
    #[default]
    Auto,
    /// Line-delimited TCP.
    Socket,
    /// WebSocket text frames.
    WebSocket,
    /// HTTP polling.
    Polling,
}

// ============================================================================
// CallbackRetention
// ============================================================================

/// What happens to a pending callback once a response matches it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallbackRetention {
    /// Keep the entry so repeated responses with the same id are delivered.
    #[default]
    Retain,
    /// Remove the entry on the first match.
    OneShot,
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Connection configuration.
///
/// `url` is a host name for the socket and WebSocket transports and a full
/// endpoint URL for polling.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    /// Host, or polling endpoint.
    pub url: String,

    /// TCP port for the socket transport.
    pub socket_port: Option<u16>,

    /// Port for the WebSocket transport.
    pub web_socket_port: Option<u16>,

    /// Transport selection.
    pub transport: TransportKind,

    /// Poll tick interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Poll round-trip timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Pending callback policy.
    pub retention: CallbackRetention,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            socket_port: None,
            web_socket_port: None,
            transport: TransportKind::Auto,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            retention: CallbackRetention::Retain,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionConfig {
    /// Creates a configuration for `url` with default settings.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionConfig {
    /// Sets the socket port.
    #[inline]
    #[must_use]
    pub fn with_socket_port(mut self, port: u16) -> Self {
        self.socket_port = Some(port);
        self
    }

    /// Sets the WebSocket port.
    #[inline]
    #[must_use]
    pub fn with_web_socket_port(mut self, port: u16) -> Self {
        self.web_socket_port = Some(port);
        self
    }

    /// Forces a transport.
    #[inline]
    #[must_use]
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the poll tick interval.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the poll round-trip timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the pending callback policy.
    #[inline]
    #[must_use]
    pub fn with_retention(mut self, retention: CallbackRetention) -> Self {
        self.retention = retention;
        self
    }
}

// ============================================================================
// Resolution & Validation
// ============================================================================

impl ConnectionConfig {
    /// Resolves [`TransportKind::Auto`] to a concrete transport.
    #[must_use]
    pub fn resolve_transport(&self) -> TransportKind {
        match self.transport {
            TransportKind::Auto if self.socket_port.is_some() => TransportKind::Socket,
            TransportKind::Auto if self.web_socket_port.is_some() => TransportKind::WebSocket,
            TransportKind::Auto => TransportKind::Polling,
            explicit => explicit,
        }
    }

    /// Returns the poll tick interval.
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the poll round-trip timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns the WebSocket URL, `ws://{url}:{port}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no WebSocket port is set.
    pub fn web_socket_url(&self) -> Result<String> {
        let port = self
            .web_socket_port
            .ok_or_else(|| Error::config("WebSocket transport requires webSocketPort"))?;
        Ok(format!("ws://{}:{port}", self.url))
    }

    /// Returns the polling endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` is not an absolute URL.
    pub fn polling_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.url)?)
    }

    /// Validates the configuration for its resolved transport.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `url` is empty, a required port is missing, or
    ///   a polling interval or timeout is zero
    /// - [`Error::InvalidUrl`] if the polling endpoint does not parse
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::config("url is required"));
        }

        match self.resolve_transport() {
            TransportKind::Socket if self.socket_port.is_none() => {
                Err(Error::config("Socket transport requires socketPort"))
            }
            TransportKind::WebSocket => self.web_socket_url().map(drop),
            TransportKind::Polling => {
                if self.poll_interval_ms == 0 {
                    return Err(Error::config("pollIntervalMs must be greater than zero"));
                }
                if self.request_timeout_ms == 0 {
                    return Err(Error::config("requestTimeoutMs must be greater than zero"));
                }
                self.polling_url().map(drop)
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolution() {
        let config = ConnectionConfig::new("pool.example.com");
        assert_eq!(config.resolve_transport(), TransportKind::Polling);

        let config = config.with_web_socket_port(8080);
        assert_eq!(config.resolve_transport(), TransportKind::WebSocket);

        let config = config.with_socket_port(3333);
        assert_eq!(config.resolve_transport(), TransportKind::Socket);

        let config = config.with_transport(TransportKind::Polling);
        assert_eq!(config.resolve_transport(), TransportKind::Polling);
    }

    #[test]
    fn test_durations_saturate() {
        let config = ConnectionConfig::new("http://pool.example.com")
            .with_poll_interval(Duration::MAX)
            .with_request_timeout(Duration::from_millis(250));

        assert_eq!(config.poll_interval_ms, u64::MAX);
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_json() {
        let config = ConnectionConfig::from_json(
            r#"{"url": "pool.example.com", "socketPort": 3333, "webSocketPort": 8080, "retention": "oneShot"}"#,
        )
        .expect("parse");

        assert_eq!(config.url, "pool.example.com");
        assert_eq!(config.socket_port, Some(3333));
        assert_eq!(config.web_socket_port, Some(8080));
        assert_eq!(config.transport, TransportKind::Auto);
        assert_eq!(config.retention, CallbackRetention::OneShot);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_web_socket_url() {
        let config = ConnectionConfig::new("pool.example.com").with_web_socket_port(8080);
        assert_eq!(config.web_socket_url().expect("url"), "ws://pool.example.com:8080");
    }

    #[test]
    fn test_validate() {
        assert!(ConnectionConfig::default().validate().is_err());

        let polling = ConnectionConfig::new("http://pool.example.com/poll");
        assert!(polling.validate().is_ok());

        let bad_polling = ConnectionConfig::new("pool.example.com");
        assert!(matches!(bad_polling.validate(), Err(Error::InvalidUrl(_))));

        let zero_interval = polling.clone().with_poll_interval(Duration::ZERO);
        assert!(matches!(zero_interval.validate(), Err(Error::Config { .. })));

        let forced_socket = ConnectionConfig::new("pool.example.com").with_transport(TransportKind::Socket);
        assert!(matches!(forced_socket.validate(), Err(Error::Config { .. })));

        let socket = ConnectionConfig::new("pool.example.com").with_socket_port(3333);
        assert!(socket.validate().is_ok());
    }
}
