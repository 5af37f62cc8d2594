//! Message variants exchanged with the server.
//!
//! # Format
//!
//! | Variant | Wire shape |
//! |---------|------------|
//! | [`Request`] | `{"method": "...", "params": [...], "id": "0"}` |
//! | [`Response`] | `{"id": "0", "result": ...}` |
//! | [`ErrorResponse`] | `{"id": "0", "error": ...}` |
//! | [`Notification`] | `{"id": null, "method": "...", "params": [...]}` |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Value, to_string};

use crate::error::Result;
use crate::identifiers::MessageId;

// ============================================================================
// Message
// ============================================================================

/// A protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Client request.
    Request(Request),
    /// Successful response to a request.
    Response(Response),
    /// Response carrying a truthy `error` field.
    ErrorResponse(ErrorResponse),
    /// Server push with `id: null`.
    Notification(Notification),
}

/// Classification of a decoded inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Non-null `id`, no error.
    Response,
    /// Truthy `error` field, regardless of `id`.
    ErrorResponse,
    /// `id` is `null`.
    Notification,
}

// ============================================================================
// Request
// ============================================================================

/// An outgoing request.
///
/// Serialized field order is `method`, `params`, `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Method name.
    pub method: String,

    /// Positional parameters.
    pub params: Vec<Value>,

    /// Correlation id.
    pub id: MessageId,
}

impl Request {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: MessageId) -> Self {
        Self {
            method: method.into(),
            params,
            id,
        }
    }

    /// Serializes the request to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request being answered.
    pub id: MessageId,

    /// Result payload, `null` when absent.
    pub result: Value,
}

/// A response carrying an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// Id of the request being answered, if any.
    pub id: Option<MessageId>,

    /// The raw `error` payload.
    pub error: Value,
}

// ============================================================================
// Notification
// ============================================================================

/// A server notification, delivered to every listener registered for
/// its method.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Notification name, e.g. `mining.notify`.
    pub method: String,

    /// Positional parameters.
    pub params: Vec<Value>,
}

impl Notification {
    /// Returns the parameter at `index`.
    #[inline]
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Raw inbound data handed to the dispatcher.
///
/// Text is treated as a newline-delimited batch; a value is a single
/// already-parsed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw text as received from a transport.
    Text(String),
    /// A pre-parsed JSON message.
    Value(Value),
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
