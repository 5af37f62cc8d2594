//! Line-delimited JSON protocol message types.
//!
//! This module defines the message format exchanged between the client
//! and a Stratum-style server.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Client → Server | Method call tagged with a string `id` |
//! | `Response` | Server → Client | Result for the request with the same `id` |
//! | `ErrorResponse` | Server → Client | Truthy `error` field, raised as [`Error::Rpc`](crate::Error::Rpc) |
//! | `Notification` | Server → Client | Push message with `id: null` |
//!
//! A response body may carry several messages joined by newlines; see
//! [`split_batch`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Decoding, validation and classification |
//! | `message` | Typed message variants |

// ============================================================================
// Submodules
// ============================================================================

/// Decoding, validation and classification.
pub mod codec;

/// Typed message variants.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{Envelope, classify, decode, is_truthy, split_batch};
pub use message::{
    ErrorResponse, Message, MessageKind, Notification, Payload, Request, Response,
};
