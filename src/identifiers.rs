//! Type-safe message identifiers.
//!
//! Outgoing requests are tagged with the decimal string form of a per-connection
//! counter. Servers may echo the id back as a string or as a JSON number; both
//! normalize to the same [`MessageId`] so `{"id": 1}` and `{"id": "1"}` match
//! the same pending request.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

// ============================================================================
// MessageId
// ============================================================================

/// Identifier correlating a response with its request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Creates an id from a counter value.
    #[inline]
    #[must_use]
    pub fn from_counter(counter: u64) -> Self {
        Self(counter.to_string())
    }

    /// Creates an id from a wire value.
    ///
    /// Accepts non-empty strings and non-zero numbers. Returns `None` for
    /// anything else, including `null`. Whole numbers written with a fraction
    /// (`1.0`) normalize to their integer form.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Self::from_number(n),
            _ => None,
        }
    }

    fn from_number(n: &Number) -> Option<Self> {
        if let Some(i) = n.as_i64() {
            return (i != 0).then(|| Self(i.to_string()));
        }
        if let Some(u) = n.as_u64() {
            return Some(Self(u.to_string()));
        }

        let f = n.as_f64().filter(|f| *f != 0.0)?;
        // Beyond 2^53 the float no longer holds an exact integer.
        if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
            #[allow(clippy::cast_possible_truncation)]
            return Some(Self((f as i64).to_string()));
        }
        Some(Self(n.to_string()))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for MessageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Tests
// ============================================================================
