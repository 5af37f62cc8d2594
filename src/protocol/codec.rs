//! Decoding and classification of inbound messages.
//!
//! Decoding is split in two steps: [`decode`] validates the shape every
//! message shares (a JSON object with a well-formed `id`), and
//! [`Envelope::into_message`] builds the typed variant chosen by
//! [`classify`].

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value, from_str};

use crate::error::{Error, Result};
use crate::identifiers::MessageId;

use super::message::{ErrorResponse, Message, MessageKind, Notification, Payload, Response};

// ============================================================================
// Constants
// ============================================================================

const NOT_A_MESSAGE: &str = "message must be a non-empty string or object";

const BAD_ID: &str = "message .id must be null, a non-empty string or a number";

// ============================================================================
// Envelope
// ============================================================================

/// A decoded message whose `id` has been validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    id: Option<MessageId>,
    fields: Map<String, Value>,
}

impl Envelope {
    /// Returns the message id, `None` for notifications.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&MessageId> {
        self.id.as_ref()
    }

    /// Returns a raw field of the message.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the classification of this message.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        classify(self)
    }

    /// Converts the envelope into its typed variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageFormat`] if a notification lacks a string
    /// `method` or carries non-array `params`.
    pub fn into_message(mut self) -> Result<Message> {
        match classify(&self) {
            MessageKind::ErrorResponse => Ok(Message::ErrorResponse(ErrorResponse {
                id: self.id,
                error: self.fields.remove("error").unwrap_or(Value::Null),
            })),

            MessageKind::Response => {
                let id = self.id.ok_or_else(|| Error::message_format(BAD_ID))?;
                Ok(Message::Response(Response {
                    id,
                    result: self.fields.remove("result").unwrap_or(Value::Null),
                }))
            }

            MessageKind::Notification => {
                let method = match self.fields.remove("method") {
                    Some(Value::String(method)) => method,
                    _ => {
                        return Err(Error::message_format(
                            "notification .method must be a string",
                        ));
                    }
                };

                let params = match self.fields.remove("params") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(params)) => params,
                    Some(other) => {
                        return Err(Error::message_format(format!(
                            "notification .params must be an array, got: {other}"
                        )));
                    }
                };

                Ok(Message::Notification(Notification { method, params }))
            }
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Decodes a payload into a validated [`Envelope`].
///
/// # Errors
///
/// Returns [`Error::MessageFormat`] if the payload is empty or falsy, is not
/// valid JSON, is not a JSON object, or has a missing or malformed `id`.
pub fn decode(payload: impl Into<Payload>) -> Result<Envelope> {
    let value = match payload.into() {
        Payload::Text(text) => parse_text(&text)?,
        Payload::Value(Value::String(text)) => parse_text(&text)?,
        Payload::Value(value) => value,
    };

    let Value::Object(fields) = value else {
        return Err(Error::message_format(NOT_A_MESSAGE));
    };

    let id = match fields.get("id") {
        Some(Value::Null) => None,
        Some(value) => Some(MessageId::from_value(value).ok_or_else(|| Error::message_format(BAD_ID))?),
        None => return Err(Error::message_format(BAD_ID)),
    };

    Ok(Envelope { id, fields })
}

/// Splits a raw response body into candidate messages.
///
/// The whole body is trimmed first, then split on `'\n'`. An empty body
/// yields a single empty candidate, which fails to decode.
#[must_use]
pub fn split_batch(raw: &str) -> Vec<&str> {
    raw.trim().split('\n').collect()
}

/// Classifies a decoded message.
///
/// A truthy `error` wins over everything else; otherwise a non-null id is a
/// response and a null id is a notification.
#[must_use]
pub fn classify(envelope: &Envelope) -> MessageKind {
    if envelope.fields.get("error").is_some_and(is_truthy) {
        MessageKind::ErrorResponse
    } else if envelope.id.is_some() {
        MessageKind::Response
    } else {
        MessageKind::Notification
    }
}

/// Returns `true` unless the value is `null`, `false`, zero or `""`.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn parse_text(text: &str) -> Result<Value> {
    if text.is_empty() {
        return Err(Error::message_format(NOT_A_MESSAGE));
    }

    from_str(text).map_err(|_| Error::message_format(format!("can't parse string message: {text}")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_decode_rejects_malformed_input() {
        for input in ["", "Non-JSON string", "{}", "1", "null", "[1]", r#"{"id":""}"#, r#"{"id":true}"#] {
            let err = decode(input).expect_err(input);
            assert!(err.is_format_error(), "{input}: {err}");
        }

        for value in [json!(null), json!(false), json!(0), json!(""), json!({"id": {}})] {
            assert!(decode(value.clone()).expect_err("value").is_format_error(), "{value}");
        }
    }

    #[test]
    fn test_decode_parse_error_carries_text() {
        let err = decode("garbage").expect_err("garbage");
        assert!(err.to_string().contains("garbage"));
    }

    #[test]
    fn test_decode_accepts_wellformed() {
        let envelope = decode(r#"{"id":1}"#).expect("numeric id");
        assert_eq!(envelope.id().map(MessageId::as_str), Some("1"));

        let envelope = decode(json!({"id": "1"})).expect("string id");
        assert_eq!(envelope.id().map(MessageId::as_str), Some("1"));

        let envelope = decode(json!({"id": null, "method": "n"})).expect("notification");
        assert!(envelope.id().is_none());
    }

    #[test]
    fn test_decode_string_value_is_parsed() {
        let envelope = decode(json!(r#"{"id":"4","result":true}"#)).expect("string value");
        assert_eq!(envelope.get("result"), Some(&json!(true)));
    }

    #[test]
    fn test_split_batch() {
        assert_eq!(split_batch("{\"id\":1}\n{\"id\":2}"), vec!["{\"id\":1}", "{\"id\":2}"]);
        assert_eq!(split_batch("  {\"id\":1}\n  "), vec!["{\"id\":1}"]);
        assert_eq!(split_batch(""), vec![""]);
    }

    #[test]
    fn test_classify() {
        let response = decode(json!({"id": "1", "result": 5, "error": null})).expect("decode");
        assert_eq!(classify(&response), MessageKind::Response);

        let error = decode(json!({"id": "1", "error": [20, "Other", null]})).expect("decode");
        assert_eq!(classify(&error), MessageKind::ErrorResponse);

        let notification = decode(json!({"id": null, "method": "n", "params": []})).expect("decode");
        assert_eq!(classify(&notification), MessageKind::Notification);

        let null_id_error = decode(json!({"id": null, "error": "bad"})).expect("decode");
        assert_eq!(null_id_error.kind(), MessageKind::ErrorResponse);
    }

    #[test]
    fn test_into_message_variants() {
        let message = decode(json!({"id": "2", "result": "x"}))
            .and_then(Envelope::into_message)
            .expect("response");
        assert_eq!(
            message,
            Message::Response(Response {
                id: MessageId::from("2"),
                result: json!("x"),
            })
        );

        let message = decode(json!({"id": "3"}))
            .and_then(Envelope::into_message)
            .expect("response without result");
        assert!(matches!(message, Message::Response(Response { result: Value::Null, .. })));

        let message = decode(json!({"id": null, "method": "n"}))
            .and_then(Envelope::into_message)
            .expect("notification without params");
        assert_eq!(
            message,
            Message::Notification(Notification {
                method: "n".into(),
                params: Vec::new(),
            })
        );
    }

    #[test]
    fn test_into_message_rejects_bad_notifications() {
        let err = decode(json!({"id": null}))
            .and_then(Envelope::into_message)
            .expect_err("missing method");
        assert!(err.is_format_error());

        let err = decode(json!({"id": null, "method": "n", "params": {"a": 1}}))
            .and_then(Envelope::into_message)
            .expect_err("object params");
        assert!(err.is_format_error());
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!("e")));
        assert!(is_truthy(&json!(-1)));
    }

    proptest! {
        #[test]
        fn prop_split_batch_yields_one_candidate_per_line(ids in proptest::collection::vec(1u32..10_000, 1..20)) {
            let body = ids
                .iter()
                .map(|id| format!("{{\"id\":{id}}}"))
                .collect::<Vec<_>>()
                .join("\n");

            let lines = split_batch(&body);
            prop_assert_eq!(lines.len(), ids.len());
            for line in lines {
                prop_assert!(decode(line).is_ok());
            }
        }
    }
}
