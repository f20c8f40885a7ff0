use serde_json::Value;

use crate::error::{DecodeError, Result};
use crate::message::{Envelope, MessageType, CONTENT_TYPE};

/// Validate an inbound value as a protocol envelope of `expected` type.
///
/// Checks run in trust order:
/// 1. content marker — anything without it is [`DecodeError::Foreign`];
/// 2. namespace — a side with a configured `local_namespace` only accepts an
///    exact match; a side without one accepts any;
/// 3. message type tag;
/// 4. full envelope shape (field types, non-empty id, event payload present
///    exactly on the event-bearing types) — failures here are
///    [`DecodeError::Malformed`], the one case a receiver may treat as a
///    broken peer rather than channel noise.
pub fn decode(
    value: &Value,
    expected: MessageType,
    local_namespace: Option<&str>,
) -> Result<Envelope> {
    let object = value.as_object().ok_or(DecodeError::Foreign)?;

    let content_type = object.get("contentType").and_then(Value::as_str);
    if content_type != Some(CONTENT_TYPE) {
        return Err(DecodeError::Foreign);
    }

    if let Some(expected_namespace) = local_namespace {
        let got = object.get("namespace").and_then(Value::as_str);
        if got != Some(expected_namespace) {
            return Err(DecodeError::NamespaceMismatch {
                expected: expected_namespace.to_string(),
                got: got.map(str::to_string),
            });
        }
    }

    let tag = object
        .get("messageType")
        .and_then(Value::as_str)
        .ok_or(DecodeError::Malformed {
            expected,
            reason: "missing messageType".to_string(),
        })?;
    if tag != expected.as_str() {
        return Err(DecodeError::TypeMismatch {
            expected,
            got: tag.to_string(),
        });
    }

    let envelope: Envelope =
        serde_json::from_value(value.clone()).map_err(|err| DecodeError::Malformed {
            expected,
            reason: err.to_string(),
        })?;

    if envelope.id.is_empty() {
        return Err(DecodeError::Malformed {
            expected,
            reason: "empty message id".to_string(),
        });
    }
    if expected.carries_event() && envelope.event.is_none() {
        return Err(DecodeError::Malformed {
            expected,
            reason: "missing event payload".to_string(),
        });
    }

    Ok(envelope)
}
