use crate::message::MessageType;

/// Why an inbound value was not accepted as the expected protocol message.
///
/// The variants are ordered by how much the message looked like ours:
/// [`Foreign`](DecodeError::Foreign) traffic is expected on a shared channel
/// and safe to ignore, while [`Malformed`](DecodeError::Malformed) means a
/// message claimed the expected type and failed validation anyway.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not a protocol message at all (wrong shape or missing content marker).
    #[error("not a protocol message")]
    Foreign,

    /// Protocol message for a different namespace.
    #[error("namespace mismatch (expected \"{expected}\", got {got:?})")]
    NamespaceMismatch {
        expected: String,
        got: Option<String>,
    },

    /// Protocol message of another type.
    #[error("unexpected message type {got:?} (expected {expected})")]
    TypeMismatch {
        expected: MessageType,
        got: String,
    },

    /// Claimed the expected type but failed envelope validation.
    #[error("malformed {expected} message: {reason}")]
    Malformed {
        expected: MessageType,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
