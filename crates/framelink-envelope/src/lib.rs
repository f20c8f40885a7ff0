//! Wire envelope codec for the cross-window protocol.
//!
//! Every protocol message travels as a JSON object stamped with:
//! - A fixed `contentType` marker separating protocol traffic from whatever
//!   else shares the channel
//! - A `messageType` tag (handshake request/reply, parent/child event)
//! - A unique `id`, and optionally a `namespace` scoping the channel
//!
//! Decoding distinguishes foreign traffic (ignorable by design) from
//! protocol messages that are malformed (a handshake engine may want to
//! reject those). Nothing here throws; every failure is a value.

pub mod codec;
pub mod error;
pub mod id;
pub mod message;

pub use codec::decode;
pub use error::DecodeError;
pub use id::message_id;
pub use message::{Envelope, EventPayload, MessageType, CONTENT_TYPE};
