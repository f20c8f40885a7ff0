use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::message_id;

/// Fixed marker distinguishing protocol messages from unrelated traffic on
/// the shared channel.
pub const CONTENT_TYPE: &str = "application/x-framelink+json";

/// The four wire message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    HandshakeRequest,
    HandshakeReply,
    ParentOriginatedEvent,
    ChildOriginatedEvent,
}

impl MessageType {
    /// The exact wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::HandshakeRequest => "handshake-request",
            MessageType::HandshakeReply => "handshake-reply",
            MessageType::ParentOriginatedEvent => "parent-originated-event",
            MessageType::ChildOriginatedEvent => "child-originated-event",
        }
    }

    /// True for the two types that carry an event payload.
    pub fn carries_event(&self) -> bool {
        matches!(
            self,
            MessageType::ParentOriginatedEvent | MessageType::ChildOriginatedEvent
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application event carried by the two `*-originated-event` types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub name: String,
    pub data: Value,
}

/// The structured wire message exchanged between parent and child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub id: String,
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventPayload>,
}

impl Envelope {
    fn stamped(message_type: MessageType, namespace: Option<&str>, event: Option<EventPayload>) -> Self {
        Self {
            content_type: CONTENT_TYPE.to_string(),
            namespace: namespace.map(str::to_string),
            id: message_id(namespace),
            message_type,
            event,
        }
    }

    /// A fresh handshake request.
    pub fn handshake_request(namespace: Option<&str>) -> Self {
        Self::stamped(MessageType::HandshakeRequest, namespace, None)
    }

    /// A fresh handshake reply.
    pub fn handshake_reply(namespace: Option<&str>) -> Self {
        Self::stamped(MessageType::HandshakeReply, namespace, None)
    }

    /// A fresh application event envelope. `message_type` should be one of
    /// the `*-originated-event` types.
    pub fn event(
        message_type: MessageType,
        namespace: Option<&str>,
        name: impl Into<String>,
        data: Value,
    ) -> Self {
        Self::stamped(
            message_type,
            namespace,
            Some(EventPayload {
                name: name.into(),
                data,
            }),
        )
    }

    /// Render the wire form. Infallible: every field maps directly onto
    /// JSON.
    pub fn to_value(&self) -> Value {
        let mut wire = serde_json::json!({
            "contentType": self.content_type,
            "id": self.id,
            "messageType": self.message_type.as_str(),
        });
        if let Some(namespace) = &self.namespace {
            wire["namespace"] = Value::String(namespace.clone());
        }
        if let Some(event) = &self.event {
            wire["event"] = serde_json::json!({
                "name": event.name,
                "data": event.data,
            });
        }
        wire
    }
}
