use std::fmt;

use serde_json::Value;

use crate::window::Window;

/// A message delivered to a window's message listeners.
///
/// `origin` is always the *sender's* origin, stamped at delivery time; it is
/// the only field a receiver may base trust decisions on.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub data: Value,
    pub origin: String,
    pub source: MessageSource,
}

impl MessageEvent {
    /// An event whose source is a window, as produced by
    /// [`Window::post_message`](crate::Window::post_message).
    pub fn from_window(data: Value, origin: impl Into<String>, source: Window) -> Self {
        Self {
            data,
            origin: origin.into(),
            source: MessageSource::Window(source),
        }
    }

    /// An event originating from a transferred message port.
    pub fn from_port(data: Value, origin: impl Into<String>) -> Self {
        Self {
            data,
            origin: origin.into(),
            source: MessageSource::Port,
        }
    }

    /// An event originating from a service worker.
    pub fn from_worker(data: Value, origin: impl Into<String>) -> Self {
        Self {
            data,
            origin: origin.into(),
            source: MessageSource::Worker,
        }
    }
}

/// The kind of endpoint a message came from.
///
/// Only window sources can be answered with an origin-addressed reply;
/// handshake logic uses this to ignore traffic it cannot respond to.
#[derive(Clone)]
pub enum MessageSource {
    /// Another window; carries a handle to it.
    Window(Window),
    /// A transferred message port.
    Port,
    /// A service worker.
    Worker,
}

impl MessageSource {
    /// The sending window, when there is one.
    pub fn window(&self) -> Option<&Window> {
        match self {
            MessageSource::Window(window) => Some(window),
            _ => None,
        }
    }
}

impl fmt::Debug for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSource::Window(window) => write!(f, "Window({})", window.origin()),
            MessageSource::Port => write!(f, "Port"),
            MessageSource::Worker => write!(f, "Worker"),
        }
    }
}
