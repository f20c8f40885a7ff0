use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use framelink_channel::Window;
use framelink_envelope::MessageType;
use framelink_schema::EventSchemas;

use crate::error::{PeerError, Result};
use crate::handshake;
use crate::pending::Pending;
use crate::router::{self, Listeners, Subscription};

/// Child-side channel configuration.
#[derive(Debug, Clone, Default)]
pub struct ParentOptions {
    /// Scopes this channel when several share one window pair.
    pub namespace: Option<String>,
}

impl ParentOptions {
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }
}

/// Open the child end of a channel to the embedding document.
///
/// Fails fast with [`PeerError::NoParentWindow`] when `child` is not
/// embedded. Otherwise the returned [`Pending`] settles once a handshake
/// request arrives: with a [`ParentConnection`] on a valid request, or with
/// [`HandshakeRequestInvalid`](PeerError::HandshakeRequestInvalid) on a
/// malformed one. A child that never hears a request stays pending forever;
/// the timeout lives on the parent side.
pub fn connect_to_parent(
    child: &Window,
    inbound: EventSchemas,
    outbound: EventSchemas,
    options: ParentOptions,
) -> Result<Pending<ParentConnection>> {
    let parent = child.parent().ok_or(PeerError::NoParentWindow)?;
    Ok(handshake::begin_child_handshake(
        child, parent, inbound, outbound, options,
    ))
}

/// The child's established channel to its embedding document.
///
/// The parent origin is the one captured from the accepted handshake
/// request, never independently resolved. There is no teardown: the child
/// does not own the frame, so its channel lives as long as the document.
#[derive(Clone)]
pub struct ParentConnection {
    inner: Rc<ParentConnectionInner>,
}

struct ParentConnectionInner {
    child: Window,
    parent: Window,
    parent_origin: String,
    namespace: Option<String>,
    outbound: Rc<EventSchemas>,
    listeners: Listeners,
}

impl ParentConnection {
    pub(crate) fn from_parts(
        child: Window,
        parent: Window,
        parent_origin: String,
        namespace: Option<String>,
        outbound: Rc<EventSchemas>,
        listeners: Listeners,
    ) -> Self {
        Self {
            inner: Rc::new(ParentConnectionInner {
                child,
                parent,
                parent_origin,
                namespace,
                outbound,
                listeners,
            }),
        }
    }

    /// The origin captured during the handshake.
    pub fn parent_origin(&self) -> &str {
        &self.inner.parent_origin
    }

    pub fn namespace(&self) -> Option<&str> {
        self.inner.namespace.as_deref()
    }

    pub fn child_window(&self) -> Window {
        self.inner.child.clone()
    }

    pub fn parent_window(&self) -> Window {
        self.inner.parent.clone()
    }

    /// Register a handler for an inbound event. The handler only runs for
    /// payloads that pass the inbound schema for `event`.
    pub fn on(&self, event: &str, handler: impl Fn(Value) + 'static) -> Subscription {
        let key = self.inner.listeners.insert(event, handler);
        Subscription::new(self.inner.listeners.clone(), key)
    }

    /// Send an event to the parent. Fails without sending when `event` is
    /// not declared outbound or `data` fails its schema.
    pub fn emit(&self, event: &str, data: Value) -> Result<()> {
        router::emit_event(
            &self.inner.child,
            &self.inner.parent,
            &self.inner.parent_origin,
            MessageType::ChildOriginatedEvent,
            self.inner.namespace.as_deref(),
            &self.inner.outbound,
            event,
            data,
        )
    }
}

impl fmt::Debug for ParentConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentConnection")
            .field("parent_origin", &self.inner.parent_origin)
            .field("namespace", &self.inner.namespace)
            .finish()
    }
}
