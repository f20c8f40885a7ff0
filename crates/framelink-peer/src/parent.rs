use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use framelink_channel::{Container, Frame, ListenerId, Window};
use framelink_envelope::MessageType;
use framelink_schema::EventSchemas;

use crate::error::Result;
use crate::handshake::{self, HandshakeOptions};
use crate::origin::resolve_origin;
use crate::pending::Pending;
use crate::router::{self, Listeners, Subscription};

/// Parent-side channel configuration.
#[derive(Debug, Clone, Default)]
pub struct ChildOptions {
    pub handshake: HandshakeOptions,
    /// Scopes this channel when several share one window pair.
    pub namespace: Option<String>,
}

impl ChildOptions {
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }
}

/// Embed a child document and open a channel to it.
///
/// Resolves the child origin from `url` against the parent's location (the
/// only origin this channel will ever trust or target), creates the frame,
/// appends it to `container`, and starts the handshake. The returned
/// [`Pending`] settles with a [`ChildConnection`] once the child replies, or
/// with [`HandshakeTimeout`](crate::PeerError::HandshakeTimeout) once the
/// retry budget is spent.
pub fn create_child(
    parent: &Window,
    container: &Container,
    url: &str,
    inbound: EventSchemas,
    outbound: EventSchemas,
    options: ChildOptions,
) -> Result<Pending<ChildConnection>> {
    let child_location = resolve_origin(url, &parent.location())?;
    debug!(url, origin = %child_location.origin(), "creating child frame");
    let frame = Frame::new(parent, url, child_location);
    let pending = handshake::begin_parent_handshake(
        parent,
        &frame,
        Some(container.clone()),
        inbound,
        outbound,
        options,
    );
    container.append(&frame);
    Ok(pending)
}

/// Open an additional channel over an existing frame, typically under its
/// own namespace. The resulting connection's `destroy` detaches this
/// channel's listener but leaves the shared frame in place.
pub fn attach_child(
    parent: &Window,
    frame: &Frame,
    inbound: EventSchemas,
    outbound: EventSchemas,
    options: ChildOptions,
) -> Pending<ChildConnection> {
    handshake::begin_parent_handshake(parent, frame, None, inbound, outbound, options)
}

/// The parent's established channel to an embedded child.
///
/// Handles are cheap clones of one connection. Created only by a completed
/// handshake, so the child origin it targets is always the verified one.
#[derive(Clone)]
pub struct ChildConnection {
    inner: Rc<ChildConnectionInner>,
}

struct ChildConnectionInner {
    parent: Window,
    frame: Frame,
    container: Option<Container>,
    child_origin: String,
    namespace: Option<String>,
    outbound: Rc<EventSchemas>,
    listeners: Listeners,
    steady_listener: ListenerId,
    destroyed: Cell<bool>,
}

impl ChildConnection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        parent: Window,
        frame: Frame,
        container: Option<Container>,
        child_origin: String,
        namespace: Option<String>,
        outbound: Rc<EventSchemas>,
        listeners: Listeners,
        steady_listener: ListenerId,
    ) -> Self {
        Self {
            inner: Rc::new(ChildConnectionInner {
                parent,
                frame,
                container,
                child_origin,
                namespace,
                outbound,
                listeners,
                steady_listener,
                destroyed: Cell::new(false),
            }),
        }
    }

    /// The verified origin of the child document.
    pub fn child_origin(&self) -> &str {
        &self.inner.child_origin
    }

    pub fn namespace(&self) -> Option<&str> {
        self.inner.namespace.as_deref()
    }

    pub fn parent_window(&self) -> Window {
        self.inner.parent.clone()
    }

    pub fn child_window(&self) -> Window {
        self.inner.frame.content_window()
    }

    pub fn frame(&self) -> Frame {
        self.inner.frame.clone()
    }

    /// Register a handler for an inbound event. The handler only runs for
    /// payloads that pass the inbound schema for `event`.
    pub fn on(&self, event: &str, handler: impl Fn(Value) + 'static) -> Subscription {
        let key = self.inner.listeners.insert(event, handler);
        Subscription::new(self.inner.listeners.clone(), key)
    }

    /// Send an event to the child. Fails without sending when `event` is
    /// not declared outbound or `data` fails its schema.
    pub fn emit(&self, event: &str, data: Value) -> Result<()> {
        router::emit_event(
            &self.inner.parent,
            &self.child_window(),
            &self.inner.child_origin,
            MessageType::ParentOriginatedEvent,
            self.inner.namespace.as_deref(),
            &self.inner.outbound,
            event,
            data,
        )
    }

    /// Detach the channel listener and remove the frame from its container.
    /// Sends nothing to the child; idempotent. A frame shared via
    /// [`attach_child`] is left in place.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.inner
            .parent
            .remove_message_listener(self.inner.steady_listener);
        if let Some(container) = &self.inner.container {
            container.remove(&self.inner.frame);
        }
        debug!(origin = %self.inner.child_origin, "child connection destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

impl fmt::Debug for ChildConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildConnection")
            .field("child_origin", &self.inner.child_origin)
            .field("namespace", &self.inner.namespace)
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}
