use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace};

use framelink_channel::{MessageEvent, Scheduler, Window};
use framelink_envelope::{decode, Envelope, MessageType};
use framelink_schema::{EventSchemas, SchemaError};

use crate::error::{PeerError, Result};

pub(crate) type Handler = Rc<dyn Fn(Value)>;

/// Listener registry shared between a connection facade and its
/// steady-state window listener. Mutated only from the event loop; dispatch
/// works on snapshots.
#[derive(Clone)]
pub(crate) struct Listeners {
    inner: Rc<RefCell<ListenerTable>>,
}

struct ListenerTable {
    next_key: u64,
    entries: Vec<(u64, String, Handler)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListenerTable {
                next_key: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn insert(&self, event: &str, handler: impl Fn(Value) + 'static) -> u64 {
        let mut table = self.inner.borrow_mut();
        let key = table.next_key;
        table.next_key += 1;
        table
            .entries
            .push((key, event.to_string(), Rc::new(handler)));
        key
    }

    pub fn remove(&self, key: u64) -> bool {
        let mut table = self.inner.borrow_mut();
        let before = table.entries.len();
        table.entries.retain(|(entry_key, _, _)| *entry_key != key);
        table.entries.len() != before
    }

    /// Snapshot of handlers registered for `event`, in registration order.
    pub fn matching(&self, event: &str) -> Vec<Handler> {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|(_, name, _)| name == event)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

/// Undoes one [`on`](crate::ChildConnection::on) registration.
///
/// `unsubscribe` removes exactly that registration; calling it again is a
/// no-op. Dropping a `Subscription` does *not* unsubscribe; the handler
/// stays registered for the connection's lifetime unless removed.
pub struct Subscription {
    listeners: Listeners,
    key: u64,
}

impl Subscription {
    pub(crate) fn new(listeners: Listeners, key: u64) -> Self {
        Self { listeners, key }
    }

    /// Remove the registration. Returns false when it was already removed.
    pub fn unsubscribe(&self) -> bool {
        self.listeners.remove(self.key)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}

/// Steady-state inbound path: origin check, envelope decode, per-event
/// schema validation, then one scheduled task per matching handler.
///
/// Handler invocation is fire-and-forget: each runs as its own task, so a
/// slow or self-unsubscribing handler cannot stall message processing or
/// its siblings. Every drop on this path is logged and swallowed; the
/// shared channel is expected to carry unrelated traffic.
pub(crate) fn deliver_event(
    scheduler: &Scheduler,
    expected: MessageType,
    trusted_origin: &str,
    namespace: Option<&str>,
    inbound: &EventSchemas,
    listeners: &Listeners,
    event: &MessageEvent,
) {
    if event.origin != trusted_origin {
        trace!(
            origin = %event.origin,
            trusted = trusted_origin,
            "ignoring message from non-whitelisted origin"
        );
        return;
    }

    let envelope = match decode(&event.data, expected, namespace) {
        Ok(envelope) => envelope,
        Err(err) => {
            trace!(%err, "ignoring channel traffic");
            return;
        }
    };
    let Some(payload) = envelope.event else {
        return;
    };

    let handlers = listeners.matching(&payload.name);
    if handlers.is_empty() {
        trace!(event = %payload.name, "no listeners registered");
        return;
    }

    if let Err(err) = inbound.validate(&payload.name, &payload.data) {
        debug!(event = %payload.name, %err, "dropping event with non-conforming data");
        return;
    }

    for handler in handlers {
        let data = payload.data.clone();
        scheduler.schedule(move || handler(data));
    }
}

/// Outbound path: refuse undeclared events and schema-failing data before
/// anything touches the channel, then post to the verified remote origin,
/// never to a wildcard.
pub(crate) fn emit_event(
    sender: &Window,
    target: &Window,
    target_origin: &str,
    message_type: MessageType,
    namespace: Option<&str>,
    outbound: &EventSchemas,
    name: &str,
    data: Value,
) -> Result<()> {
    match outbound.validate(name, &data) {
        Ok(()) => {}
        Err(SchemaError::UnknownEvent(event)) => {
            return Err(PeerError::EventNameInvalid(event));
        }
        Err(SchemaError::ValidationFailed { message, .. }) => {
            return Err(PeerError::EventDataInvalid {
                name: name.to_string(),
                message,
            });
        }
        Err(err) => {
            return Err(PeerError::EventDataInvalid {
                name: name.to_string(),
                message: err.to_string(),
            });
        }
    }

    let envelope = Envelope::event(message_type, namespace, name, data);
    trace!(event = name, target = target_origin, id = %envelope.id, "event sent");
    sender.post_message(target, envelope.to_value(), target_origin);
    Ok(())
}
