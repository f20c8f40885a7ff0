use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::trace;

use crate::event::{MessageEvent, MessageSource};
use crate::scheduler::Scheduler;

/// Scheme and host of a document, the inputs an origin is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    scheme: String,
    host: String,
}

impl Location {
    /// `host` may carry an explicit port (`"example.com:8080"`).
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Render the origin, `scheme://host[:port]`, with the scheme's default
    /// port (80 for http, 443 for https) normalized away.
    pub fn origin(&self) -> String {
        let default_suffix = match self.scheme.as_str() {
            "http" => Some(":80"),
            "https" => Some(":443"),
            _ => None,
        };
        let host = match default_suffix {
            Some(suffix) => self.host.strip_suffix(suffix).unwrap_or(&self.host),
            None => &self.host,
        };
        format!("{}://{host}", self.scheme)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin())
    }
}

/// Identifies a message listener registered on a [`Window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&MessageEvent)>;

/// One side of the message channel: a document's window.
///
/// Handles are cheap clones of one shared window; equality of handles is
/// identity of the underlying window ([`Window::ptr_eq`]).
#[derive(Clone)]
pub struct Window {
    inner: Rc<RefCell<WindowInner>>,
    scheduler: Scheduler,
}

struct WindowInner {
    location: Location,
    parent: Option<Weak<RefCell<WindowInner>>>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl Window {
    /// Create a top-level window (no parent).
    pub fn new(scheduler: &Scheduler, location: Location) -> Self {
        Self::with_parent(scheduler, location, None)
    }

    pub(crate) fn with_parent(
        scheduler: &Scheduler,
        location: Location,
        parent: Option<&Window>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(WindowInner {
                location,
                // Weak link: the embedding window owns the frame that owns
                // this window, so a strong link would cycle.
                parent: parent.map(|window| Rc::downgrade(&window.inner)),
                listeners: Vec::new(),
                next_listener: 0,
            })),
            scheduler: scheduler.clone(),
        }
    }

    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    pub fn location(&self) -> Location {
        self.inner.borrow().location.clone()
    }

    /// This window's own origin.
    pub fn origin(&self) -> String {
        self.inner.borrow().location.origin()
    }

    /// The embedding window, for frame content windows.
    pub fn parent(&self) -> Option<Window> {
        let parent = self.inner.borrow().parent.clone()?;
        parent.upgrade().map(|inner| Window {
            inner,
            scheduler: self.scheduler.clone(),
        })
    }

    /// True when both handles refer to the same window.
    pub fn ptr_eq(&self, other: &Window) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a message listener. Listeners are invoked in registration
    /// order against a snapshot, so a handler may add or remove listeners
    /// (itself included) mid-dispatch.
    pub fn add_message_listener(&self, listener: impl Fn(&MessageEvent) + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns false when the id is unknown (already
    /// removed), making removal idempotent.
    pub fn remove_message_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
        inner.listeners.len() != before
    }

    /// Post `data` from this window to `target`, addressed to
    /// `target_origin`. Delivery is scheduled, ordered, and silently dropped
    /// when `target_origin` is neither `"*"` nor the target's own origin.
    pub fn post_message(&self, target: &Window, data: Value, target_origin: &str) {
        let source = self.clone();
        let target = target.clone();
        let target_origin = target_origin.to_string();
        self.scheduler.schedule(move || {
            let actual = target.origin();
            if target_origin != "*" && target_origin != actual {
                trace!(
                    target_origin,
                    window_origin = %actual,
                    "dropping message addressed to another origin"
                );
                return;
            }
            let event = MessageEvent {
                data,
                origin: source.origin(),
                source: MessageSource::Window(source),
            };
            target.deliver(&event);
        });
    }

    /// Schedule delivery of an arbitrary event to this window. This is the
    /// injection point for traffic that did not come from a window
    /// (ports, workers) and for hostile traffic in tests.
    pub fn dispatch(&self, event: MessageEvent) {
        let target = self.clone();
        self.scheduler.schedule(move || target.deliver(&event));
    }

    fn deliver(&self, event: &MessageEvent) {
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Window")
            .field("origin", &inner.location.origin())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;

    fn window(scheduler: &Scheduler, scheme: &str, host: &str) -> Window {
        Window::new(scheduler, Location::new(scheme, host))
    }

    #[test]
    fn origin_normalizes_default_ports() {
        assert_eq!(
            Location::new("http", "example.com:80").origin(),
            "http://example.com"
        );
        assert_eq!(
            Location::new("https", "example.com:443").origin(),
            "https://example.com"
        );
        assert_eq!(
            Location::new("http", "example.com:8080").origin(),
            "http://example.com:8080"
        );
        assert_eq!(
            Location::new("https", "example.com:80").origin(),
            "https://example.com:80"
        );
    }

    #[test]
    fn delivery_is_scheduled_not_immediate() {
        let scheduler = Scheduler::new();
        let a = window(&scheduler, "http", "a.example");
        let b = window(&scheduler, "http", "b.example");

        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            b.add_message_listener(move |event| seen.borrow_mut().push(event.data.clone()));
        }

        a.post_message(&b, json!({"n": 1}), "*");
        assert!(seen.borrow().is_empty());

        scheduler.run_until_idle();
        assert_eq!(*seen.borrow(), vec![json!({"n": 1})]);
    }

    #[test]
    fn event_carries_sender_origin_and_window_source() {
        let scheduler = Scheduler::new();
        let a = window(&scheduler, "https", "a.example");
        let b = window(&scheduler, "https", "b.example");

        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            let a = a.clone();
            b.add_message_listener(move |event| {
                let from_a = event
                    .source
                    .window()
                    .map(|source| source.ptr_eq(&a))
                    .unwrap_or(false);
                seen.borrow_mut().push((event.origin.clone(), from_a));
            });
        }

        a.post_message(&b, json!(1), "https://b.example");
        scheduler.run_until_idle();

        assert_eq!(*seen.borrow(), vec![("https://a.example".to_string(), true)]);
    }

    #[test]
    fn mismatched_target_origin_drops_message() {
        let scheduler = Scheduler::new();
        let a = window(&scheduler, "http", "a.example");
        let b = window(&scheduler, "http", "b.example");

        let count = Rc::new(RefCell::new(0u32));
        {
            let count = Rc::clone(&count);
            b.add_message_listener(move |_| *count.borrow_mut() += 1);
        }

        a.post_message(&b, json!(1), "http://elsewhere.example");
        scheduler.run_until_idle();
        assert_eq!(*count.borrow(), 0);

        a.post_message(&b, json!(1), "http://b.example");
        scheduler.run_until_idle();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn messages_deliver_in_post_order() {
        let scheduler = Scheduler::new();
        let a = window(&scheduler, "http", "a.example");
        let b = window(&scheduler, "http", "b.example");

        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            b.add_message_listener(move |event| seen.borrow_mut().push(event.data.clone()));
        }

        for n in 0..4 {
            a.post_message(&b, json!(n), "*");
        }
        scheduler.run_until_idle();

        assert_eq!(*seen.borrow(), vec![json!(0), json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn listener_can_remove_itself_mid_dispatch() {
        let scheduler = Scheduler::new();
        let a = window(&scheduler, "http", "a.example");
        let b = window(&scheduler, "http", "b.example");

        let count = Rc::new(RefCell::new(0u32));
        let id_slot: Rc<RefCell<Option<ListenerId>>> = Rc::new(RefCell::new(None));
        let id = {
            let count = Rc::clone(&count);
            let id_slot = Rc::clone(&id_slot);
            let b = b.clone();
            b.clone().add_message_listener(move |_| {
                *count.borrow_mut() += 1;
                if let Some(id) = id_slot.borrow_mut().take() {
                    b.remove_message_listener(id);
                }
            })
        };
        *id_slot.borrow_mut() = Some(id);

        a.post_message(&b, json!(1), "*");
        a.post_message(&b, json!(2), "*");
        scheduler.run_until_idle();

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn remove_listener_is_idempotent() {
        let scheduler = Scheduler::new();
        let a = window(&scheduler, "http", "a.example");
        let id = a.add_message_listener(|_| {});

        assert!(a.remove_message_listener(id));
        assert!(!a.remove_message_listener(id));
    }

    #[test]
    fn dispatch_injects_non_window_sources() {
        let scheduler = Scheduler::new();
        let a = window(&scheduler, "http", "a.example");

        let sources = Rc::new(RefCell::new(Vec::new()));
        {
            let sources = Rc::clone(&sources);
            a.add_message_listener(move |event| {
                sources
                    .borrow_mut()
                    .push(event.source.window().is_none());
            });
        }

        a.dispatch(MessageEvent::from_port(json!(1), "http://b.example"));
        a.dispatch(MessageEvent::from_worker(json!(2), "http://b.example"));
        scheduler.run_until_idle();

        assert_eq!(*sources.borrow(), vec![true, true]);
    }
}
