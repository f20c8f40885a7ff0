use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use framelink_channel::{Container, Frame, ListenerId, MessageEvent, Scheduler, TimerId, Window};
use framelink_envelope::{decode, DecodeError, Envelope, MessageType};
use framelink_schema::EventSchemas;

use crate::child::{ParentConnection, ParentOptions};
use crate::error::PeerError;
use crate::parent::{ChildConnection, ChildOptions};
use crate::pending::Pending;
use crate::router::{self, Listeners};

/// Parent-side retry policy: how often and how many times the handshake
/// request is repeated before the connection is rejected.
///
/// Retries exist only on the parent because only the parent controls the
/// remote document's load timing; the child answers whenever a well-formed
/// request arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeOptions {
    pub max_requests: u32,
    pub retry_interval: Duration,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            max_requests: 5,
            retry_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Default)]
struct ParentState {
    attempts: u32,
    timer: Option<TimerId>,
    reply_listener: Option<ListenerId>,
    settled: bool,
}

impl ParentState {
    /// Tear down the retry machinery. Idempotent; runs on both accept and
    /// timeout so neither path leaks a timer or listener.
    fn finish(&mut self, scheduler: &Scheduler, parent: &Window) {
        self.settled = true;
        if let Some(timer) = self.timer.take() {
            scheduler.clear_interval(timer);
        }
        if let Some(listener) = self.reply_listener.take() {
            parent.remove_message_listener(listener);
        }
    }
}

/// Parent side: `idle → awaiting-reply → established`.
///
/// On frame load, sends a handshake request to the resolved child origin and
/// repeats it on `retry_interval` until a valid reply arrives or
/// `max_requests` have gone out. A reply counts only if its origin matches
/// the resolved child origin, its namespace matches, and it decodes as a
/// handshake reply; everything else on the channel is ignored.
pub(crate) fn begin_parent_handshake(
    parent: &Window,
    frame: &Frame,
    container: Option<Container>,
    inbound: EventSchemas,
    outbound: EventSchemas,
    options: ChildOptions,
) -> Pending<ChildConnection> {
    let scheduler = parent.scheduler();
    let child_window = frame.content_window();
    let child_origin = child_window.origin();
    let namespace = options.namespace;
    let inbound = Rc::new(inbound);
    let outbound = Rc::new(outbound);
    let listeners = Listeners::new();
    let (pending, completer) = Pending::new();
    let state = Rc::new(RefCell::new(ParentState::default()));

    let reply_listener = parent.add_message_listener({
        let scheduler = scheduler.clone();
        let parent = parent.clone();
        let frame = frame.clone();
        let container = container.clone();
        let child_origin = child_origin.clone();
        let namespace = namespace.clone();
        let inbound = Rc::clone(&inbound);
        let outbound = Rc::clone(&outbound);
        let listeners = listeners.clone();
        let completer = completer.clone();
        let state = Rc::clone(&state);
        move |event: &MessageEvent| {
            if state.borrow().settled {
                return;
            }
            if event.origin != child_origin {
                trace!(
                    origin = %event.origin,
                    expected = %child_origin,
                    "ignoring reply from non-whitelisted origin"
                );
                return;
            }
            if let Err(err) = decode(&event.data, MessageType::HandshakeReply, namespace.as_deref())
            {
                trace!(%err, "ignoring message while awaiting handshake reply");
                return;
            }

            state.borrow_mut().finish(&scheduler, &parent);

            let steady_listener = parent.add_message_listener({
                let scheduler = scheduler.clone();
                let child_origin = child_origin.clone();
                let namespace = namespace.clone();
                let inbound = Rc::clone(&inbound);
                let listeners = listeners.clone();
                move |event: &MessageEvent| {
                    router::deliver_event(
                        &scheduler,
                        MessageType::ChildOriginatedEvent,
                        &child_origin,
                        namespace.as_deref(),
                        &inbound,
                        &listeners,
                        event,
                    );
                }
            });

            info!(origin = %child_origin, "handshake established");
            let connection = ChildConnection::from_parts(
                parent.clone(),
                frame.clone(),
                container.clone(),
                child_origin.clone(),
                namespace.clone(),
                Rc::clone(&outbound),
                listeners.clone(),
                steady_listener,
            );
            completer.resolve(connection);
        }
    });
    state.borrow_mut().reply_listener = Some(reply_listener);

    let send_request: Rc<dyn Fn()> = Rc::new({
        let scheduler = scheduler.clone();
        let parent = parent.clone();
        let child_window = child_window.clone();
        let child_origin = child_origin.clone();
        let namespace = namespace.clone();
        let completer = completer.clone();
        let state = Rc::clone(&state);
        let max_requests = options.handshake.max_requests;
        move || {
            let attempt = {
                let mut state = state.borrow_mut();
                if state.settled {
                    return;
                }
                state.attempts += 1;
                state.attempts
            };

            let request = Envelope::handshake_request(namespace.as_deref());
            parent.post_message(&child_window, request.to_value(), &child_origin);
            debug!(attempt, origin = %child_origin, "handshake request sent");

            if attempt >= max_requests {
                state.borrow_mut().finish(&scheduler, &parent);
                warn!(origin = %child_origin, attempts = attempt, "handshake timed out");
                completer.reject(PeerError::HandshakeTimeout {
                    origin: child_origin.clone(),
                    attempts: attempt,
                });
            }
        }
    });

    frame.on_load({
        let scheduler = scheduler.clone();
        let state = Rc::clone(&state);
        let send_request = Rc::clone(&send_request);
        let retry_interval = options.handshake.retry_interval;
        move || {
            send_request();
            let mut state = state.borrow_mut();
            if state.settled {
                return;
            }
            let timer = scheduler.set_interval(retry_interval, {
                let send_request = Rc::clone(&send_request);
                move || send_request()
            });
            state.timer = Some(timer);
        }
    });

    pending
}

/// Child side: `idle → awaiting-request → established`.
///
/// Purely reactive: waits for a handshake request, captures the sender's
/// origin as the trusted parent origin (the only source of truth for it),
/// replies to that origin, and settles. Requests from non-window sources
/// are ignored, since a port or worker cannot be answered with an
/// origin-addressed reply. A malformed request (protocol-marked, namespace
/// matched, claiming the request type, bad shape) rejects immediately;
/// foreign traffic never does.
pub(crate) fn begin_child_handshake(
    child: &Window,
    parent: Window,
    inbound: EventSchemas,
    outbound: EventSchemas,
    options: ParentOptions,
) -> Pending<ParentConnection> {
    let scheduler = child.scheduler();
    let namespace = options.namespace;
    let inbound = Rc::new(inbound);
    let outbound = Rc::new(outbound);
    let listeners = Listeners::new();
    let (pending, completer) = Pending::new();
    let request_listener: Rc<RefCell<Option<ListenerId>>> = Rc::new(RefCell::new(None));

    let listener_id = child.add_message_listener({
        let scheduler = scheduler.clone();
        let child = child.clone();
        let namespace = namespace.clone();
        let inbound = Rc::clone(&inbound);
        let outbound = Rc::clone(&outbound);
        let listeners = listeners.clone();
        let completer = completer.clone();
        let request_listener = Rc::clone(&request_listener);
        move |event: &MessageEvent| {
            if completer.is_settled() {
                return;
            }
            if event.source.window().is_none() {
                trace!(
                    source = ?event.source,
                    "ignoring handshake request from non-window source"
                );
                return;
            }

            match decode(&event.data, MessageType::HandshakeRequest, namespace.as_deref()) {
                Ok(_) => {}
                Err(err @ DecodeError::Malformed { .. }) => {
                    warn!(%err, "rejecting malformed handshake request");
                    if let Some(listener) = request_listener.borrow_mut().take() {
                        child.remove_message_listener(listener);
                    }
                    completer.reject(PeerError::HandshakeRequestInvalid(err.to_string()));
                    return;
                }
                Err(err) => {
                    trace!(%err, "ignoring message while awaiting handshake request");
                    return;
                }
            }

            let parent_origin = event.origin.clone();
            if let Some(listener) = request_listener.borrow_mut().take() {
                child.remove_message_listener(listener);
            }

            child.add_message_listener({
                let scheduler = scheduler.clone();
                let trusted_origin = parent_origin.clone();
                let namespace = namespace.clone();
                let inbound = Rc::clone(&inbound);
                let listeners = listeners.clone();
                move |event: &MessageEvent| {
                    router::deliver_event(
                        &scheduler,
                        MessageType::ParentOriginatedEvent,
                        &trusted_origin,
                        namespace.as_deref(),
                        &inbound,
                        &listeners,
                        event,
                    );
                }
            });

            let reply = Envelope::handshake_reply(namespace.as_deref());
            child.post_message(&parent, reply.to_value(), &parent_origin);
            info!(origin = %parent_origin, "handshake reply sent");

            let connection = ParentConnection::from_parts(
                child.clone(),
                parent.clone(),
                parent_origin,
                namespace.clone(),
                Rc::clone(&outbound),
                listeners.clone(),
            );
            completer.resolve(connection);
        }
    });
    *request_listener.borrow_mut() = Some(listener_id);

    pending
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use framelink_channel::Location;
    use framelink_envelope::CONTENT_TYPE;

    use super::*;
    use crate::child::connect_to_parent;
    use crate::parent::{attach_child, create_child};

    const CHILD_URL: &str = "http://child.example/widget";

    fn harness() -> (Scheduler, Window, Container) {
        let scheduler = Scheduler::new();
        let parent = Window::new(&scheduler, Location::new("http", "parent.example"));
        (scheduler, parent, Container::new())
    }

    fn schemas(entries: &[(&str, &str)]) -> EventSchemas {
        EventSchemas::from_entries(entries).unwrap()
    }

    #[test]
    fn handshake_establishes_both_sides() {
        let (scheduler, parent, container) = harness();

        let parent_pending = create_child(
            &parent,
            &container,
            CHILD_URL,
            EventSchemas::new(),
            EventSchemas::new(),
            ChildOptions::default(),
        )
        .unwrap();

        let child_window = container.frames()[0].content_window();
        let child_pending = connect_to_parent(
            &child_window,
            EventSchemas::new(),
            EventSchemas::new(),
            ParentOptions::default(),
        )
        .unwrap();

        scheduler.run_until_idle();

        let child_connection = child_pending.try_take().unwrap().unwrap();
        let parent_connection = parent_pending.try_take().unwrap().unwrap();

        assert_eq!(parent_connection.child_origin(), "http://child.example");
        assert_eq!(child_connection.parent_origin(), "http://parent.example");
    }

    #[test]
    fn unresponsive_child_rejects_after_exact_attempts() {
        let (scheduler, parent, container) = harness();
        let options = ChildOptions {
            handshake: HandshakeOptions {
                max_requests: 3,
                retry_interval: Duration::from_millis(100),
            },
            ..ChildOptions::default()
        };

        let pending = create_child(
            &parent,
            &container,
            CHILD_URL,
            EventSchemas::new(),
            EventSchemas::new(),
            options,
        )
        .unwrap();

        let requests = Rc::new(RefCell::new(0u32));
        {
            let requests = Rc::clone(&requests);
            container.frames()[0]
                .content_window()
                .add_message_listener(move |_| *requests.borrow_mut() += 1);
        }

        // Load fires, first request goes out.
        scheduler.run_until_idle();
        assert_eq!(*requests.borrow(), 1);
        assert!(!pending.is_settled());

        // One short of the ceiling.
        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*requests.borrow(), 2);
        assert!(!pending.is_settled());

        // Third request hits the ceiling and rejects.
        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*requests.borrow(), 3);
        let err = pending.try_take().unwrap().unwrap_err();
        assert!(matches!(
            err,
            PeerError::HandshakeTimeout { attempts: 3, ref origin } if origin == "http://child.example"
        ));

        // The timer is gone: no further requests, ever.
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(*requests.borrow(), 3);
    }

    #[test]
    fn reply_from_wrong_origin_never_resolves() {
        let (scheduler, parent, container) = harness();
        let options = ChildOptions {
            handshake: HandshakeOptions {
                max_requests: 2,
                retry_interval: Duration::from_millis(50),
            },
            ..ChildOptions::default()
        };

        let pending = create_child(
            &parent,
            &container,
            CHILD_URL,
            EventSchemas::new(),
            EventSchemas::new(),
            options,
        )
        .unwrap();

        let imposter = Window::new(&scheduler, Location::new("http", "evil.example"));
        scheduler.run_until_idle();

        imposter.post_message(&parent, Envelope::handshake_reply(None).to_value(), "*");
        scheduler.run_until_idle();
        assert!(!pending.is_settled());

        scheduler.advance(Duration::from_millis(50));
        let err = pending.try_take().unwrap().unwrap_err();
        assert!(matches!(err, PeerError::HandshakeTimeout { attempts: 2, .. }));
    }

    #[test]
    fn late_child_still_connects_within_retry_budget() {
        let (scheduler, parent, container) = harness();

        let parent_pending = create_child(
            &parent,
            &container,
            CHILD_URL,
            EventSchemas::new(),
            EventSchemas::new(),
            ChildOptions::default(),
        )
        .unwrap();

        // First two requests go unanswered; the child script only starts
        // listening afterwards.
        scheduler.run_until_idle();
        scheduler.advance(Duration::from_millis(1000));

        let child_window = container.frames()[0].content_window();
        let child_pending = connect_to_parent(
            &child_window,
            EventSchemas::new(),
            EventSchemas::new(),
            ParentOptions::default(),
        )
        .unwrap();

        scheduler.advance(Duration::from_millis(1000));

        assert!(parent_pending.try_take().unwrap().is_ok());
        assert!(child_pending.try_take().unwrap().is_ok());
    }

    #[test]
    fn child_ignores_port_and_worker_sources() {
        let (scheduler, parent, _container) = harness();
        let frame = Frame::new(&parent, CHILD_URL, Location::new("http", "child.example"));
        let child = frame.content_window();

        let pending = connect_to_parent(
            &child,
            EventSchemas::new(),
            EventSchemas::new(),
            ParentOptions::default(),
        )
        .unwrap();

        let request = Envelope::handshake_request(None).to_value();
        child.dispatch(MessageEvent::from_port(
            request.clone(),
            "http://parent.example",
        ));
        child.dispatch(MessageEvent::from_worker(request, "http://parent.example"));
        scheduler.run_until_idle();

        assert!(!pending.is_settled());
    }

    #[test]
    fn child_rejects_malformed_request_and_ignores_noise() {
        let (scheduler, parent, _container) = harness();
        let frame = Frame::new(&parent, CHILD_URL, Location::new("http", "child.example"));
        let child = frame.content_window();

        let pending = connect_to_parent(
            &child,
            EventSchemas::new(),
            EventSchemas::new(),
            ParentOptions::default(),
        )
        .unwrap();

        // Foreign traffic is ignored, not rejected.
        parent.post_message(&child, json!({"unrelated": true}), "*");
        scheduler.run_until_idle();
        assert!(!pending.is_settled());

        // A protocol-marked request with a broken shape rejects.
        parent.post_message(
            &child,
            json!({
                "contentType": CONTENT_TYPE,
                "id": "",
                "messageType": "handshake-request",
            }),
            "*",
        );
        scheduler.run_until_idle();

        let err = pending.try_take().unwrap().unwrap_err();
        assert!(matches!(err, PeerError::HandshakeRequestInvalid(_)));

        // The request listener is detached; a later valid request is moot.
        parent.post_message(&child, Envelope::handshake_request(None).to_value(), "*");
        scheduler.run_until_idle();
    }

    #[test]
    fn namespaced_channels_do_not_cross_talk() {
        let (scheduler, parent, container) = harness();

        let schema =
            r#"{"type":"object","properties":{"n":{"type":"integer"}},"required":["n"]}"#;

        let pending_a = create_child(
            &parent,
            &container,
            CHILD_URL,
            EventSchemas::new(),
            schemas(&[("tick", schema)]),
            ChildOptions {
                namespace: Some("a".to_string()),
                ..ChildOptions::default()
            },
        )
        .unwrap();

        let frame = container.frames()[0].clone();
        let pending_b = attach_child(
            &parent,
            &frame,
            EventSchemas::new(),
            schemas(&[("tick", schema)]),
            ChildOptions {
                namespace: Some("b".to_string()),
                ..ChildOptions::default()
            },
        );

        let child_window = frame.content_window();
        let child_pending_a = connect_to_parent(
            &child_window,
            schemas(&[("tick", schema)]),
            EventSchemas::new(),
            ParentOptions {
                namespace: Some("a".to_string()),
            },
        )
        .unwrap();
        let child_pending_b = connect_to_parent(
            &child_window,
            schemas(&[("tick", schema)]),
            EventSchemas::new(),
            ParentOptions {
                namespace: Some("b".to_string()),
            },
        )
        .unwrap();

        scheduler.advance(Duration::from_millis(2000));

        let parent_a = pending_a.try_take().unwrap().unwrap();
        let parent_b = pending_b.try_take().unwrap().unwrap();
        let child_a = child_pending_a.try_take().unwrap().unwrap();
        let child_b = child_pending_b.try_take().unwrap().unwrap();

        let seen_a = Rc::new(RefCell::new(0u32));
        let seen_b = Rc::new(RefCell::new(0u32));
        {
            let seen_a = Rc::clone(&seen_a);
            child_a.on("tick", move |_| *seen_a.borrow_mut() += 1);
        }
        {
            let seen_b = Rc::clone(&seen_b);
            child_b.on("tick", move |_| *seen_b.borrow_mut() += 1);
        }

        parent_a.emit("tick", json!({"n": 1})).unwrap();
        scheduler.run_until_idle();
        assert_eq!((*seen_a.borrow(), *seen_b.borrow()), (1, 0));

        parent_b.emit("tick", json!({"n": 2})).unwrap();
        scheduler.run_until_idle();
        assert_eq!((*seen_a.borrow(), *seen_b.borrow()), (1, 1));
    }
}
