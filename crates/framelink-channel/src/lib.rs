//! In-process cross-window message channel.
//!
//! This is the environment layer the protocol runs on. It reproduces the
//! pieces of a browsing context the messaging protocol depends on, with all
//! ambient state made explicit:
//! - A cooperative single-threaded [`Scheduler`] with a virtual clock. Time
//!   only advances when told to, which keeps handshake retry behavior
//!   deterministic under test.
//! - [`Window`] handles with a [`Location`], a message-listener registry, and
//!   origin-addressed [`Window::post_message`] delivery.
//! - [`Frame`] and [`Container`] for the embedded-document lifecycle (load
//!   event, removal on teardown).
//!
//! Delivery is asynchronous (a scheduler task per message), ordered, and
//! origin-filtered: a message posted with a target origin other than `"*"`
//! is dropped unless it matches the receiving window's own origin.

pub mod event;
pub mod frame;
pub mod scheduler;
pub mod window;

pub use event::{MessageEvent, MessageSource};
pub use frame::{Container, Frame};
pub use scheduler::{Scheduler, TimerId};
pub use window::{ListenerId, Location, Window};
