//! Typed, schema-validated messaging between a parent document and an
//! embedded child.
//!
//! A parent embeds a child in a frame and both sides exchange events over a
//! narrow-origin message channel, after a handshake that verifies the
//! counterpart's origin. Events are validated against per-event JSON
//! Schemas on both the sending and receiving side.
//!
//! # Crate Structure
//!
//! - [`channel`] — In-process cross-window channel (scheduler, windows,
//!   frames)
//! - [`envelope`] — Wire envelope codec and message ids
//! - [`schema`] — Event-keyed JSON Schema validation
//! - [`peer`] — Handshake engines, event router, connection facades
//!
//! # Example
//!
//! ```
//! use framelink::channel::{Container, Location, Scheduler, Window};
//! use framelink::peer::{connect_to_parent, create_child, ChildOptions, ParentOptions};
//! use framelink::schema::EventSchemas;
//!
//! let scheduler = Scheduler::new();
//! let parent = Window::new(&scheduler, Location::new("https", "app.example"));
//! let container = Container::new();
//!
//! let question = r#"{
//!     "type": "object",
//!     "properties": { "question": { "type": "string" } },
//!     "required": ["question"]
//! }"#;
//!
//! let pending = create_child(
//!     &parent,
//!     &container,
//!     "https://widget.example/form",
//!     EventSchemas::new(),
//!     EventSchemas::from_entries(&[("askQuestion", question)]).unwrap(),
//!     ChildOptions::default(),
//! )
//! .unwrap();
//!
//! // The embedded document's script connects from its own window.
//! let child_window = container.frames()[0].content_window();
//! let child_pending = connect_to_parent(
//!     &child_window,
//!     EventSchemas::from_entries(&[("askQuestion", question)]).unwrap(),
//!     EventSchemas::new(),
//!     ParentOptions::default(),
//! )
//! .unwrap();
//!
//! scheduler.run_until_idle();
//!
//! let to_child = pending.try_take().unwrap().unwrap();
//! let to_parent = child_pending.try_take().unwrap().unwrap();
//! to_parent.on("askQuestion", |data| println!("asked: {data}"));
//!
//! to_child.emit("askQuestion", serde_json::json!({"question": "hi"})).unwrap();
//! scheduler.run_until_idle();
//! ```

pub mod logging;

/// Re-export channel types.
pub mod channel {
    pub use framelink_channel::*;
}

/// Re-export envelope types.
pub mod envelope {
    pub use framelink_envelope::*;
}

/// Re-export schema types.
pub mod schema {
    pub use framelink_schema::*;
}

/// Re-export peer types.
pub mod peer {
    pub use framelink_peer::*;
}
