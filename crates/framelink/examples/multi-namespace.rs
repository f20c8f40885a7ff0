//! Two independent channels over one window pair, split by namespace.
//!
//! Run with:
//!   RUST_LOG=trace cargo run --example multi-namespace

use framelink::channel::{Container, Location, Scheduler, Window};
use framelink::logging::{init_logging, LogFormat};
use framelink::peer::{
    attach_child, connect_to_parent, create_child, ChildOptions, ParentOptions,
};
use framelink::schema::EventSchemas;
use serde_json::json;

const TICK_SCHEMA: &str = r#"{
    "type": "object",
    "properties": { "n": { "type": "integer" } },
    "required": ["n"]
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogFormat::Text);

    let scheduler = Scheduler::new();
    let parent = Window::new(&scheduler, Location::new("https", "app.example"));
    let container = Container::new();

    let pending_metrics = create_child(
        &parent,
        &container,
        "https://widget.example/dash",
        EventSchemas::new(),
        EventSchemas::from_entries(&[("tick", TICK_SCHEMA)])?,
        ChildOptions::namespaced("metrics"),
    )?;

    let frame = container.frames()[0].clone();
    let pending_billing = attach_child(
        &parent,
        &frame,
        EventSchemas::new(),
        EventSchemas::from_entries(&[("tick", TICK_SCHEMA)])?,
        ChildOptions::namespaced("billing"),
    );

    let child_window = frame.content_window();
    let child_metrics = connect_to_parent(
        &child_window,
        EventSchemas::from_entries(&[("tick", TICK_SCHEMA)])?,
        EventSchemas::new(),
        ParentOptions::namespaced("metrics"),
    )?;
    let child_billing = connect_to_parent(
        &child_window,
        EventSchemas::from_entries(&[("tick", TICK_SCHEMA)])?,
        EventSchemas::new(),
        ParentOptions::namespaced("billing"),
    )?;

    scheduler.run_until_idle();

    let metrics = pending_metrics.try_take().expect("handshake should settle")?;
    let billing = pending_billing.try_take().expect("handshake should settle")?;
    let metrics_child = child_metrics.try_take().expect("handshake should settle")?;
    let billing_child = child_billing.try_take().expect("handshake should settle")?;

    metrics_child.on("tick", |data| eprintln!("metrics tick: {data}"));
    billing_child.on("tick", |data| eprintln!("billing tick: {data}"));

    // Each tick reaches only the listeners of its own namespace.
    metrics.emit("tick", json!({"n": 1}))?;
    billing.emit("tick", json!({"n": 2}))?;
    scheduler.run_until_idle();

    Ok(())
}
