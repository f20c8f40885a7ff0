//! Minimal parent/child exchange: the parent embeds a widget and asks it a
//! question once the handshake completes.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example ask-question

use framelink::channel::{Container, Location, Scheduler, Window};
use framelink::logging::{init_logging, LogFormat};
use framelink::peer::{connect_to_parent, create_child, ChildOptions, ParentOptions};
use framelink::schema::EventSchemas;
use serde_json::json;

const QUESTION_SCHEMA: &str = r#"{
    "type": "object",
    "properties": { "question": { "type": "string" } },
    "required": ["question"]
}"#;

const ANSWER_SCHEMA: &str = r#"{
    "type": "object",
    "properties": { "answer": { "type": "string" } },
    "required": ["answer"]
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogFormat::Text);

    let scheduler = Scheduler::new();
    let parent = Window::new(&scheduler, Location::new("https", "app.example"));
    let container = Container::new();

    let pending = create_child(
        &parent,
        &container,
        "https://widget.example/form",
        EventSchemas::from_entries(&[("answerQuestion", ANSWER_SCHEMA)])?,
        EventSchemas::from_entries(&[("askQuestion", QUESTION_SCHEMA)])?,
        ChildOptions::default(),
    )?;

    // The widget's own script: connect back and answer questions.
    let child_window = container.frames()[0].content_window();
    let child_pending = connect_to_parent(
        &child_window,
        EventSchemas::from_entries(&[("askQuestion", QUESTION_SCHEMA)])?,
        EventSchemas::from_entries(&[("answerQuestion", ANSWER_SCHEMA)])?,
        ParentOptions::default(),
    )?;

    scheduler.run_until_idle();

    let to_child = pending.try_take().expect("handshake should settle")?;
    let to_parent = child_pending.try_take().expect("handshake should settle")?;
    eprintln!("connected to child at {}", to_child.child_origin());

    let answering = to_parent.clone();
    to_parent.on("askQuestion", move |data| {
        eprintln!("child received: {data}");
        answering
            .emit("answerQuestion", json!({"answer": "hello back"}))
            .expect("answer should conform to schema");
    });
    to_child.on("answerQuestion", |data| {
        eprintln!("parent received: {data}");
    });

    to_child.emit("askQuestion", json!({"question": "anyone home?"}))?;
    scheduler.run_until_idle();

    to_child.destroy();
    Ok(())
}
