//! Event-keyed JSON Schema validation.
//!
//! Each side of a channel declares two schema maps: the events it accepts
//! and the events it may emit. Payloads are validated against the schema
//! registered for their event name before a handler runs or a message goes
//! out; an event name with no entry is itself a validation failure.

pub mod config;
pub mod error;
pub mod map;
mod validator;

pub use config::SchemaConfig;
pub use error::{Result, SchemaError};
pub use map::EventSchemas;
