/// Errors that can occur registering or applying event schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema could not be compiled.
    #[error("failed to compile schema for event \"{event}\": {message}")]
    CompileFailed { event: String, message: String },

    /// The payload failed schema validation.
    #[error("event \"{event}\" data failed validation: {message}")]
    ValidationFailed { event: String, message: String },

    /// No schema registered for the given event name.
    #[error("no schema registered for event \"{0}\"")]
    UnknownEvent(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
