/// Errors surfaced by connection setup and event emission.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// The child URL could not be resolved to an origin.
    #[error("invalid child URL \"{url}\": {message}")]
    InvalidUrl { url: String, message: String },

    /// `connect_to_parent` was called from a window that is not embedded.
    #[error("window has no parent to connect to")]
    NoParentWindow,

    /// The child received a malformed handshake request.
    #[error("invalid handshake request: {0}")]
    HandshakeRequestInvalid(String),

    /// The parent exhausted its handshake retries.
    #[error(
        "handshake with {origin} timed out after {attempts} request(s); \
         is the child document listening?"
    )]
    HandshakeTimeout { origin: String, attempts: u32 },

    /// `emit` was called with an event absent from the outbound map.
    #[error("event \"{0}\" is not declared in the outbound event map")]
    EventNameInvalid(String),

    /// `emit` was called with data failing the event's schema.
    #[error("event \"{name}\" data is invalid: {message}")]
    EventDataInvalid { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, PeerError>;
