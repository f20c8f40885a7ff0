//! Handshake, event routing, and connection management.
//!
//! This is the protocol layer. A parent embeds a child document and the two
//! sides establish a verified channel:
//! - The parent resolves the child origin from the URL up front and sends
//!   handshake requests to that origin only, retrying on an interval.
//! - The child answers the first well-formed request, capturing the
//!   sender's origin as the one parent it will trust.
//! - After the handshake, both sides exchange schema-validated events
//!   through the router; everything else on the channel is logged and
//!   dropped.

pub mod child;
pub mod error;
pub mod handshake;
pub mod origin;
pub mod parent;
pub mod pending;
pub mod router;

pub use child::{connect_to_parent, ParentConnection, ParentOptions};
pub use error::{PeerError, Result};
pub use handshake::HandshakeOptions;
pub use origin::resolve_origin;
pub use parent::{attach_child, create_child, ChildConnection, ChildOptions};
pub use pending::Pending;
pub use router::Subscription;
