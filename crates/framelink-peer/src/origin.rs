use framelink_channel::Location;
use url::Url;

use crate::error::{PeerError, Result};

/// Resolve the origin a child URL will be served from.
///
/// `current` is the embedding document's location, passed explicitly: it
/// supplies the scheme and host for relative and protocol-relative URLs.
/// The result is computed once, before the frame navigates, and is the only
/// origin the parent will send to or accept replies from. Default ports are
/// never part of the rendered origin ([`Location::origin`] normalizes them;
/// the `url` parser already drops a scheme's known default).
pub fn resolve_origin(raw: &str, current: &Location) -> Result<Location> {
    let invalid = |message: String| PeerError::InvalidUrl {
        url: raw.to_string(),
        message,
    };

    let base = Url::parse(&format!("{}/", current.origin()))
        .map_err(|err| invalid(format!("invalid current location: {err}")))?;
    let resolved = base.join(raw).map_err(|err| invalid(err.to_string()))?;

    let host = resolved
        .host_str()
        .ok_or_else(|| invalid("URL has no host".to_string()))?;
    let host = match resolved.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok(Location::new(resolved.scheme(), host))
}
