use rand::distributions::Alphanumeric;
use rand::Rng;

const TOKEN_LEN: usize = 12;

/// A collision-free per-message identifier: a random alphanumeric token,
/// prefixed with the namespace when one is configured.
pub fn message_id(namespace: Option<&str>) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect();
    match namespace {
        Some(namespace) => format!("{namespace}-{token}"),
        None => token,
    }
}
