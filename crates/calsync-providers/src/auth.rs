//! HTTP Basic authentication (RFC 7617).

use base64::Engine;

/// Builds an `Authorization` header value for Basic auth.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}
