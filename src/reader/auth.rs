//! Legacy ClientLogin authentication
//!
//! The login endpoint answers with a plain-text body of `Key=Value` lines,
//! one of which is `Auth=<token>`. The status code is not trusted: error
//! pages sometimes carry a token, and success pages sometimes don't.

use super::types::AuthToken;
use crate::config::Credentials;

/// Marker preceding the token in the login response body
pub const AUTH_MARKER: &str = "Auth=";

/// Percent-encode a query component
///
/// Everything except `A-Z a-z 0-9 - _ . ~` is escaped, so the characters
/// `!'()*` and space come out as `%21 %27 %28 %29 %2A %20`.
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Build the ClientLogin URL for the given credentials
pub fn login_url(api_base: &str, credentials: &Credentials) -> String {
    format!(
        "{}/accounts/ClientLogin?Email={}&Passwd={}",
        api_base.trim_end_matches('/'),
        encode_component(&credentials.username),
        encode_component(&credentials.password),
    )
}

/// Extract the token following [`AUTH_MARKER`]
///
/// Takes everything after the first marker up to the end of the body or the
/// first line break, trimmed. Returns `None` when the marker is missing or the
/// token is empty.
pub fn extract_token(body: &str) -> Option<AuthToken> {
    let start = body.find(AUTH_MARKER)? + AUTH_MARKER.len();
    let rest = &body[start..];
    let end = rest.find(['\r', '\n']).unwrap_or(rest.len());
    let token = rest[..end].trim();

    if token.is_empty() {
        None
    } else {
        Some(AuthToken::new(token))
    }
}
