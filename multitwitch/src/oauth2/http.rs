//! Shared HTTP client for outbound calls
//!
//! The token exchange, the profile fetch and the downstream API all go
//! through one `reqwest` client so they share connection pooling and the
//! same per-call timeout.

use std::time::Duration;

use crate::config::HttpSettings;

/// User agent sent on every outbound request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Build the outbound HTTP client
///
/// - Redirects are disabled (`Policy::none`); the token endpoint must answer directly
/// - Every call is bounded by `request_timeout_ms`, connecting by `connect_timeout_ms`
///
/// # Errors
///
/// Returns `reqwest::Error` if the TLS backend cannot be initialized
pub fn http_client(settings: &HttpSettings) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_millis(settings.request_timeout_ms))
        .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
        .user_agent(USER_AGENT)
        .build()
}

/// First `max` characters of a response body, for error messages
pub(crate) fn body_snippet(body: &str, max: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > max {
        format!("{}...", trimmed.chars().take(max).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
