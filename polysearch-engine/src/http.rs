//! Shared HTTP client construction for adapters, probes, and collaborator calls.

use crate::error::SearchError;
use std::time::Duration;

/// User-Agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("polysearch/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] with a request timeout and User-Agent.
///
/// The client has:
/// - Timeout applied to every request (connect + body)
/// - The given User-Agent, or [`DEFAULT_USER_AGENT`]
/// - Brotli and gzip decompression
/// - At most 10 redirects
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(
    timeout: Duration,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Collapse a reqwest error into a short, credential-free reason.
pub fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection refused".to_string()
    } else if let Some(status) = err.status() {
        format!("HTTP {status}")
    } else if err.is_decode() {
        "invalid response body".to_string()
    } else {
        // reqwest errors include the URL, which never carries credentials here.
        err.to_string()
    }
}
