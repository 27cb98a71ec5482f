//! Error types for the remote job API client.
//!
//! Every variant is transient from the monitor's point of view: a failed call
//! is reported (or skipped) for the current cycle and retried on the next one.

use thiserror::Error;

/// Errors that can occur while talking to the remote job API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Any non-success HTTP status (4xx/5xx), with the response body.
    #[error("HTTP {status} for {url}: {message}")]
    ApiError {
        status: u16,
        url: String,
        message: String,
    },

    /// Underlying network failure (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The body was not the JSON shape the endpoint promises.
    #[error("failed to parse response from {url}: {reason}")]
    ParseError { url: String, reason: String },

    /// The configured API base is not an absolute http(s)-style URL.
    #[error("invalid API base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
