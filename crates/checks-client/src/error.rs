//! Error types for checks-client

use thiserror::Error;

/// Errors from the remote check-run and timeline APIs
#[derive(Error, Debug)]
pub enum ChecksError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status
    #[error("{method} {url} returned status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// Response or request body could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Host URL could not be turned into an endpoint
    #[error("Invalid URL: {0}")]
    Url(String),
}

impl From<reqwest::Error> for ChecksError {
    fn from(err: reqwest::Error) -> Self {
        ChecksError::Http(err.to_string())
    }
}
