//! Error types for request validation

use thiserror::Error;

/// Errors that reject a request before any evaluation work begins.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Request body is invalid. Encountered error : {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Image provenance is empty")]
    EmptyEvidence,

    #[error("Policy data is empty")]
    EmptyPolicy,

    #[error(
        "Required properties '{}' are missing. Please provide these values and try again.",
        .0.join(", ")
    )]
    MissingProperties(Vec<&'static str>),

    #[error("Invalid hub name '{0}'. Please provide valid hub name from 'Build, Gates'.")]
    InvalidHubName(String),
}

/// Result type for request validation
pub type Result<T> = std::result::Result<T, RequestError>;
