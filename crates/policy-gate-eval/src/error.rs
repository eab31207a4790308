//! Error types for policy evaluation

use std::path::PathBuf;

use thiserror::Error;

/// Failures that prevent an evaluation from producing a verdict.
///
/// Classified outcomes (package undefined, evaluator exit failure) are
/// verdicts, not errors.
#[derive(Error, Debug)]
pub enum EvalError {
    /// The working area could not be created or populated
    #[error("Working area {} could not be prepared: {source}", .path.display())]
    WorkingArea {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The evaluator process could not be started
    #[error("Failed to start evaluator '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;
