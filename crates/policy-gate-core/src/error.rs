//! Errors surfaced to direct callers of the service.

use policy_gate_domain::RequestError;
use policy_gate_eval::EvalError;
use thiserror::Error;

/// Why a request could not be answered.
///
/// Classified verdicts are not errors; only rejected requests and evaluator
/// infrastructure failures land here.
#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Policy evaluation failed: {0}")]
    Evaluation(#[from] EvalError),
}

impl GateError {
    /// Whether the caller sent a bad request (as opposed to a server fault).
    pub fn is_rejection(&self) -> bool {
        matches!(self, GateError::Request(_))
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, GateError>;
