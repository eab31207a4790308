//! Policy Gate Domain Model
//!
//! Defines the objects shared by every layer of the policy gate:
//! - EvaluationRequest: evidence + policy + variables + optional orchestration ids
//! - TaskProperties: validated orchestration ids for asynchronous requests
//! - Verdict: classified outcome of one policy evaluation
//! - EvaluationResponse: caller-facing verdict shape for synchronous requests
//! - DiagnosticLog: debug-gated fan-out of progress messages

pub mod diagnostics;
pub mod error;
pub mod request;
pub mod verdict;

pub use diagnostics::{DiagnosticLog, TimelineSink};
pub use error::{RequestError, Result};
pub use request::{EvaluationRequest, HubName, TaskProperties, Variables, DEBUG_VARIABLE};
pub use verdict::{
    EvaluationResponse, Verdict, ViolationKind, EXECUTION_ERROR_PREFIX, PACKAGE_UNDEFINED_MESSAGE,
    RULE_UNDEFINED_MESSAGE,
};

/// Policy gate domain version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
