//! Policy Gate Eval - policy evaluation via an external Rego evaluator
//!
//! Provides the evaluation half of the gate:
//! - Extracts the policy package to build the `data.<package>.violations` query
//! - Runs the evaluator in a private, self-removing working area
//! - Classifies the evaluator output into a `Verdict`

pub mod command;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod invoker;
pub mod package;
pub mod workspace;

// Re-export key types
pub use command::{EvaluatorCommand, ExplainMode};
pub use config::EvaluatorConfig;
pub use error::{EvalError, Result};
pub use interpreter::{normalize_newlines, OutputInterpreter};
pub use invoker::{EvaluatorOutput, PolicyEvaluator};
pub use package::{extract_namespace, extract_namespace_within, PACKAGE_MATCH_BUDGET};
pub use workspace::{EvaluationContext, WorkingArea};
