//! Policy Gate Core Library
//!
//! Ties the evaluator and the remote clients together: validates requests,
//! evaluates synchronous ones inline and hands asynchronous ones to a
//! background task that reports the verdict to the check suite.

pub mod error;
pub mod obs;
pub mod service;
pub mod telemetry;

pub use error::{GateError, Result};
pub use obs::InvocationSpan;
pub use service::{Dispatch, HttpConnector, PolicyCheckService, RemoteConnector};
pub use telemetry::init_tracing;

pub use checks_client::{ChecksConfig, ReportOutcome, RetryPolicy};
pub use policy_gate_domain::{
    EvaluationRequest, EvaluationResponse, RequestError, Verdict, ViolationKind,
};
pub use policy_gate_eval::{EvalError, EvaluatorConfig, OutputInterpreter, PolicyEvaluator};
