//! Structured observability hooks for evaluation lifecycle events.
//!
//! This module provides:
//! - Invocation-scoped spans (`InvocationSpan` guard for synchronous code,
//!   `invocation_span` for instrumenting futures)
//! - Emission functions for start, finish, report and background failure
//!
//! Events are emitted at `info!` level (failures at `warn!`), filtered through
//! `RUST_LOG` like everything else.

use checks_client::ReportOutcome;
use policy_gate_domain::ViolationKind;
use tracing::{info, warn, Span};
use uuid::Uuid;

/// RAII guard that enters an invocation-scoped span.
///
/// Not `Send`; hold it only in synchronous code. Futures should be
/// instrumented with [`invocation_span`] instead.
pub struct InvocationSpan {
    _span: tracing::span::EnteredSpan,
}

impl InvocationSpan {
    pub fn enter(invocation_id: &Uuid) -> Self {
        Self {
            _span: invocation_span(invocation_id).entered(),
        }
    }
}

/// Span tagged with the invocation id.
pub fn invocation_span(invocation_id: &Uuid) -> Span {
    tracing::info_span!("policy_gate.invocation", invocation_id = %invocation_id)
}

/// Emit event: evaluation started.
pub fn emit_evaluation_started(invocation_id: &Uuid, asynchronous: bool) {
    info!(
        event = "evaluation.started",
        invocation_id = %invocation_id,
        asynchronous = asynchronous,
    );
}

/// Emit event: verdict computed.
pub fn emit_evaluation_finished(
    invocation_id: &Uuid,
    kind: ViolationKind,
    violations: usize,
    duration_ms: u64,
) {
    info!(
        event = "evaluation.finished",
        invocation_id = %invocation_id,
        kind = %kind,
        violations = violations,
        duration_ms = duration_ms,
    );
}

/// Emit event: verdict report attempt finished.
pub fn emit_report_finished(invocation_id: &Uuid, check_id: &Uuid, outcome: &ReportOutcome) {
    let outcome = match outcome {
        ReportOutcome::Written => "written",
        ReportOutcome::Skipped { .. } => "skipped",
        ReportOutcome::ReadFailed => "read_failed",
        ReportOutcome::WriteFailed => "write_failed",
    };
    info!(
        event = "report.finished",
        invocation_id = %invocation_id,
        check_id = %check_id,
        outcome = outcome,
    );
}

/// Emit event: background task ended on an error (warning level).
pub fn emit_background_failed(invocation_id: &Uuid, error: &dyn std::fmt::Display) {
    warn!(event = "background.failed", invocation_id = %invocation_id, error = %error);
}
