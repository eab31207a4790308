//! Verdict reporting against a remote check suite.
//!
//! Read the check run, write only while it is still `running`. The guard is
//! optimistic: another writer can still finalize the run between the read
//! and the write.

use std::sync::Arc;

use policy_gate_domain::DiagnosticLog;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::checks::{CheckRunApi, CheckRunStatus, CheckRunUpdate};
use crate::retry::RetryPolicy;

/// How a report attempt ended. Never an error: reporting is best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    /// The new status was written.
    Written,
    /// The run was not `running`, so nothing was written.
    Skipped { status: Option<CheckRunStatus> },
    /// The current state could not be read within the retry budget.
    ReadFailed,
    /// The write failed within the retry budget.
    WriteFailed,
}

impl ReportOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, ReportOutcome::Written)
    }
}

/// Posts verdicts to a check suite through a `CheckRunApi`.
pub struct CheckSuiteReporter {
    api: Arc<dyn CheckRunApi>,
    retry: RetryPolicy,
}

impl CheckSuiteReporter {
    pub fn new(api: Arc<dyn CheckRunApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Report `succeeded` and `message` for `check_id`.
    ///
    /// Failures are written to `log` and folded into the outcome.
    pub async fn report(
        &self,
        check_id: Uuid,
        succeeded: bool,
        message: &str,
        log: &DiagnosticLog,
    ) -> ReportOutcome {
        let current = self
            .retry
            .invoke("check_run.get", || self.api.get_check_run(check_id))
            .await;

        let run = match current {
            Ok(run) => run,
            Err(e) => {
                warn!(%check_id, error = %e, "Could not read check run");
                log.log_always(&format!(
                    "Failed to fetch current check status with error message : {}",
                    e
                ));
                return ReportOutcome::ReadFailed;
            }
        };

        if !run.is_running() {
            let status = run.status;
            info!(
                %check_id,
                status = status.as_ref().map(CheckRunStatus::as_str).unwrap_or("unknown"),
                "Check run already finalized, skipping update"
            );
            log.log(&format!(
                "Check run is no longer running (status: {}). Skipping update",
                status.as_ref().map(CheckRunStatus::as_str).unwrap_or("unknown")
            ));
            return ReportOutcome::Skipped { status };
        }

        let update = CheckRunUpdate::verdict(succeeded, message);
        log.log(&format!(
            "Posting check status {} for check run {}",
            update.status, check_id
        ));

        let written = self
            .retry
            .invoke("check_run.update", || {
                self.api.update_check_run(check_id, &update)
            })
            .await;

        match written {
            Ok(()) => {
                info!(%check_id, status = %update.status, "Check run updated");
                ReportOutcome::Written
            }
            Err(e) => {
                warn!(%check_id, error = %e, "Could not update check run");
                log.log_always(&format!(
                    "Failed to update check status with error message : {}",
                    e
                ));
                ReportOutcome::WriteFailed
            }
        }
    }
}
