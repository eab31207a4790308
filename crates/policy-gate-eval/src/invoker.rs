//! Evaluator subprocess execution.

use std::process::Stdio;

use policy_gate_domain::{DiagnosticLog, Verdict};
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::{EvaluatorCommand, ExplainMode};
use crate::config::EvaluatorConfig;
use crate::error::{EvalError, Result};
use crate::interpreter::OutputInterpreter;
use crate::package::{extract_namespace_within, PACKAGE_MATCH_BUDGET};
use crate::workspace::{EvaluationContext, WorkingArea};

/// Raw result of one evaluator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorOutput {
    /// Merged stdout and stderr.
    pub raw_output: String,

    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,
}

impl EvaluatorOutput {
    /// Whether the query executed (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs policies through the external evaluator.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    config: EvaluatorConfig,
}

impl PolicyEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(EvaluatorConfig::from_env())
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate `policy` against `evidence` and classify the result.
    ///
    /// A policy without a package short-circuits to a `PackageUndefined`
    /// verdict without starting the evaluator. A non-zero exit yields an
    /// `ExecutionError` verdict and the output is not parsed.
    pub async fn evaluate(
        &self,
        evidence: &str,
        policy: &str,
        ctx: &EvaluationContext,
        log: &DiagnosticLog,
    ) -> Result<Verdict> {
        let namespace = extract_namespace_within(policy, PACKAGE_MATCH_BUDGET).await;
        log.log(&format!(
            "Package name : {}",
            namespace.as_deref().unwrap_or_default()
        ));

        let Some(namespace) = namespace else {
            let verdict = Verdict::package_undefined();
            log.log_always(verdict.log());
            return Ok(verdict);
        };

        let output = self.run(evidence, policy, &namespace, ctx, log).await?;
        if !output.success() {
            return Ok(Verdict::execution_error(output.raw_output));
        }

        log.log(&format!(
            "Output of policy check : {}",
            OutputInterpreter::candidate(&output.raw_output)
        ));
        let verdict = OutputInterpreter::interpret(&output.raw_output);
        log.log_always(verdict.log());
        Ok(verdict)
    }

    /// Run the evaluator for `namespace` and capture its merged output.
    ///
    /// The working area is removed before this returns, whether the run
    /// succeeded or not.
    pub async fn run(
        &self,
        evidence: &str,
        policy: &str,
        namespace: &str,
        ctx: &EvaluationContext,
        log: &DiagnosticLog,
    ) -> Result<EvaluatorOutput> {
        let area = WorkingArea::create(ctx)?;
        log.log(&format!("Folder created : {}", area.path().display()));

        area.write_evidence(evidence)?;
        log.log("Image provenance file created");
        log.log(&format!(
            "Image provenance : \r\n{}",
            display_evidence(evidence, log.debug_enabled())
        ));
        area.write_policy(policy)?;
        log.log("Policy content file created");
        log.log(&format!("Policy definitions : \r\n{}", policy));

        let command = EvaluatorCommand::derive(
            &self.config,
            area.folder_name(),
            namespace,
            ExplainMode::for_debug(log.debug_enabled()),
        );
        log.log(&format!("Command line cmd: {}", command.command_line()));

        let stdout = area.create_output()?;
        let stderr = stdout.try_clone()?;

        log.log_always("Initiating evaluation");
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(ctx.base_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EvalError::Spawn {
                program: command.program.to_string_lossy().into_owned(),
                source,
            })?;
        log.log_always("Evaluation is in progress");

        let status = child.wait().await?;
        log.log_always("Evaluation complete. Processing result");

        let exit_code = status.code().unwrap_or(-1);
        log.log(&format!("Completed executing with exit code {}", exit_code));

        let raw_output = area.read_output()?;
        info!(
            invocation_id = %ctx.invocation_id(),
            exit_code,
            output_bytes = raw_output.len(),
            "Evaluator finished"
        );
        debug!(output = %raw_output, "Evaluator output");

        Ok(EvaluatorOutput {
            raw_output,
            exit_code,
        })
    }
}

/// Evidence as shown in diagnostics: indented in debug mode, verbatim otherwise.
fn display_evidence(evidence: &str, debug: bool) -> String {
    if !debug {
        return evidence.to_string();
    }
    serde_json::from_str::<serde_json::Value>(evidence)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| evidence.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluator_output_success() {
        let output = EvaluatorOutput {
            raw_output: "[]".to_string(),
            exit_code: 0,
        };
        assert!(output.success());
    }

    #[test]
    fn test_evaluator_output_failure() {
        let output = EvaluatorOutput {
            raw_output: "error".to_string(),
            exit_code: 1,
        };
        assert!(!output.success());
    }

    #[test]
    fn test_display_evidence_indents_in_debug() {
        assert_eq!(display_evidence("[1]", false), "[1]");
        assert_eq!(display_evidence("[1]", true), "[\n  1\n]");
        assert_eq!(display_evidence("not json", true), "not json");
    }

    #[tokio::test]
    async fn test_package_undefined_skips_evaluator() {
        let base = tempfile::tempdir().unwrap();
        // A binary that cannot exist: reaching the spawn would be an error.
        let evaluator = PolicyEvaluator::new(EvaluatorConfig::new(
            "/nonexistent/policy-evaluator",
            base.path(),
        ));
        let ctx = EvaluationContext::new(base.path());
        let log = DiagnosticLog::with_debug(false).with_buffer();

        let verdict = evaluator
            .evaluate("[{}]", "default allow = true", &ctx, &log)
            .await
            .expect("package-undefined is a verdict, not an error");

        assert_eq!(
            verdict.kind(),
            policy_gate_domain::ViolationKind::PackageUndefined
        );
        assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
        assert!(log
            .buffered()
            .contains(policy_gate_domain::PACKAGE_UNDEFINED_MESSAGE));
    }
}
