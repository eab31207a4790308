//! Policy Gate CLI
//!
//! The `policy-gate` command evaluates artifact provenance against a Rego
//! policy and, for pipeline requests, reports the verdict to the check suite.
//!
//! ## Commands
//!
//! - `evaluate`: Dispatch an evaluation request (JSON file or stdin)
//! - `interpret`: Classify a captured evaluator output offline
//! - `namespace`: Print the package a policy declares

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use policy_gate_core::{
    ChecksConfig, Dispatch, EvaluationRequest, EvaluatorConfig, OutputInterpreter,
    PolicyCheckService, ReportOutcome,
};
use policy_gate_eval::config::{OPA_BIN_ENV, WORK_DIR_ENV};
use policy_gate_eval::{extract_namespace_within, PACKAGE_MATCH_BUDGET};

#[derive(Parser)]
#[command(name = "policy-gate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate artifact provenance against Rego policies", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a request and print the verdict
    ///
    /// Requests carrying an auth token are reported to the check suite; the
    /// command waits for the report before exiting.
    Evaluate {
        /// Request body (JSON); `-` reads stdin
        #[arg(short, long, default_value = "-")]
        request: PathBuf,

        /// Evaluator executable
        #[arg(long, env = OPA_BIN_ENV, default_value = "opa")]
        opa_bin: PathBuf,

        /// Base directory for per-invocation working areas
        #[arg(long, env = WORK_DIR_ENV)]
        work_dir: Option<PathBuf>,

        /// api-version sent on check-run and timeline writes
        #[arg(long, env = "POLICY_GATE_API_VERSION", default_value = "5.0")]
        api_version: String,

        /// Attempts per remote call
        #[arg(long, env = "POLICY_GATE_HTTP_RETRIES", default_value = "5")]
        http_retries: u32,

        /// Exit non-zero when the verdict is not a pass
        #[arg(long)]
        fail_on_violations: bool,
    },

    /// Classify captured evaluator output
    Interpret {
        /// File holding the evaluator's merged stdout/stderr; `-` reads stdin
        file: PathBuf,
    },

    /// Print the package declared by a policy
    Namespace {
        /// Rego policy file; `-` reads stdin
        policy: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    policy_gate_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Evaluate {
            request,
            opa_bin,
            work_dir,
            api_version,
            http_retries,
            fail_on_violations,
        } => {
            let mut evaluator = EvaluatorConfig::from_env();
            evaluator.binary = opa_bin;
            if let Some(dir) = work_dir {
                evaluator = evaluator.with_work_dir(dir);
            }
            let checks = ChecksConfig::from_env()
                .with_api_version(&api_version)
                .with_max_attempts(http_retries);
            cmd_evaluate(
                PolicyCheckService::new(evaluator, checks),
                &request,
                fail_on_violations,
            )
            .await
        }
        Commands::Interpret { file } => cmd_interpret(&file),
        Commands::Namespace { policy } => cmd_namespace(&policy).await,
    }
}

/// Read a file, or stdin for `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).context(format!("Failed to read {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Dispatch one request and print the result
async fn cmd_evaluate(
    service: PolicyCheckService,
    request_path: &Path,
    fail_on_violations: bool,
) -> Result<()> {
    let body = read_input(request_path)?;
    let request = EvaluationRequest::from_json(&body)?;

    match service.handle(request).await? {
        Dispatch::Completed(response) => {
            print_json(&response)?;
            if fail_on_violations && !response.violations.is_empty() {
                bail!("Policy check failed: {}", response.violation_type);
            }
            Ok(())
        }
        Dispatch::Accepted {
            invocation_id,
            handle,
        } => {
            info!(%invocation_id, "Evaluation accepted, waiting for report");
            let outcome = handle
                .await
                .context("Background evaluation task panicked")?;
            match outcome {
                Some(outcome) => {
                    print_json(&outcome)?;
                    if fail_on_violations && !matches!(outcome, ReportOutcome::Written) {
                        bail!("Verdict was not written to the check run");
                    }
                    Ok(())
                }
                None => bail!("Evaluation {} failed before reporting", invocation_id),
            }
        }
    }
}

/// Classify captured evaluator output
fn cmd_interpret(path: &Path) -> Result<()> {
    let output = read_input(path)?;
    let verdict = OutputInterpreter::interpret(&output);
    let log = verdict.log().to_string();
    print_json(&verdict.into_response(log))
}

/// Print the package a policy declares
async fn cmd_namespace(path: &Path) -> Result<()> {
    let policy = read_input(path)?;
    match extract_namespace_within(&policy, PACKAGE_MATCH_BUDGET).await {
        Some(namespace) => {
            println!("{}", namespace);
            Ok(())
        }
        None => bail!("{}", policy_gate_domain::PACKAGE_UNDEFINED_MESSAGE),
    }
}
