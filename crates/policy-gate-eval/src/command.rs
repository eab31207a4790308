//! Evaluator command-line derivation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::EvaluatorConfig;

/// Evidence file name inside a working area.
pub const EVIDENCE_FILE: &str = "ImageProvenance.json";

/// Policy file name inside a working area.
pub const POLICY_FILE: &str = "Policies.rego";

/// Captured output file name inside a working area.
pub const OUTPUT_FILE: &str = "Output.txt";

/// Verbosity of the evaluator's explain trace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExplainMode {
    /// Only `trace()` notes from the policy.
    Notes,

    /// The full evaluation trace.
    Full,
}

impl ExplainMode {
    /// `Full` in debug mode, `Notes` otherwise.
    pub fn for_debug(debug: bool) -> Self {
        if debug {
            ExplainMode::Full
        } else {
            ExplainMode::Notes
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExplainMode::Notes => "notes",
            ExplainMode::Full => "full",
        }
    }
}

/// A fully derived evaluator invocation.
///
/// File arguments are relative to the working-area base directory, which is
/// also the process working directory. Standard output and standard error
/// are both redirected into `output_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorCommand {
    /// Executable to run.
    pub program: PathBuf,

    /// Arguments, launcher arguments first.
    pub args: Vec<String>,

    /// Capture file for the merged output streams.
    pub output_file: PathBuf,
}

impl EvaluatorCommand {
    /// Derive the command for one working area and package.
    pub fn derive(
        config: &EvaluatorConfig,
        folder_name: &str,
        namespace: &str,
        explain: ExplainMode,
    ) -> Self {
        let folder = Path::new(folder_name);
        let mut args = config.leading_args.clone();
        args.extend([
            "eval".to_string(),
            "-f".to_string(),
            "pretty".to_string(),
            "--explain".to_string(),
            explain.as_str().to_string(),
            "-i".to_string(),
            folder.join(EVIDENCE_FILE).to_string_lossy().into_owned(),
            "-d".to_string(),
            folder.join(POLICY_FILE).to_string_lossy().into_owned(),
            Self::query(namespace),
        ]);

        Self {
            program: config.binary.clone(),
            args,
            output_file: folder.join(OUTPUT_FILE),
        }
    }

    /// Query path for a package's violations rule.
    pub fn query(namespace: &str) -> String {
        format!("data.{}.violations", namespace)
    }

    /// Shell-style rendering for diagnostics.
    pub fn command_line(&self) -> String {
        let mut line = quote(&self.program.to_string_lossy());
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        line.push_str(" > ");
        line.push_str(&quote(&self.output_file.to_string_lossy()));
        line.push_str(" 2>&1");
        line
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}
