//! Evaluator configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the evaluator binary.
pub const OPA_BIN_ENV: &str = "POLICY_GATE_OPA_BIN";

/// Environment variable naming the base directory for working areas.
pub const WORK_DIR_ENV: &str = "POLICY_GATE_WORK_DIR";

/// How to launch the external evaluator and where it may write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Evaluator executable (looked up on `PATH` when not absolute).
    pub binary: PathBuf,

    /// Arguments placed before the `eval` sub-command, for launchers and wrappers.
    pub leading_args: Vec<String>,

    /// Base directory under which per-invocation working areas are created.
    pub work_dir: PathBuf,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            binary: std::env::var(OPA_BIN_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("opa")),
            leading_args: Vec::new(),
            work_dir: std::env::var(WORK_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("policy-gate")),
        }
    }
}

impl EvaluatorConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific binary and base directory
    pub fn new(binary: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        EvaluatorConfig {
            binary: binary.into(),
            leading_args: Vec::new(),
            work_dir: work_dir.into(),
        }
    }

    /// Set launcher arguments
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working-area base directory
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluator_config_default() {
        let config = EvaluatorConfig::default();
        assert!(!config.binary.as_os_str().is_empty());
        assert!(!config.work_dir.as_os_str().is_empty());
        assert!(config.leading_args.is_empty());
    }

    #[test]
    fn test_evaluator_config_new() {
        let config = EvaluatorConfig::new("/usr/local/bin/opa", "/var/lib/policy-gate");
        assert_eq!(config.binary, PathBuf::from("/usr/local/bin/opa"));
        assert_eq!(config.work_dir, PathBuf::from("/var/lib/policy-gate"));
    }

    #[test]
    fn test_evaluator_config_with_leading_args() {
        let config = EvaluatorConfig::new("sh", "/tmp").with_leading_args(["-c", "true"]);
        assert_eq!(config.leading_args, vec!["-c".to_string(), "true".to_string()]);
    }
}
