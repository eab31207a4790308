//! Classified outcome of one policy evaluation.

use serde::{Deserialize, Serialize};

/// Diagnostic used when the policy declares no package.
pub const PACKAGE_UNDEFINED_MESSAGE: &str = "No package name could be inferred from the policy. Cannot continue execution. Ensure that policy contains a package name defined";

/// Diagnostic used when the evaluator reports `violations` as undefined.
pub const RULE_UNDEFINED_MESSAGE: &str =
    "violations is not defined in the policy. Please define a rule called violations";

/// Prefix of the diagnostic wrapping the raw output of a failed evaluator run.
pub const EXECUTION_ERROR_PREFIX: &str = "Policy run had issues: ";

/// Closed set of verdict classifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// The query returned an empty array, or nothing recognizable.
    #[default]
    #[serde(rename = "none")]
    None,

    /// The query returned a non-empty array.
    #[serde(rename = "violationsListNotEmpty")]
    ViolationsPresent,

    /// The `violations` rule does not exist in the policy.
    #[serde(rename = "violationsNotDefined")]
    RuleUndefined,

    /// The policy declares no package, so there was nothing to query.
    #[serde(rename = "packageNotDefined")]
    PackageUndefined,

    /// The evaluator exited non-zero.
    #[serde(rename = "policyExecutionError")]
    ExecutionError,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::None => "none",
            ViolationKind::ViolationsPresent => "violationsListNotEmpty",
            ViolationKind::RuleUndefined => "violationsNotDefined",
            ViolationKind::PackageUndefined => "packageNotDefined",
            ViolationKind::ExecutionError => "policyExecutionError",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of one evaluation: kind, violation messages and the output log.
///
/// Only constructible through the associated functions, which keep the kind
/// and the violation list consistent: `None` always has an empty list, every
/// other kind has at least one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    kind: ViolationKind,
    violations: Vec<String>,
    log: String,
}

impl Verdict {
    /// Verdict for a parsed violations array.
    pub fn from_violations(violations: Vec<String>, log: impl Into<String>) -> Self {
        let kind = if violations.is_empty() {
            ViolationKind::None
        } else {
            ViolationKind::ViolationsPresent
        };
        Self {
            kind,
            violations,
            log: log.into(),
        }
    }

    /// The evaluator ran but reported `violations` as undefined.
    pub fn rule_undefined(log: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::RuleUndefined,
            violations: vec![RULE_UNDEFINED_MESSAGE.to_string()],
            log: log.into(),
        }
    }

    /// No package could be extracted; the evaluator was never started.
    pub fn package_undefined() -> Self {
        Self {
            kind: ViolationKind::PackageUndefined,
            violations: vec![PACKAGE_UNDEFINED_MESSAGE.to_string()],
            log: PACKAGE_UNDEFINED_MESSAGE.to_string(),
        }
    }

    /// The evaluator exited non-zero; the raw output is kept verbatim.
    pub fn execution_error(raw_output: impl Into<String>) -> Self {
        let raw_output = raw_output.into();
        Self {
            kind: ViolationKind::ExecutionError,
            violations: vec![format!("{}{}", EXECUTION_ERROR_PREFIX, raw_output)],
            log: raw_output,
        }
    }

    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Output log, newline-normalized for line-oriented viewers.
    pub fn log(&self) -> &str {
        &self.log
    }

    /// A check passes only when nothing was reported at all.
    pub fn succeeded(&self) -> bool {
        self.violations.is_empty()
    }

    /// Caller-facing shape, carrying the diagnostics collected for the caller.
    pub fn into_response(self, logs: String) -> EvaluationResponse {
        EvaluationResponse {
            violations: self.violations,
            logs,
            violation_type: self.kind,
        }
    }
}

/// Response body for synchronous evaluations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResponse {
    pub violations: Vec<String>,
    pub logs: String,
    pub violation_type: ViolationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_violations_is_none() {
        let verdict = Verdict::from_violations(vec![], "[]");
        assert_eq!(verdict.kind(), ViolationKind::None);
        assert!(verdict.succeeded());
        assert_eq!(verdict.log(), "[]");
    }

    #[test]
    fn test_non_empty_violations_is_present() {
        let verdict = Verdict::from_violations(vec!["\"bad\"".to_string()], "log");
        assert_eq!(verdict.kind(), ViolationKind::ViolationsPresent);
        assert!(!verdict.succeeded());
    }

    #[test]
    fn test_synthetic_verdicts_carry_one_message() {
        let verdict = Verdict::package_undefined();
        assert_eq!(verdict.kind(), ViolationKind::PackageUndefined);
        assert_eq!(verdict.violations(), [PACKAGE_UNDEFINED_MESSAGE]);

        let verdict = Verdict::execution_error("opa: error: boom");
        assert_eq!(verdict.kind(), ViolationKind::ExecutionError);
        assert_eq!(
            verdict.violations(),
            ["Policy run had issues: opa: error: boom"]
        );
        assert_eq!(verdict.log(), "opa: error: boom");

        let verdict = Verdict::rule_undefined("undefined");
        assert_eq!(verdict.violations(), [RULE_UNDEFINED_MESSAGE]);
        assert!(!verdict.succeeded());
    }

    #[test]
    fn test_response_wire_shape() {
        let response = Verdict::rule_undefined("undefined").into_response("buffered\r\n".into());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["violationType"], "violationsNotDefined");
        assert_eq!(value["logs"], "buffered\r\n");
        assert_eq!(value["violations"][0], RULE_UNDEFINED_MESSAGE);
    }

    #[test]
    fn test_kind_wire_names_match_display() {
        for kind in [
            ViolationKind::None,
            ViolationKind::ViolationsPresent,
            ViolationKind::RuleUndefined,
            ViolationKind::PackageUndefined,
            ViolationKind::ExecutionError,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }
}
