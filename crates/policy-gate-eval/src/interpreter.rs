//! Classification of raw evaluator output.
//!
//! The evaluator prints an optional explain trace followed by the query
//! result: a pretty-printed JSON array, `[]`, or the bare word `undefined`.
//!
//! Classification rule:
//! 1. The candidate JSON starts at the first `[` + newline; failing that, at
//!    the first `[]`; failing both, it is empty.
//! 2. A candidate that parses as an array yields its elements as violations.
//! 3. Otherwise `undefined` at the start of the output or right after a
//!    newline means the `violations` rule is not defined.
//! 4. Anything else is treated as no violations.
//!
//! The first marker found is final, even if the trace itself happens to
//! contain one and parsing then fails.

use policy_gate_domain::Verdict;
use serde_json::Value;

const MULTILINE_ARRAY_MARKER: &str = "[\n";
const EMPTY_ARRAY_MARKER: &str = "[]";
const UNDEFINED_MARKER: &str = "undefined";

/// Stateless interpreter for evaluator output.
pub struct OutputInterpreter;

impl OutputInterpreter {
    /// Substring of `output` that should hold the result array, or `""`.
    pub fn candidate(output: &str) -> &str {
        output
            .find(MULTILINE_ARRAY_MARKER)
            .or_else(|| output.find(EMPTY_ARRAY_MARKER))
            .map(|index| &output[index..])
            .unwrap_or("")
    }

    /// Classify raw evaluator output into a verdict.
    ///
    /// The verdict log is the newline-normalized output; marker searches use
    /// the output as given.
    pub fn interpret(output: &str) -> Verdict {
        let log = normalize_newlines(output);

        match serde_json::from_str::<Vec<Value>>(Self::candidate(output)) {
            Ok(values) => Verdict::from_violations(values.iter().map(render).collect(), log),
            Err(_) if is_undefined(output) => Verdict::rule_undefined(log),
            Err(_) => Verdict::from_violations(Vec::new(), log),
        }
    }
}

/// Render one result element the way the evaluator pretty-prints it.
fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn is_undefined(output: &str) -> bool {
    output.starts_with(UNDEFINED_MARKER) || output.contains("\nundefined")
}

/// Convert every `\n` not already preceded by `\r` into `\r\n`.
pub fn normalize_newlines(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len() + text.len() / 16);
    let mut previous = None;
    for ch in text.chars() {
        if ch == '\n' && previous != Some('\r') {
            normalized.push('\r');
        }
        normalized.push(ch);
        previous = Some(ch);
    }
    normalized
}
