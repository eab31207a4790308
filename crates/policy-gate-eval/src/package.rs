//! Package (namespace) extraction from Rego source.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

/// Time allowed for matching the package declaration.
pub const PACKAGE_MATCH_BUDGET: Duration = Duration::from_secs(1);

fn package_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)package\s([a-zA-Z0-9.]+)").expect("package pattern is a valid regex")
    })
}

/// Extract the dotted package name declared by a policy.
///
/// Matches the first `package <name>` occurrence, case-insensitively.
/// Returns `None` when no package is declared.
pub fn extract_namespace(policy: &str) -> Option<String> {
    package_pattern()
        .captures(policy)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| !name.trim().is_empty())
}

/// Like [`extract_namespace`], but gives up after `budget`.
///
/// The match runs on the blocking pool; a match that overruns the budget
/// or panics counts as "no package".
pub async fn extract_namespace_within(policy: &str, budget: Duration) -> Option<String> {
    let policy = policy.to_owned();
    let matcher = tokio::task::spawn_blocking(move || extract_namespace(&policy));

    match tokio::time::timeout(budget, matcher).await {
        Ok(Ok(namespace)) => namespace,
        Ok(Err(e)) => {
            warn!(error = %e, "Package extraction task failed");
            None
        }
        Err(_) => {
            warn!(budget_ms = budget.as_millis() as u64, "Package extraction timed out");
            None
        }
    }
}
