//! Remote client configuration.

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

pub const API_VERSION_ENV: &str = "POLICY_GATE_API_VERSION";
pub const HTTP_RETRIES_ENV: &str = "POLICY_GATE_HTTP_RETRIES";

pub const DEFAULT_API_VERSION: &str = "5.0";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Settings shared by the check-run and timeline clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksConfig {
    /// Value of the `api-version` query parameter on writes
    pub api_version: String,
    /// Total attempts per network call, first try included
    pub max_attempts: u32,
    /// Pause between attempts (0 = retry immediately)
    pub retry_delay_ms: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        ChecksConfig {
            api_version: std::env::var(API_VERSION_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            max_attempts: std::env::var(HTTP_RETRIES_ENV)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            retry_delay_ms: 0,
            user_agent: format!("policy-gate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ChecksConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Retry policy for calls made with this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_delay_ms(self.retry_delay_ms)
    }
}
