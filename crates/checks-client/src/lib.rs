//! Checks Client: remote side of the policy gate
//!
//! Talks to the pipeline service on behalf of asynchronous evaluations:
//! - `RetryPolicy`: fixed attempt budget around every network call
//! - `CheckRunApi` / `HttpCheckRunClient`: read and write check runs
//! - `CheckSuiteReporter`: read-before-write verdict reporting
//! - `TimelineLogger`: buffered live log feed for the pipeline job
//! - `fakes`: in-memory implementations for tests

pub mod checks;
pub mod config;
mod error;
pub mod fakes;
pub mod reporter;
pub mod retry;
pub mod timeline;

pub use checks::{CheckRun, CheckRunApi, CheckRunStatus, CheckRunUpdate, HttpCheckRunClient};
pub use config::ChecksConfig;
pub use error::ChecksError;
pub use reporter::{CheckSuiteReporter, ReportOutcome};
pub use retry::RetryPolicy;
pub use timeline::{HttpTimelineFeed, TimelineFeed, TimelineLogger};

/// Result type for checks-client operations
pub type Result<T> = std::result::Result<T, ChecksError>;
