//! Per-invocation working areas.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::command::{EVIDENCE_FILE, OUTPUT_FILE, POLICY_FILE};
use crate::error::{EvalError, Result};

/// Execution-scoped identifiers for one evaluation invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationContext {
    invocation_id: Uuid,
    base_dir: PathBuf,
    started_at: DateTime<Utc>,
}

impl EvaluationContext {
    /// Fresh context with a random invocation id.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_invocation_id(Uuid::new_v4(), base_dir)
    }

    pub fn with_invocation_id(invocation_id: Uuid, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            invocation_id,
            base_dir: base_dir.into(),
            started_at: Utc::now(),
        }
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Milliseconds since the context was created.
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Working-area directory name, unique per invocation id.
    pub fn folder_name(&self) -> String {
        format!("Policy-{}", self.invocation_id.simple())
    }
}

/// A private directory holding the evaluator's input and output files.
///
/// The directory is removed when the guard is dropped, on every exit path.
#[derive(Debug)]
pub struct WorkingArea {
    path: PathBuf,
    folder_name: String,
}

impl WorkingArea {
    /// Create the working area for `ctx`.
    ///
    /// Fails if a directory with the same name already exists.
    pub fn create(ctx: &EvaluationContext) -> Result<Self> {
        let folder_name = ctx.folder_name();
        let path = ctx.base_dir().join(&folder_name);

        fs::create_dir_all(ctx.base_dir())
            .and_then(|_| fs::create_dir(&path))
            .map_err(|source| EvalError::WorkingArea {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "Working area created");
        Ok(Self { path, folder_name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    pub fn evidence_path(&self) -> PathBuf {
        self.path.join(EVIDENCE_FILE)
    }

    pub fn policy_path(&self) -> PathBuf {
        self.path.join(POLICY_FILE)
    }

    pub fn output_path(&self) -> PathBuf {
        self.path.join(OUTPUT_FILE)
    }

    /// Write the evidence document verbatim.
    pub fn write_evidence(&self, evidence: &str) -> Result<()> {
        self.write(self.evidence_path(), evidence)
    }

    /// Write the policy source verbatim.
    pub fn write_policy(&self, policy: &str) -> Result<()> {
        self.write(self.policy_path(), policy)
    }

    fn write(&self, path: PathBuf, contents: &str) -> Result<()> {
        fs::write(&path, contents).map_err(|source| EvalError::WorkingArea { path, source })
    }

    /// Create (truncate) the output capture file.
    pub fn create_output(&self) -> Result<File> {
        let path = self.output_path();
        File::create(&path).map_err(|source| EvalError::WorkingArea { path, source })
    }

    /// Read the captured output once the evaluator has exited.
    pub fn read_output(&self) -> Result<String> {
        let bytes = fs::read(self.output_path())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Drop for WorkingArea {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Working area removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove working area"
            ),
        }
    }
}
