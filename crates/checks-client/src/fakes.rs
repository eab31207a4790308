//! In-memory fakes for the remote APIs (testing only)
//!
//! Provides `MemoryCheckRuns` and `MemoryTimeline` that satisfy the trait
//! contracts without any network access. Both can be told to fail the next
//! N calls to exercise retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use policy_gate_domain::TimelineSink;
use uuid::Uuid;

use crate::checks::{CheckRun, CheckRunApi, CheckRunStatus, CheckRunUpdate};
use crate::error::ChecksError;
use crate::timeline::TimelineFeed;
use crate::Result;

/// Consume one injected failure, if any are pending.
fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

// ---------------------------------------------------------------------------
// MemoryCheckRuns
// ---------------------------------------------------------------------------

/// In-memory check runs backed by a `HashMap<check id, CheckRun>`.
///
/// A successful update overwrites the stored status, so a second reporter
/// sees the run as already finalized.
#[derive(Debug, Default)]
pub struct MemoryCheckRuns {
    runs: Mutex<HashMap<Uuid, CheckRun>>,
    updates: Mutex<Vec<(Uuid, CheckRunUpdate)>>,
    reads: AtomicU32,
    failing_reads: AtomicU32,
    failing_writes: AtomicU32,
}

impl MemoryCheckRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a check run with `status`.
    pub fn insert(&self, check_id: Uuid, status: CheckRunStatus) {
        let mut runs = self.runs.lock().unwrap();
        runs.insert(
            check_id,
            CheckRun {
                id: Some(check_id),
                ..CheckRun::with_status(status)
            },
        );
    }

    pub fn get(&self, check_id: Uuid) -> Option<CheckRun> {
        self.runs.lock().unwrap().get(&check_id).cloned()
    }

    /// Every successful write, in order.
    pub fn updates(&self) -> Vec<(Uuid, CheckRunUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    /// Number of read attempts, failed ones included.
    pub fn read_count(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_next_reads(&self, n: u32) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl CheckRunApi for MemoryCheckRuns {
    async fn get_check_run(&self, check_id: Uuid) -> Result<CheckRun> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_reads) {
            return Err(ChecksError::Http("injected read failure".to_string()));
        }

        let runs = self.runs.lock().unwrap();
        runs.get(&check_id).cloned().ok_or_else(|| ChecksError::Status {
            method: "GET",
            url: format!("memory://checks/runs/{}", check_id),
            status: 404,
        })
    }

    async fn update_check_run(&self, check_id: Uuid, update: &CheckRunUpdate) -> Result<()> {
        if take_failure(&self.failing_writes) {
            return Err(ChecksError::Http("injected write failure".to_string()));
        }

        let mut runs = self.runs.lock().unwrap();
        let run = runs.entry(check_id).or_default();
        run.status = Some(update.status.clone());
        run.result_message = Some(update.result_message.clone());
        self.updates.lock().unwrap().push((check_id, update.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryTimeline
// ---------------------------------------------------------------------------

/// In-memory timeline feed that records every delivered line.
#[derive(Debug, Default)]
pub struct MemoryTimeline {
    lines: Mutex<Vec<String>>,
    batches: AtomicU32,
    failing: AtomicU32,
}

impl MemoryTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Number of successful feed appends.
    pub fn batch_count(&self) -> u32 {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, n: u32) {
        self.failing.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl TimelineFeed for MemoryTimeline {
    async fn append_lines(&self, lines: &[String]) -> Result<()> {
        if take_failure(&self.failing) {
            return Err(ChecksError::Http("injected feed failure".to_string()));
        }
        self.lines.lock().unwrap().extend_from_slice(lines);
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl TimelineSink for MemoryTimeline {
    fn append(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}
