//! Deterministic scheduler for tests
//!
//! Runs every task on the submitting thread, in submission order. Callers
//! are expected to submit in dependency order, which the pipeline does; the
//! completion token is real, so deferred completions still land in the
//! record once they fire.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use volley_interfaces::{Completion, HostScheduler, Task};
use volley_types::Result;

/// Outcome of one task, in completion order
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub label: String,
    pub status: Result<()>,
}

/// Single-threaded, submission-order scheduler
#[derive(Default)]
pub struct InlineScheduler {
    records: Arc<Mutex<Vec<TaskRecord>>>,
}

impl InlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion records observed so far, in the order completions fired
    pub fn records(&self) -> Vec<TaskRecord> {
        self.records.lock().clone()
    }

    /// Number of completions that fired with `Ok`
    pub fn completed(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.status.is_ok())
            .count()
    }
}

impl HostScheduler for InlineScheduler {
    fn submit(&self, task: Task) -> Result<()> {
        debug!("running task {} inline", task.label);
        let records = Arc::clone(&self.records);
        let label = task.label.clone();
        let done = Completion::new(move |status| {
            records.lock().push(TaskRecord { label, status });
        });
        (task.work)(done);
        Ok(())
    }
}
