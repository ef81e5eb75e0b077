//! Scheduler metrics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of scheduler activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    /// Tasks accepted by `submit`
    pub submitted: u64,
    /// Tasks whose completion fired with `Ok`
    pub completed: u64,
    /// Tasks whose completion fired with an error
    pub failed: u64,
    /// Tasks refused because the scheduler was shutting down
    pub rejected: u64,
    /// Tasks currently queued or running
    pub pending: usize,
}

/// Internal atomic counters backing [`SchedulerMetrics`]
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) rejected: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self, pending: usize) -> SchedulerMetrics {
        SchedulerMetrics {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            pending,
        }
    }
}
