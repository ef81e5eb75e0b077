//! Host scheduler contract
//!
//! The pipeline submits unit-of-work closures with declared read/write
//! dependencies on tensor variables; the host scheduler executes them on
//! its own threads while honoring those dependencies. This declaration is
//! the sole ordering mechanism between the init, push, and pull stages of
//! one tensor.

use std::fmt;
use volley_types::{Result, SyncError, VarId};

/// Single-use done-token handed to every scheduled task.
///
/// A task's dependency variables stay held until its completion fires, not
/// until its closure returns, so a stage that defers to a service callback
/// keeps later tasks on the same tensor blocked until the callback runs.
/// `complete` consumes the token, so a stage cannot signal twice. A token
/// dropped without being completed (a panicking task unwinds through it)
/// fires with an invariant-violation status, so the task's variables are
/// still released.
pub struct Completion {
    hook: Option<Box<dyn FnOnce(Result<()>) + Send>>,
}

impl Completion {
    /// Create a token that invokes `hook` exactly once when completed
    pub fn new(hook: impl FnOnce(Result<()>) + Send + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
        }
    }

    /// Signal that the task finished with the given status. May be called
    /// from any thread.
    pub fn complete(mut self, status: Result<()>) {
        if let Some(hook) = self.hook.take() {
            hook(status);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook(Err(SyncError::invariant(
                "completion token dropped without signaling",
            )));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Unit-of-work closure carrying one stage call
pub type TaskFn = Box<dyn FnOnce(Completion) + Send>;

/// A schedulable unit of work with declared dependencies
pub struct Task {
    /// Diagnostic label, surfaced in logs
    pub label: String,
    /// Scheduling hint; higher runs earlier among runnable tasks
    pub priority: i32,
    /// Variables this task reads. A reader waits for all earlier writers.
    pub reads: Vec<VarId>,
    /// Variables this task writes. A writer waits for all earlier readers
    /// and writers.
    pub writes: Vec<VarId>,
    /// The work itself; receives the completion token
    pub work: TaskFn,
}

impl Task {
    /// Create a task with no declared dependencies and default priority
    pub fn new(label: impl Into<String>, work: impl FnOnce(Completion) + Send + 'static) -> Self {
        Self {
            label: label.into(),
            priority: 0,
            reads: Vec::new(),
            writes: Vec::new(),
            work: Box::new(work),
        }
    }

    /// Declare read dependencies
    pub fn with_reads(mut self, reads: Vec<VarId>) -> Self {
        self.reads = reads;
        self
    }

    /// Declare write dependencies
    pub fn with_writes(mut self, writes: Vec<VarId>) -> Self {
        self.writes = writes;
        self
    }

    /// Set the scheduling priority hint
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("label", &self.label)
            .field("priority", &self.priority)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

/// The external scheduler the pipeline rides on.
///
/// Guarantees ordered, mutually-exclusive execution per variable: among
/// tasks touching the same variable, readers wait for earlier writers and
/// writers wait for everything earlier. Tasks on disjoint variables may run
/// in any order and in parallel. Callbacks and closures may run on any
/// thread the scheduler chooses.
pub trait HostScheduler: Send + Sync {
    /// Submit a task. Returns an error only if the scheduler refuses the
    /// work outright (e.g. it is shutting down); in that case the task's
    /// closure never runs.
    fn submit(&self, task: Task) -> Result<()>;
}
