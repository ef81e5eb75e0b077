//! Dependency-graph scheduler
//!
//! Executes submitted tasks on a worker-thread pool while honoring declared
//! per-variable dependencies: a reader waits for all earlier writers of a
//! variable, and a writer waits for all earlier readers and writers. A
//! task's variables are released when its [`Completion`] fires, which may
//! happen on a service thread long after the task closure returned.

use crate::metrics::{Counters, SchedulerMetrics};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};
use volley_interfaces::{Completion, HostScheduler, Task, TaskFn};
use volley_types::{Result, SyncError, VarId};

/// A submitted task that has not yet completed. `work` is `None` once the
/// task has been started; the entry stays in the pending list (holding its
/// variables) until the completion token fires.
struct PendingTask {
    seq: u64,
    priority: i32,
    label: String,
    reads: Vec<VarId>,
    writes: Vec<VarId>,
    work: Option<TaskFn>,
}

#[derive(Default)]
struct SchedState {
    /// Uncompleted tasks in submission order
    pending: Vec<PendingTask>,
    shutting_down: bool,
    next_seq: u64,
}

struct Inner {
    state: Mutex<SchedState>,
    /// Signaled when a task becomes runnable or the scheduler shuts down
    work_ready: Condvar,
    /// Signaled when the pending list drains
    idle: Condvar,
    counters: Counters,
}

impl Inner {
    /// Index of the best runnable task: not yet started, no conflicting
    /// earlier uncompleted task, highest priority winning ties by
    /// submission order.
    fn pick_runnable(state: &SchedState) -> Option<usize> {
        let mut best: Option<usize> = None;
        'candidates: for i in 0..state.pending.len() {
            let task = &state.pending[i];
            if task.work.is_none() {
                continue;
            }
            for earlier in &state.pending[..i] {
                if task.reads.iter().any(|r| earlier.writes.contains(r)) {
                    continue 'candidates;
                }
                if task
                    .writes
                    .iter()
                    .any(|w| earlier.writes.contains(w) || earlier.reads.contains(w))
                {
                    continue 'candidates;
                }
            }
            match best {
                Some(b) if state.pending[b].priority >= task.priority => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// Release a task's variables and record its outcome
    fn finish(&self, seq: u64, status: Result<()>) {
        let label = {
            let mut state = self.state.lock();
            let Some(pos) = state.pending.iter().position(|t| t.seq == seq) else {
                return;
            };
            let label = state.pending.remove(pos).label;
            if state.pending.is_empty() {
                self.idle.notify_all();
            }
            label
        };
        match status {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                debug!("task {} completed", label);
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("task {} failed: {}", label, err);
            }
        }
        self.work_ready.notify_all();
    }
}

fn worker_loop(inner: Arc<Inner>) {
    loop {
        let (seq, label, work) = {
            let mut state = inner.state.lock();
            loop {
                if let Some(idx) = Inner::pick_runnable(&state) {
                    let task = &mut state.pending[idx];
                    let work = task.work.take().expect("runnable task has work");
                    break (task.seq, task.label.clone(), work);
                }
                let drained = state.pending.iter().all(|t| t.work.is_none());
                if state.shutting_down && drained {
                    return;
                }
                inner.work_ready.wait(&mut state);
            }
        };
        debug!("starting task {}", label);
        let hook = Arc::clone(&inner);
        let done = Completion::new(move |status| hook.finish(seq, status));
        // A panic unwinds through the token, which records the task as
        // failed and releases its variables; the worker survives.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| work(done)));
        if outcome.is_err() {
            warn!("task {} panicked", label);
        }
    }
}

/// Worker-thread scheduler honoring per-variable read/write dependencies
pub struct DepGraphScheduler {
    inner: Arc<Inner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DepGraphScheduler {
    /// Create a scheduler with the given number of worker threads (at
    /// least one)
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        info!("starting dependency-graph scheduler with {} workers", threads);

        let inner = Arc::new(Inner {
            state: Mutex::new(SchedState::default()),
            work_ready: Condvar::new(),
            idle: Condvar::new(),
            counters: Counters::default(),
        });

        let workers = (0..threads)
            .map(|i| {
                let inner = Arc::clone(&inner);
                std::thread::Builder::new()
                    .name(format!("volley-sched-{}", i))
                    .spawn(move || worker_loop(inner))
                    .expect("failed to spawn scheduler worker")
            })
            .collect();

        Self {
            inner,
            workers: Mutex::new(workers),
        }
    }

    /// Block until every submitted task has completed
    pub fn wait_idle(&self) {
        let mut state = self.inner.state.lock();
        while !state.pending.is_empty() {
            self.inner.idle.wait(&mut state);
        }
    }

    /// Stop accepting work, drain queued tasks, and join the workers.
    /// Tasks submitted afterwards are rejected with [`SyncError::Shutdown`].
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;
        }
        info!("shutting down dependency-graph scheduler");
        self.inner.work_ready.notify_all();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.join();
        }
    }

    /// Snapshot of scheduler activity
    pub fn metrics(&self) -> SchedulerMetrics {
        let pending = self.inner.state.lock().pending.len();
        self.inner.counters.snapshot(pending)
    }
}

impl HostScheduler for DepGraphScheduler {
    fn submit(&self, task: Task) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.shutting_down {
            self.inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("rejecting task {} submitted after shutdown", task.label);
            return Err(SyncError::shutdown(format!(
                "task {} submitted after shutdown",
                task.label
            )));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        debug!(
            "queued task {} (seq {}, reads {:?}, writes {:?})",
            task.label, seq, task.reads, task.writes
        );
        state.pending.push(PendingTask {
            seq,
            priority: task.priority,
            label: task.label,
            reads: task.reads,
            writes: task.writes,
            work: Some(task.work),
        });
        drop(state);
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.inner.work_ready.notify_one();
        Ok(())
    }
}

impl Drop for DepGraphScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
