//! Completion bridge
//!
//! The single place where internal stage outcomes cross into the
//! caller-visible error model. Stages funnel every status through
//! [`invoke`]; the caller awaits a [`SyncTicket`], which raises the first
//! recorded error at the await point with its reason string unmodified.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tracing::debug;
use volley_interfaces::{Completion, DoneCallback, TensorRef};
use volley_types::{Result, SyncError};

/// Deliver a stage outcome to its completion callback. `Ok` invokes the
/// callback as a plain success; an error invokes it with the error payload
/// so the orchestration boundary can raise it. No stage may bypass this.
pub fn invoke(on_complete: DoneCallback, status: Result<()>) {
    if let Err(err) = &status {
        debug!("stage completed with error: {}", err);
    }
    on_complete(status);
}

/// Fan a stage outcome out to the ticket observer and the scheduler's
/// completion token, so the caller learns the status and the task's
/// dependency variables get released.
pub(crate) fn fanout(observer: DoneCallback, done: Completion) -> DoneCallback {
    Box::new(move |status: Result<()>| {
        let for_scheduler = status.clone();
        observer(status);
        done.complete(for_scheduler);
    })
}

#[derive(Default)]
struct TicketState {
    /// Stages observed but not yet completed
    pending: usize,
    /// First error reported by any stage
    error: Option<SyncError>,
    averaged: bool,
}

struct TicketShared {
    state: Mutex<TicketState>,
    done: Condvar,
}

/// Caller-side handle over one synchronization request.
///
/// Observes every stage submitted for the request. [`wait`](Self::wait)
/// blocks until all of them completed, then raises the first recorded
/// error, or, on full success, divides the tensor by the worker count to
/// turn the aggregated sum into an average. The division is skipped on any
/// failure, leaving the tensor's contents untouched.
pub struct SyncTicket {
    shared: Arc<TicketShared>,
    handle: TensorRef,
    worker_count: usize,
}

impl SyncTicket {
    pub(crate) fn new(handle: TensorRef, worker_count: usize) -> Self {
        Self {
            shared: Arc::new(TicketShared {
                state: Mutex::new(TicketState::default()),
                done: Condvar::new(),
            }),
            handle,
            worker_count,
        }
    }

    /// Mint a callback observing one stage. Must be called before the
    /// stage is submitted.
    pub(crate) fn observer(&self) -> DoneCallback {
        self.shared.state.lock().pending += 1;
        let shared = Arc::clone(&self.shared);
        Box::new(move |status: Result<()>| {
            let mut state = shared.state.lock();
            if let Err(err) = status {
                if state.error.is_none() {
                    state.error = Some(err);
                }
            }
            state.pending -= 1;
            if state.pending == 0 {
                shared.done.notify_all();
            }
        })
    }

    /// Block until every stage completed. Returns the first stage error,
    /// or performs the worker-count average and returns `Ok`.
    pub fn wait(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        while state.pending > 0 {
            self.shared.done.wait(&mut state);
        }
        if let Some(err) = &state.error {
            return Err(err.clone());
        }
        if state.averaged {
            return Ok(());
        }
        state.averaged = true;
        drop(state);
        self.handle.div_scalar(self.worker_count as f64)
    }
}
