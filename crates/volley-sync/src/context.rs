//! Per-tensor synchronization context

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use volley_types::{TensorDescriptor, TensorName};

/// Initialization state of a context. The transition
/// `Uninitialized → Initializing → Ready` is monotonic and happens at most
/// once; a failed registration reverts to `Uninitialized` so a later
/// attempt may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Synchronization state for one distinct tensor name.
///
/// Exactly one context exists per name for the lifetime of the process
/// (enforced by the [`ContextRegistry`](crate::ContextRegistry)). The
/// staging buffer is present iff the tensor lives off-host; it is owned
/// exclusively by this context and, by the scheduler's ordering guarantee,
/// never touched by two stages of the same tensor at once.
#[derive(Debug)]
pub struct TensorSyncContext {
    name: TensorName,
    descriptor: TensorDescriptor,
    state: Mutex<ContextState>,
    staging: Mutex<Option<Vec<u8>>>,
}

/// Shared reference to a context; the context outlives any in-flight
/// request referencing it
pub type ContextRef = Arc<TensorSyncContext>;

impl TensorSyncContext {
    pub(crate) fn new(name: TensorName, descriptor: TensorDescriptor) -> Self {
        Self {
            name,
            descriptor,
            state: Mutex::new(ContextState::Uninitialized),
            staging: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &TensorName {
        &self.name
    }

    /// Size/device/dtype recorded at creation; the compatibility key for
    /// name reuse
    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ContextState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ContextState::Ready
    }

    /// Whether the descriptor matches what this context was created with
    pub fn matches(&self, descriptor: &TensorDescriptor) -> bool {
        self.descriptor == *descriptor
    }

    pub fn has_staging(&self) -> bool {
        self.staging.lock().is_some()
    }

    pub(crate) fn begin_initializing(&self) {
        let mut state = self.state.lock();
        if *state == ContextState::Uninitialized {
            *state = ContextState::Initializing;
        }
    }

    pub(crate) fn mark_ready(&self) {
        *self.state.lock() = ContextState::Ready;
    }

    /// Revert a failed initialization so a later attempt may retry
    pub(crate) fn revert_uninitialized(&self) {
        let mut state = self.state.lock();
        if *state != ContextState::Ready {
            *state = ContextState::Uninitialized;
        }
    }

    /// Allocate the host staging buffer if it does not exist yet
    pub(crate) fn ensure_staging(&self, size_bytes: usize) {
        let mut staging = self.staging.lock();
        if staging.is_none() {
            *staging = Some(vec![0u8; size_bytes]);
        }
    }

    pub(crate) fn staging(&self) -> MutexGuard<'_, Option<Vec<u8>>> {
        self.staging.lock()
    }
}
