//! Aggregation service contract
//!
//! The external component (e.g. a parameter server) that combines tensor
//! values across workers. The wire protocol and reduction algorithm live
//! behind this trait; the pipeline only sees asynchronous acknowledgements.

use volley_types::{Result, TensorDescriptor, TensorName};

/// Completion callback for register and push operations
pub type DoneCallback = Box<dyn FnOnce(Result<()>) + Send>;

/// Completion callback for pull operations, carrying the aggregated bytes
pub type PullCallback = Box<dyn FnOnce(Result<Vec<u8>>) + Send>;

/// Asynchronous interface to the aggregation service.
///
/// Every operation returns immediately; the outcome arrives through the
/// callback, which may run on any thread. Callbacks fire exactly once.
pub trait AggregationService: Send + Sync {
    /// Register a tensor with the service before its first exchange. `done`
    /// fires once the service has accepted (or rejected) the registration.
    fn register(&self, name: &TensorName, descriptor: &TensorDescriptor, done: DoneCallback);

    /// Send this worker's current value for the tensor. `done` fires when
    /// the service acknowledges receipt, not when aggregation across all
    /// workers completes.
    fn push(&self, name: &TensorName, data: Vec<u8>, version: u64, priority: i32, done: DoneCallback);

    /// Request the aggregated result. `done` fires with the aggregated
    /// bytes once they are available.
    fn pull(&self, name: &TensorName, version: u64, priority: i32, done: PullCallback);
}
