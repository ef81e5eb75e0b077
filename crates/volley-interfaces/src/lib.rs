//! # Volley Interfaces
//!
//! Trait seams between the synchronization pipeline and its external
//! collaborators: the tensor handle adapter, the host task scheduler, and
//! the aggregation service.
//!
//! The pipeline owns no threads of its own. All asynchrony is expressed as
//! unit-of-work closures handed to a [`HostScheduler`] and as completion
//! callbacks that may fire on arbitrary threads.

pub mod aggregator;
pub mod scheduler;
pub mod tensor;

// Re-exports
pub use aggregator::{AggregationService, DoneCallback, PullCallback};
pub use scheduler::{Completion, HostScheduler, Task, TaskFn};
pub use tensor::{TensorHandle, TensorRef};
