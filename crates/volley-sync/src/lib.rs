//! # Volley Sync
//!
//! The asynchronous tensor-synchronization pipeline: per-tensor push/pull
//! gradient exchange against an aggregation service, scheduled through an
//! injected host scheduler that honors per-tensor read/write dependencies.
//!
//! ## Overview
//!
//! A call to [`SyncRuntime::synchronize`] resolves the tensor's name,
//! lazily submits a one-time initialization task, then submits a push task
//! (declared as reading the tensor) followed by a pull task (declared as
//! writing it). The host scheduler's dependency graph is the sole ordering
//! mechanism between the stages. The caller awaits the returned
//! [`SyncTicket`]; after a fully successful exchange the tensor is divided
//! by the worker count to turn the aggregated sum into an average.

pub mod bridge;
pub mod context;
pub mod local;
pub mod naming;
pub mod registry;
pub mod runtime;
pub mod stages;

// Re-exports
pub use bridge::SyncTicket;
pub use context::{ContextRef, ContextState, TensorSyncContext};
pub use local::LoopbackAggregator;
pub use naming::NameGenerator;
pub use registry::ContextRegistry;
pub use runtime::{SyncMetrics, SyncRuntime};
