//! # Volley Scheduler
//!
//! Implementations of the [`HostScheduler`] contract from
//! `volley-interfaces`.
//!
//! ## Overview
//!
//! - [`DepGraphScheduler`]: a worker-thread pool that executes tasks while
//!   honoring declared per-variable read/write dependencies. Variables stay
//!   held until a task's completion token fires, so stages that defer to
//!   asynchronous service callbacks keep their successors blocked.
//! - [`InlineScheduler`]: a deterministic scheduler for tests that runs
//!   every task on the submitting thread in submission order.
//!
//! [`HostScheduler`]: volley_interfaces::HostScheduler

pub mod depgraph;
pub mod inline;
pub mod metrics;

// Re-exports
pub use depgraph::DepGraphScheduler;
pub use inline::{InlineScheduler, TaskRecord};
pub use metrics::SchedulerMetrics;
