//! Configuration types for the Volley runtime

use serde::{Deserialize, Serialize};

/// Runtime configuration for one training job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of participating workers; aggregated sums are divided by this
    /// to produce the average. Comes from the external membership service.
    pub worker_count: usize,
    /// Naming prefix scoping all tensor names to this job
    pub scope: String,
}

impl SyncConfig {
    /// Create a config for the given worker count with the default scope
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }

    /// Set the naming scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            scope: "volley".to_string(),
        }
    }
}
