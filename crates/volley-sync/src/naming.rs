//! Tensor naming utility
//!
//! Named tensors get `"{scope}.{user}"`; anonymous ones draw a suffix from
//! a monotonically increasing counter shared across all anonymous requests,
//! so concurrent anonymous calls still get distinct names. The counter has
//! process lifetime and is never reset.

use std::sync::atomic::{AtomicU64, Ordering};
use volley_types::TensorName;

/// Per-runtime name generator (injectable rather than ambient global)
#[derive(Debug)]
pub struct NameGenerator {
    scope: String,
    anon_counter: AtomicU64,
}

impl NameGenerator {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            anon_counter: AtomicU64::new(0),
        }
    }

    /// Resolve the full tensor name for a request
    pub fn name_for(&self, user_name: Option<&str>) -> TensorName {
        match user_name {
            Some(user) => TensorName::new(format!("{}.{}", self.scope, user)),
            None => {
                let n = self.anon_counter.fetch_add(1, Ordering::Relaxed);
                TensorName::new(format!("{}.noname.{}", self.scope, n))
            }
        }
    }
}
