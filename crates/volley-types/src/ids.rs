//! Identifier types for Volley entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique name of a synchronized tensor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TensorName(pub String);

impl TensorName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TensorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TensorName {
    fn from(name: String) -> Self {
        TensorName(name)
    }
}

impl From<&str> for TensorName {
    fn from(name: &str) -> Self {
        TensorName(name.to_string())
    }
}

/// Opaque dependency variable used by the host scheduler to order tasks
/// touching the same tensor. Every tensor handle owns exactly one `VarId`
/// for its whole lifetime; tasks declare the vars they read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub u64);

static NEXT_VAR: AtomicU64 = AtomicU64::new(0);

impl VarId {
    /// Allocate a fresh process-unique variable
    pub fn next() -> Self {
        VarId(NEXT_VAR.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var:{}", self.0)
    }
}
