//! Error types for the Volley synchronization pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Volley operations
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum SyncError {
    /// The synchronization runtime was used before global setup. Fatal to
    /// the calling operation; not retryable without external setup.
    #[error("Synchronization runtime not initialized")]
    NotInitialized,

    /// A tensor name was reused with a different size/device/dtype. This is
    /// a caller error and must fail loudly; the existing context is never
    /// silently reinitialized.
    #[error("Tensor name conflict: {message}")]
    NameConflict { message: String },

    /// The aggregation service rejected a registration, push, or pull. The
    /// reason is propagated verbatim; the caller may retry at a higher
    /// layer.
    #[error("Aggregation service error: {message}")]
    Service { message: String },

    /// A stage-ordering invariant was broken upstream (e.g. an off-host
    /// push with no staging buffer). Unrecoverable within the operation.
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    /// Work was submitted to a scheduler that is shutting down.
    #[error("Scheduler shut down: {message}")]
    Shutdown { message: String },
}

impl SyncError {
    /// Create a name conflict error
    pub fn name_conflict(message: impl Into<String>) -> Self {
        SyncError::NameConflict {
            message: message.into(),
        }
    }

    /// Create an aggregation service error
    pub fn service(message: impl Into<String>) -> Self {
        SyncError::Service {
            message: message.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        SyncError::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a scheduler shutdown error
    pub fn shutdown(message: impl Into<String>) -> Self {
        SyncError::Shutdown {
            message: message.into(),
        }
    }

    /// Whether the failure indicates a bug in stage ordering rather than a
    /// normal runtime condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::InvariantViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::service("push rejected");
        assert_eq!(err.to_string(), "Aggregation service error: push rejected");
        assert_eq!(
            SyncError::NotInitialized.to_string(),
            "Synchronization runtime not initialized"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SyncError::invariant("staging buffer missing").is_fatal());
        assert!(!SyncError::service("unreachable").is_fatal());
        assert!(!SyncError::NotInitialized.is_fatal());
    }

    #[test]
    fn test_error_is_cloneable() {
        let err = SyncError::name_conflict("grad reused with different dtype");
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
