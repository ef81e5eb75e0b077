//! Core type definitions for the Volley tensor-synchronization pipeline
//!
//! This crate contains the fundamental types, ids, configuration, and error
//! definitions shared across the Volley workspace. It is designed to be
//! lightweight and dependency-free to avoid circular dependencies.

pub mod config;
pub mod devices;
pub mod errors;
pub mod ids;

// Re-export commonly used types
pub use config::*;
pub use devices::*;
pub use errors::*;
pub use ids::*;

/// Result type used throughout Volley
pub type Result<T> = std::result::Result<T, SyncError>;
