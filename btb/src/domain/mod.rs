//! Domain model for btb
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Half-open ranges for addresses and lifetimes
//! - Structured error handling

pub mod errors;
pub mod range;
pub mod types;

// Re-export common types for convenience
pub use range::Range;
pub use types::{CpuId, TaskId, Timestamp};

pub use errors::{DecodeError, RenderError, ResolveError, ResourceError};
