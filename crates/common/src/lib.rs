//! Common utilities and types for Stoic
//!
//! This crate provides shared functionality used across the Stoic workspace,
//! including error types, the container data model, the script runner
//! capability and utility functions.

pub mod error;
pub mod models;
pub mod process;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use error::{Error, Result};
pub use models::*;
pub use process::{OutputMode, ProcessRunner, ScriptInvocation, ScriptOutput, ScriptRunner};
