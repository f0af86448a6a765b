//! Persistent storage for Stoic
//!
//! This crate owns the model build registry: the durable record of which
//! container was pushed to which remote repository.

pub mod registry;

// Re-export commonly used types
pub use registry::RegistryStore;
