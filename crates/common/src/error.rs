//! Error types for the common crate
//!
//! This module defines the common error types used throughout Stoic.

use thiserror::Error;

/// Result type for Stoic operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Stoic operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The registry store could not be opened
    #[error("Registry store unavailable: {0}")]
    StorageUnavailable(String),

    /// A registry statement failed after the store was opened
    #[error("Storage error: {0}")]
    Storage(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Already exists error
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// External tool (script, CLI, daemon) failure
    #[error("External tool failed: {0}")]
    ExternalTool(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns true if the error is an already exists error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }

    /// Returns true if the registry store could not be opened
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_))
    }

    /// Returns true if the error is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Returns true if an external tool failed
    pub fn is_external_tool(&self) -> bool {
        matches!(self, Error::ExternalTool(_))
    }

    /// Returns true if the error is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Looks through an `anyhow` chain for a Stoic error of the kind `pred` accepts
pub fn has_kind(err: &anyhow::Error, pred: impl Fn(&Error) -> bool) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<Error>())
        .any(pred)
}
