//! External platform adapters for Stoic
//!
//! The cloud ML platform (training jobs, hosted models and endpoints, the
//! image registry, object storage) and the local container daemon are
//! reached through the traits in this crate. The shipped implementations
//! drive the `aws` and `docker` command line tools through a
//! [`common::ScriptRunner`].

pub mod aws;
pub mod docker;
pub mod platform;

// Re-export commonly used types
pub use aws::AwsCli;
pub use docker::DockerCli;
pub use platform::{ImageStore, MlPlatform};
