//! Common data models for Stoic
//!
//! This module defines the registry record, the derived container directory
//! view and the training job request shared across the workspace.

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reserved sibling of the model directories that holds local test scripts
pub const LOCAL_TEST_DIR: &str = "local_test";

/// Script that builds the container image and pushes it to the remote repository
pub const BUILD_AND_PUSH_SCRIPT: &str = "build_and_push.sh";

/// Training entrypoint inside a model directory
pub const TRAIN_SCRIPT: &str = "train";

/// Serving entrypoint inside a model directory
pub const SERVE_SCRIPT: &str = "serve";

/// Local training script inside `local_test`
pub const TRAIN_LOCAL_SCRIPT: &str = "train_local.sh";

/// Local serving script inside `local_test`
pub const SERVE_LOCAL_SCRIPT: &str = "serve_local.sh";

/// Local prediction script inside `local_test`
pub const PREDICT_SCRIPT: &str = "predict.sh";

/// File that receives the output of the local server
pub const SERVE_LOG_FILE: &str = "outlog.log";

/// Instance types offered for remote training
pub const TRAINING_INSTANCE_TYPES: [&str; 8] = [
    "ml.m4.xlarge",
    "ml.m4.2xlarge",
    "ml.m4.4xlarge",
    "ml.m4.10xlarge",
    "ml.m4.16xlarge",
    "ml.p2.xlarge",
    "ml.p2.8xlarge",
    "ml.p2.16xlarge",
];

/// A pushed container image and the remote repository it went to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelBuildRecord {
    /// Container directory name under the models root
    pub container_name: String,
    /// Remote repository the image was pushed to
    pub repository: String,
}

impl ModelBuildRecord {
    /// Creates a new record, rejecting empty identifiers
    pub fn new(container_name: impl Into<String>, repository: impl Into<String>) -> Result<Self> {
        let container_name = container_name.into();
        let repository = repository.into();
        validate_identifier("container name", &container_name)?;
        validate_identifier("repository", &repository)?;
        Ok(Self { container_name, repository })
    }
}

impl fmt::Display for ModelBuildRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container_name, self.repository)
    }
}

/// An installed container and the models it holds, as found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDirectory {
    /// Directory name under the models root
    pub name: String,
    /// Model subdirectories, `local_test` excluded
    pub models: Vec<String>,
}

/// Number of instances for a remote training job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceCount {
    One,
    Two,
    Three,
}

impl InstanceCount {
    /// All choices in prompt order
    pub const ALL: [InstanceCount; 3] = [InstanceCount::One, InstanceCount::Two, InstanceCount::Three];

    /// Returns the numeric count
    pub fn get(&self) -> u32 {
        match self {
            InstanceCount::One => 1,
            InstanceCount::Two => 2,
            InstanceCount::Three => 3,
        }
    }
}

impl fmt::Display for InstanceCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceCount::One => write!(f, "One"),
            InstanceCount::Two => write!(f, "Two"),
            InstanceCount::Three => write!(f, "Three"),
        }
    }
}

/// Everything the ML platform needs to start a training job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJobRequest {
    /// Unique job name
    pub job_name: String,
    /// Training image URI in the remote registry
    pub image_uri: String,
    /// Execution role ARN
    pub role_arn: String,
    /// Instance type, one of [`TRAINING_INSTANCE_TYPES`]
    pub instance_type: String,
    /// Number of instances
    pub instance_count: u32,
    /// Object storage URI of the training data
    pub input_data_uri: String,
    /// Object storage URI for model artifacts
    pub output_uri: String,
    /// Attached volume size in GB
    pub volume_size_gb: u32,
    /// Hard stop for the job
    pub max_runtime_secs: u64,
}

/// Checks that an identifier is usable as a registry key or directory name
pub fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{} must not be empty", kind)));
    }

    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        return Err(Error::InvalidArgument(format!(
            "{} must be a single path component: {}",
            kind, value
        )));
    }

    Ok(())
}
