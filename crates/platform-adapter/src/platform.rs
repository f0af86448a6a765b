//! Collaborator traits for remote and daemon operations

use std::path::Path;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use common::models::TrainingJobRequest;

/// Cloud ML platform: hosted models, endpoints, the image registry,
/// object storage and training jobs
#[async_trait]
pub trait MlPlatform: Send + Sync {
    /// Lists hosted models as returned by the platform
    async fn list_models(&self) -> Result<Value>;

    /// Lists inference endpoints as returned by the platform
    async fn list_endpoints(&self) -> Result<Value>;

    /// Lists the image identifiers in a registry repository
    async fn list_repository_images(&self, repository: &str) -> Result<Value>;

    /// Uploads a local directory under `s3://<bucket>/<prefix>` and returns that URI
    async fn upload_directory(&self, directory: &Path, bucket: &str, prefix: &str) -> Result<String>;

    /// Submits a training job and returns its ARN
    async fn create_training_job(&self, request: &TrainingJobRequest) -> Result<String>;
}

/// Local container daemon
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Lists local images as `repository:tag`
    async fn list_images(&self) -> Result<Vec<String>>;

    /// Builds an image from `context_dir`, tagged `tag`
    async fn build_image(&self, context_dir: &Path, tag: &str) -> Result<()>;
}
