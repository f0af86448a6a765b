//! AWS command line adapter
//!
//! SageMaker, ECR and S3 calls go through the `aws` CLI with JSON output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use common::error::Error;
use common::models::TrainingJobRequest;
use common::process::{OutputMode, ScriptInvocation, ScriptRunner};

use crate::platform::MlPlatform;

/// [`MlPlatform`] backed by the `aws` command line tool
pub struct AwsCli {
    /// Runner for the CLI processes
    runner: Arc<dyn ScriptRunner>,
    /// CLI executable
    program: PathBuf,
}

impl AwsCli {
    /// Creates an adapter that runs `aws` from `PATH`
    pub fn new(runner: Arc<dyn ScriptRunner>) -> Self {
        Self::with_program(runner, "aws")
    }

    /// Creates an adapter with an explicit CLI executable
    pub fn with_program(runner: Arc<dyn ScriptRunner>, program: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    async fn call_json(&self, args: Vec<String>) -> Result<Value> {
        let invocation = ScriptInvocation::new(&self.program)
            .args(args)
            .arg("--output")
            .arg("json")
            .output(OutputMode::Capture);

        let output = self.runner.run(&invocation).await?.check(&invocation)?;

        if output.stdout.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str::<Value>(&output.stdout)
            .map_err(Error::from)
            .with_context(|| format!("parsing output of {}", invocation.display_name()))
    }
}

/// Builds the `create-training-job` argument list
pub fn training_job_args(request: &TrainingJobRequest) -> Vec<String> {
    let algorithm = json!({
        "TrainingImage": request.image_uri,
        "TrainingInputMode": "File",
    });
    let input = json!([{
        "ChannelName": "training",
        "DataSource": {
            "S3DataSource": {
                "S3DataType": "S3Prefix",
                "S3Uri": request.input_data_uri,
                "S3DataDistributionType": "FullyReplicated",
            }
        },
    }]);
    let output = json!({ "S3OutputPath": request.output_uri });
    let resources = json!({
        "InstanceType": request.instance_type,
        "InstanceCount": request.instance_count,
        "VolumeSizeInGB": request.volume_size_gb,
    });
    let stopping = json!({ "MaxRuntimeInSeconds": request.max_runtime_secs });

    vec![
        "sagemaker".to_string(),
        "create-training-job".to_string(),
        "--training-job-name".to_string(),
        request.job_name.clone(),
        "--role-arn".to_string(),
        request.role_arn.clone(),
        "--algorithm-specification".to_string(),
        algorithm.to_string(),
        "--input-data-config".to_string(),
        input.to_string(),
        "--output-data-config".to_string(),
        output.to_string(),
        "--resource-config".to_string(),
        resources.to_string(),
        "--stopping-condition".to_string(),
        stopping.to_string(),
    ]
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

#[async_trait]
impl MlPlatform for AwsCli {
    async fn list_models(&self) -> Result<Value> {
        self.call_json(strings(&["sagemaker", "list-models"])).await
    }

    async fn list_endpoints(&self) -> Result<Value> {
        self.call_json(strings(&["sagemaker", "list-endpoints"])).await
    }

    async fn list_repository_images(&self, repository: &str) -> Result<Value> {
        let response = self
            .call_json(strings(&["ecr", "list-images", "--repository-name", repository]))
            .await?;

        Ok(response.get("imageIds").cloned().unwrap_or_else(|| json!([])))
    }

    async fn upload_directory(&self, directory: &Path, bucket: &str, prefix: &str) -> Result<String> {
        if !directory.is_dir() {
            return Err(Error::NotFound(format!("work directory {}", directory.display())).into());
        }

        let destination = format!("s3://{}/{}", bucket, prefix.trim_matches('/'));
        info!("Uploading {} to {}", directory.display(), destination);

        let invocation = ScriptInvocation::new(&self.program)
            .arg("s3")
            .arg("cp")
            .arg(directory.display().to_string())
            .arg(destination.clone())
            .arg("--recursive");

        self.runner.run(&invocation).await?.check(&invocation)?;

        Ok(destination)
    }

    async fn create_training_job(&self, request: &TrainingJobRequest) -> Result<String> {
        debug!("Submitting training job {:?}", request);

        let response = self.call_json(training_job_args(request)).await?;
        let arn = response
            .get("TrainingJobArn")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ExternalTool("create-training-job returned no TrainingJobArn".to_string()))?;

        info!("Training job {} submitted", request.job_name);

        Ok(arn.to_string())
    }
}
