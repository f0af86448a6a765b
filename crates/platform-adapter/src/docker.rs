//! Docker command line adapter

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use common::process::{OutputMode, ScriptInvocation, ScriptRunner};

use crate::platform::ImageStore;

/// Substring that marks an image as belonging to the remote registry
pub const REMOTE_REGISTRY_MARKER: &str = "amazonaws";

/// Returns true if a local image was tagged for the remote registry
pub fn is_remote_image(image: &str) -> bool {
    image.contains(REMOTE_REGISTRY_MARKER)
}

/// [`ImageStore`] backed by the `docker` command line tool
pub struct DockerCli {
    /// Runner for the CLI processes
    runner: Arc<dyn ScriptRunner>,
    /// CLI executable
    program: PathBuf,
}

impl DockerCli {
    /// Creates an adapter that runs `docker` from `PATH`
    pub fn new(runner: Arc<dyn ScriptRunner>) -> Self {
        Self {
            runner,
            program: PathBuf::from("docker"),
        }
    }
}

#[async_trait]
impl ImageStore for DockerCli {
    async fn list_images(&self) -> Result<Vec<String>> {
        let invocation = ScriptInvocation::new(&self.program)
            .arg("images")
            .arg("--format")
            .arg("{{.Repository}}:{{.Tag}}")
            .output(OutputMode::Capture);

        let output = self.runner.run(&invocation).await?.check(&invocation)?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("<none>"))
            .map(str::to_string)
            .collect())
    }

    async fn build_image(&self, context_dir: &Path, tag: &str) -> Result<()> {
        info!("Building image {} from {}", tag, context_dir.display());

        let invocation = ScriptInvocation::new(&self.program)
            .arg("build")
            .arg("-t")
            .arg(tag)
            .arg(".")
            .current_dir(context_dir);

        self.runner.run(&invocation).await?.check(&invocation)?;

        Ok(())
    }
}
