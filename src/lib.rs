//! Stoic
//!
//! Command line tool to build, train, and deploy ML model containers. This
//! crate wires the workspace together: it loads the configuration and runs
//! one CLI verb through the dispatcher. The binary installs logging once the
//! configuration is known.

use std::path::Path;
use std::sync::Arc;
use anyhow::Result;
use tracing::info;

use cli_interface::{Collaborators, CommandDispatcher, CommandOutcome, Commands, TerminalPrompt};
use common::process::{ProcessRunner, ScriptRunner};
use platform_adapter::{AwsCli, DockerCli};
use stoic_config::AppConfig;

pub use cli_interface::Cli;

/// Exit code for a command that failed
pub const EXIT_FAILURE: u8 = 2;

/// Exit code for an unusable configuration
pub const EXIT_CONFIG: u8 = 78;

/// The application with its real collaborators
pub struct Stoic {
    dispatcher: CommandDispatcher,
}

impl Stoic {
    /// Creates the application from a loaded configuration
    ///
    /// Scripts and the `aws`/`docker` tools share one process runner, and
    /// prompts go to the terminal.
    pub fn new(config: AppConfig) -> Self {
        let runner: Arc<dyn ScriptRunner> = Arc::new(ProcessRunner::new(config.script_timeout));

        let collaborators = Collaborators {
            prompt: Arc::new(TerminalPrompt::new()),
            runner: runner.clone(),
            platform: Arc::new(AwsCli::new(runner.clone())),
            images: Arc::new(DockerCli::new(runner)),
        };

        Self {
            dispatcher: CommandDispatcher::new(config, collaborators),
        }
    }

    /// Loads the configuration at `path` and creates the application
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = AppConfig::load(path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(Self::new(config))
    }

    /// Gets the configuration
    pub fn config(&self) -> &AppConfig {
        self.dispatcher.config()
    }

    /// Runs one verb
    pub async fn run(&self, command: &Commands) -> Result<CommandOutcome> {
        self.dispatcher.dispatch(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "roles:\n  - role: arn:aws:iam::1:role/SageMaker\ndescriptions:\n  - bucket: training-data\nscript_timeout_secs: 600\n",
        )
        .unwrap();

        let app = Stoic::from_config_file(&path).unwrap();

        assert_eq!(app.config().bucket, "training-data");
        assert!(app.config().models_dir.is_absolute());
        assert!(app.config().database_path.is_absolute());
    }

    #[test]
    fn test_missing_config_file() {
        let dir = TempDir::new().unwrap();
        assert!(Stoic::from_config_file(&dir.path().join("missing.yaml")).is_err());
    }
}
