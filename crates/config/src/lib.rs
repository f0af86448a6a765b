//! Configuration management for Stoic
//!
//! The configuration is read once at startup from a YAML file, layered with
//! `STOIC_` environment overrides, and handed to every component that needs
//! it as an explicit [`AppConfig`] value.

use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::error::Error;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "configurations/config.yaml";

/// Default models root
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Default registry database
pub const DEFAULT_DATABASE_PATH: &str = "database/models.db";

/// Default container template archive
pub const DEFAULT_TEMPLATE_ARCHIVE: &str = "container_build/container_template.tar.gz";

/// Default prefix for environment overrides
pub const ENV_PREFIX: &str = "STOIC";

/// Remote training defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Attached volume per instance, in GB
    pub volume_size_gb: u32,
    /// Maximum job runtime, in seconds
    pub max_runtime_secs: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            volume_size_gb: 30,
            max_runtime_secs: 86_400,
        }
    }
}

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive used when neither `RUST_LOG` nor `-v` is given
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
            file: None,
        }
    }
}

/// Fully resolved application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Execution role for training jobs
    pub sagemaker_role: String,
    /// Object storage bucket for training data and artifacts
    pub bucket: String,
    /// Root of the installed containers
    pub models_dir: PathBuf,
    /// Registry database file
    pub database_path: PathBuf,
    /// Gzip tarball used to scaffold new containers
    pub template_archive: PathBuf,
    /// Upper bound for any single external script
    pub script_timeout: Option<Duration>,
    /// Remote training defaults
    pub training: TrainingSettings,
    /// Logging settings
    pub logging: LogSettings,
}

#[derive(Debug, Deserialize)]
struct RoleEntry {
    role: String,
}

#[derive(Debug, Deserialize)]
struct DescriptionEntry {
    bucket: String,
}

/// On-disk shape of the configuration file
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    roles: Vec<RoleEntry>,
    #[serde(default)]
    descriptions: Vec<DescriptionEntry>,
    sagemaker_role: Option<String>,
    bucket: Option<String>,
    models_dir: Option<PathBuf>,
    database_path: Option<PathBuf>,
    template_archive: Option<PathBuf>,
    script_timeout_secs: Option<u64>,
    #[serde(default)]
    training: TrainingSettings,
    #[serde(default)]
    logging: LogSettings,
}

impl AppConfig {
    /// Creates a configuration with default paths
    pub fn new(sagemaker_role: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            sagemaker_role: sagemaker_role.into(),
            bucket: bucket.into(),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            template_archive: PathBuf::from(DEFAULT_TEMPLATE_ARCHIVE),
            script_timeout: None,
            training: TrainingSettings::default(),
            logging: LogSettings::default(),
        }
    }

    /// Loads the configuration file and `STOIC_` environment overrides,
    /// resolving relative paths against the current directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let base = std::env::current_dir()?;
        ConfigLoader::new(path).load()?.resolved_against(&base)
    }

    /// Makes every relative path absolute with respect to `base`
    pub fn resolved_against(mut self, base: &Path) -> Result<Self> {
        let absolute = |path: PathBuf| if path.is_relative() { base.join(path) } else { path };

        self.models_dir = absolute(self.models_dir);
        self.database_path = absolute(self.database_path);
        self.template_archive = absolute(self.template_archive);
        self.logging.file = self.logging.file.map(absolute);

        Ok(self)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let sagemaker_role = raw
            .sagemaker_role
            .or_else(|| raw.roles.into_iter().next().map(|entry| entry.role))
            .filter(|role| !role.trim().is_empty())
            .ok_or_else(|| Error::Config("no SageMaker role configured (roles[0].role)".to_string()))?;

        let bucket = raw
            .bucket
            .or_else(|| raw.descriptions.into_iter().next().map(|entry| entry.bucket))
            .filter(|bucket| !bucket.trim().is_empty())
            .ok_or_else(|| Error::Config("no storage bucket configured (descriptions[0].bucket)".to_string()))?;

        let mut config = Self::new(sagemaker_role, bucket);

        if let Some(models_dir) = raw.models_dir {
            config.models_dir = models_dir;
        }
        if let Some(database_path) = raw.database_path {
            config.database_path = database_path;
        }
        if let Some(template_archive) = raw.template_archive {
            config.template_archive = template_archive;
        }

        config.script_timeout = raw.script_timeout_secs.filter(|secs| *secs > 0).map(Duration::from_secs);
        config.training = raw.training;
        config.logging = raw.logging;

        Ok(config)
    }
}

/// Builds an [`AppConfig`] from a file and the environment
pub struct ConfigLoader {
    path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Creates a loader for `path` using the default environment prefix
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Uses a different environment prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Reads and validates the configuration
    pub fn load(&self) -> Result<AppConfig> {
        if !self.path.is_file() {
            return Err(Error::Config(format!(
                "configuration file not found: {}",
                self.path.display()
            ))
            .into());
        }

        debug!("Loading configuration from {}", self.path.display());

        let raw: RawConfig = Config::builder()
            .add_source(File::from(self.path.as_path()).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| Error::Config(format!("{}: {}", self.path.display(), e)))?;

        AppConfig::from_raw(raw)
    }
}
