//! Command-line argument definitions

use std::path::PathBuf;
use clap::{ArgAction, Parser, Subcommand};

use stoic_config::DEFAULT_CONFIG_PATH;

/// Command line tool to build, train, and deploy ML models
#[derive(Parser, Debug)]
#[command(name = "stoic", version)]
pub struct Cli {
    /// Configuration file
    #[arg(long, env = "STOIC_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create the models directory and the model registry
    #[command(alias = "initdb")]
    InitDb,

    /// List models hosted on the ML platform
    Models,

    /// List inference endpoints
    Endpoints,

    /// Remove a local container directory
    #[command(alias = "removemodel")]
    Remove {
        /// Container to remove
        container_name: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// List local containers and their models
    #[command(alias = "checkmodels")]
    CheckModels,

    /// Create a new container from the template
    Container {
        /// Name of the new container
        container_name: String,

        /// Name of its first model
        model_name: String,
    },

    /// Make the build scripts executable and build the container image
    Build,

    /// Build and push a container image to the remote registry
    Push {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// List registered containers with their remote images
    #[command(alias = "listrepos")]
    ListRepos,

    /// Delete a remote repository (not implemented)
    #[command(alias = "deleterepo")]
    DeleteRepo {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// List local images tagged for the remote registry
    #[command(alias = "listdocker")]
    ListDocker,

    /// Train a registered model locally
    #[command(alias = "trainlocal")]
    TrainLocal,

    /// Serve a registered model locally
    #[command(alias = "servelocal")]
    ServeLocal,

    /// Send a prediction request to the local server
    #[command(alias = "predictlocal")]
    PredictLocal {
        /// Payload file
        payload: String,

        /// Content type of the payload
        content_type: String,
    },

    /// Upload training data to the configured bucket
    #[command(alias = "s3Upload")]
    S3Upload {
        /// Local directory to upload
        work_directory: PathBuf,
    },

    /// Submit a remote training job
    Train,

    /// List the model registry
    Registry,

    /// Drop every registry record of a container
    Unregister {
        /// Container to unregister
        container_name: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

impl Commands {
    /// Verb name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Commands::InitDb => "init-db",
            Commands::Models => "models",
            Commands::Endpoints => "endpoints",
            Commands::Remove { .. } => "remove",
            Commands::CheckModels => "check-models",
            Commands::Container { .. } => "container",
            Commands::Build => "build",
            Commands::Push { .. } => "push",
            Commands::ListRepos => "list-repos",
            Commands::DeleteRepo { .. } => "delete-repo",
            Commands::ListDocker => "list-docker",
            Commands::TrainLocal => "train-local",
            Commands::ServeLocal => "serve-local",
            Commands::PredictLocal { .. } => "predict-local",
            Commands::S3Upload { .. } => "s3-upload",
            Commands::Train => "train",
            Commands::Registry => "registry",
            Commands::Unregister { .. } => "unregister",
        }
    }
}
