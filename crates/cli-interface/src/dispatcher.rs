//! Command dispatcher
//!
//! Every verb follows the same shape: read the inventory and/or registry,
//! resolve the user's choices, perform one side-effecting action, and on
//! success update the registry. Interactive choices go through a
//! [`ChoicePrompt`] so the flows can run without a terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use common::error::{has_kind, Error};
use common::models::{
    validate_identifier, InstanceCount, ModelBuildRecord, TrainingJobRequest, BUILD_AND_PUSH_SCRIPT, PREDICT_SCRIPT,
    SERVE_LOCAL_SCRIPT, SERVE_LOG_FILE, TRAINING_INSTANCE_TYPES, TRAIN_LOCAL_SCRIPT,
};
use common::process::{OutputMode, ScriptInvocation, ScriptRunner};
use common::utils::{repository_from_image, training_job_name};
use model_manager::executables::{build_scripts, local_test_scripts};
use model_manager::{mark_executable, ContainerInventory, ContainerScaffolder};
use platform_adapter::docker::is_remote_image;
use platform_adapter::{ImageStore, MlPlatform};
use stoic_config::AppConfig;
use storage_adapter::RegistryStore;

use crate::cli::Commands;
use crate::formatters::{format_containers, format_json, format_records, notice, success};
use crate::prompt::ChoicePrompt;

/// Message shown whenever the models root holds no containers
pub const NO_CONTAINERS_MESSAGE: &str = "There currently are no models";

/// How a command ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The action ran
    Completed,
    /// There was nothing to act on
    NothingToDo,
    /// The user declined a confirmation
    Aborted,
    /// The registry could not be opened, so the command did nothing
    Skipped,
    /// The verb is recognized but has no behavior
    Unimplemented,
}

impl CommandOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            CommandOutcome::Aborted => 1,
            _ => 0,
        }
    }
}

/// External capabilities the dispatcher drives
pub struct Collaborators {
    /// Interactive choices
    pub prompt: Arc<dyn ChoicePrompt>,
    /// Container scripts
    pub runner: Arc<dyn ScriptRunner>,
    /// Cloud ML platform
    pub platform: Arc<dyn MlPlatform>,
    /// Local image daemon
    pub images: Arc<dyn ImageStore>,
}

/// Either the value the user chose or the outcome that ends the command
enum Selection<T> {
    Chosen(T),
    Stop(CommandOutcome),
}

/// Runs CLI verbs against the models root, the registry and the platform
pub struct CommandDispatcher {
    config: AppConfig,
    registry: RegistryStore,
    inventory: ContainerInventory,
    scaffolder: ContainerScaffolder,
    prompt: Arc<dyn ChoicePrompt>,
    runner: Arc<dyn ScriptRunner>,
    platform: Arc<dyn MlPlatform>,
    images: Arc<dyn ImageStore>,
}

impl CommandDispatcher {
    /// Creates a new dispatcher
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let registry = RegistryStore::new(&config.database_path);
        let inventory = ContainerInventory::new(&config.models_dir);
        let scaffolder = ContainerScaffolder::new(inventory.clone(), &config.template_archive);

        Self {
            config,
            registry,
            inventory,
            scaffolder,
            prompt: collaborators.prompt,
            runner: collaborators.runner,
            platform: collaborators.platform,
            images: collaborators.images,
        }
    }

    /// Gets the configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs one verb
    pub async fn dispatch(&self, command: &Commands) -> Result<CommandOutcome> {
        debug!("Dispatching {}", command.name());

        match command {
            Commands::InitDb => self.init_db().await,
            Commands::Models => self.list_remote_models().await,
            Commands::Endpoints => self.list_endpoints().await,
            Commands::Remove { container_name, yes } => self.remove_container(container_name, *yes).await,
            Commands::CheckModels => self.check_models(),
            Commands::Container {
                container_name,
                model_name,
            } => self.create_container(container_name, model_name).await,
            Commands::Build => self.build_image().await,
            Commands::Push { yes } => self.push(*yes).await,
            Commands::ListRepos => self.list_repos().await,
            Commands::DeleteRepo { yes } => self.delete_repo(*yes),
            Commands::ListDocker => self.list_docker().await,
            Commands::TrainLocal => self.train_local().await,
            Commands::ServeLocal => self.serve_local().await,
            Commands::PredictLocal { payload, content_type } => self.predict_local(payload, content_type).await,
            Commands::S3Upload { work_directory } => self.s3_upload(work_directory).await,
            Commands::Train => self.train_remote().await,
            Commands::Registry => self.show_registry().await,
            Commands::Unregister { container_name, yes } => self.unregister(container_name, *yes).await,
        }
    }

    /// Creates the models root and the registry table
    pub async fn init_db(&self) -> Result<CommandOutcome> {
        std::fs::create_dir_all(self.inventory.root())?;
        self.registry.initialize().await?;

        info!("Initialized {} and {}", self.inventory.root().display(), self.registry.path().display());
        println!("{}", success("model table setup"));

        Ok(CommandOutcome::Completed)
    }

    /// Prints the models hosted on the platform
    pub async fn list_remote_models(&self) -> Result<CommandOutcome> {
        let models = self.platform.list_models().await?;
        println!("{}", format_json(&models)?);
        Ok(CommandOutcome::Completed)
    }

    /// Prints the platform's inference endpoints
    pub async fn list_endpoints(&self) -> Result<CommandOutcome> {
        let endpoints = self.platform.list_endpoints().await?;
        println!("{}", format_json(&endpoints)?);
        Ok(CommandOutcome::Completed)
    }

    /// Deletes a container directory after confirmation
    ///
    /// Registry records of the container are kept.
    pub async fn remove_container(&self, container_name: &str, yes: bool) -> Result<CommandOutcome> {
        validate_identifier("container name", container_name)?;

        if !self.confirm(yes, "Are you sure you want to remove this container?")? {
            return Ok(CommandOutcome::Aborted);
        }

        let path = self.inventory.container_path(container_name);
        if !path.is_dir() {
            return Err(Error::NotFound(format!("container {}", container_name)).into());
        }

        tokio::fs::remove_dir_all(&path).await?;
        info!("Removed {}", path.display());
        println!("{}", success(&format!("{} successfully removed.", container_name)));

        match self.registry.list_all().await {
            Ok(records) if records.iter().any(|r| r.container_name == container_name) => {
                println!(
                    "{}",
                    notice(&format!(
                        "registry records kept; run `stoic unregister {}` to drop them",
                        container_name
                    ))
                );
            }
            Ok(_) => {}
            Err(e) => debug!("Registry not consulted after removal: {:#}", e),
        }

        Ok(CommandOutcome::Completed)
    }

    /// Prints every container with its models
    pub fn check_models(&self) -> Result<CommandOutcome> {
        let containers = self.inventory.scan()?;

        if containers.is_empty() {
            println!("{}", NO_CONTAINERS_MESSAGE);
            return Ok(CommandOutcome::NothingToDo);
        }

        println!("{}", format_containers(&containers));
        Ok(CommandOutcome::Completed)
    }

    /// Scaffolds a new container from the template archive
    pub async fn create_container(&self, container_name: &str, model_name: &str) -> Result<CommandOutcome> {
        let path = self.scaffolder.scaffold(container_name, model_name).await?;

        println!(
            "{}",
            success(&format!("Container {} created at {}", container_name, path.display()))
        );
        Ok(CommandOutcome::Completed)
    }

    /// Marks the build scripts executable and builds the image locally
    pub async fn build_image(&self) -> Result<CommandOutcome> {
        let container = match self.select_container("Select container to build")? {
            Selection::Chosen(container) => container,
            Selection::Stop(outcome) => return Ok(outcome),
        };
        let container_dir = self.inventory.container_path(&container);
        let model = self.select_model(&container, &container_dir)?;

        println!("Create executables for {}", container);
        mark_executable(&build_scripts(&container_dir, &model))?;

        self.images.build_image(&container_dir, &model).await?;

        println!("{}", success(&format!("Image {} built", model)));
        Ok(CommandOutcome::Completed)
    }

    /// Builds and pushes a container image, then registers it
    ///
    /// Scripts are marked executable before the build script runs. The
    /// registry is only written after the script succeeds.
    pub async fn push(&self, yes: bool) -> Result<CommandOutcome> {
        if !self.confirm(yes, "Are you sure you want to push docker model to ECR?")? {
            return Ok(CommandOutcome::Aborted);
        }

        let container = match self.select_container("Select container to push")? {
            Selection::Chosen(container) => container,
            Selection::Stop(outcome) => return Ok(outcome),
        };
        let container_dir = self.inventory.container_path(&container);
        let model = self.select_model(&container, &container_dir)?;

        mark_executable(&build_scripts(&container_dir, &model))?;

        let invocation = ScriptInvocation::script_in(&container_dir, BUILD_AND_PUSH_SCRIPT).arg(model.as_str());
        self.runner.run(&invocation).await?.check(&invocation)?;

        match self.registry.insert_if_absent(&container, &model).await {
            Ok(()) => {
                info!("Registered {}:{}", container, model);
                println!("{}", success(&format!("Pushed {} as {}", container, model)));
            }
            Err(e) if has_kind(&e, Error::is_storage_unavailable) => {
                warn!("Push of {} succeeded but was not registered: {:#}", container, e);
                eprintln!("{}", notice(&format!("Pushed {} but the registry is unavailable: {:#}", container, e)));
            }
            Err(e) => return Err(e),
        }

        Ok(CommandOutcome::Completed)
    }

    /// Prints each registered container with its remote image ids
    pub async fn list_repos(&self) -> Result<CommandOutcome> {
        let records = match self.registry_records().await? {
            Some(records) => records,
            None => return Ok(CommandOutcome::Skipped),
        };

        if records.is_empty() {
            println!("No pushed containers registered");
            return Ok(CommandOutcome::NothingToDo);
        }

        let mut listing = Vec::with_capacity(records.len());
        for record in &records {
            let image_data = self.platform.list_repository_images(&record.repository).await?;
            listing.push(serde_json::json!({
                "container": record.container_name,
                "repo": record.repository,
                "image_data": image_data,
            }));
        }

        println!("{}", format_json(&serde_json::Value::Array(listing))?);
        Ok(CommandOutcome::Completed)
    }

    /// Confirms, then reports that repository deletion is not available
    pub fn delete_repo(&self, yes: bool) -> Result<CommandOutcome> {
        if !self.confirm(yes, "Are you sure you want to delete the ECR repository?")? {
            return Ok(CommandOutcome::Aborted);
        }

        println!("{}", notice("delete-repo is not implemented; no repository was deleted"));
        Ok(CommandOutcome::Unimplemented)
    }

    /// Prints local images tagged for the remote registry
    pub async fn list_docker(&self) -> Result<CommandOutcome> {
        let images = self.remote_images().await?;

        if images.is_empty() {
            println!("No images tagged for the remote registry");
            return Ok(CommandOutcome::NothingToDo);
        }

        for image in images {
            println!("{}", image);
        }
        Ok(CommandOutcome::Completed)
    }

    /// Runs the local training script of a registered container
    pub async fn train_local(&self) -> Result<CommandOutcome> {
        let (record, local_test) = match self.prepare_local_test("Select container to train locally").await? {
            Selection::Chosen(chosen) => chosen,
            Selection::Stop(outcome) => return Ok(outcome),
        };

        let invocation = ScriptInvocation::script_in(&local_test, TRAIN_LOCAL_SCRIPT).arg(record.repository.as_str());
        self.runner.run(&invocation).await?.check(&invocation)?;

        println!("{}", success("local train complete"));
        Ok(CommandOutcome::Completed)
    }

    /// Runs the local serving script, sending its output to the serve log
    pub async fn serve_local(&self) -> Result<CommandOutcome> {
        let (record, local_test) = match self.prepare_local_test("Select container to serve locally").await? {
            Selection::Chosen(chosen) => chosen,
            Selection::Stop(outcome) => return Ok(outcome),
        };

        let log_file = local_test.join(SERVE_LOG_FILE);
        let invocation = ScriptInvocation::script_in(&local_test, SERVE_LOCAL_SCRIPT)
            .arg(record.repository.as_str())
            .output(OutputMode::File(log_file.clone()));
        self.runner.run(&invocation).await?.check(&invocation)?;

        println!("{}", success(&format!("local server output in {}", log_file.display())));
        Ok(CommandOutcome::Completed)
    }

    /// Runs the local prediction script with a payload and content type
    pub async fn predict_local(&self, payload: &str, content_type: &str) -> Result<CommandOutcome> {
        let (_, local_test) = match self.prepare_local_test("Select container to predict with").await? {
            Selection::Chosen(chosen) => chosen,
            Selection::Stop(outcome) => return Ok(outcome),
        };

        let invocation = ScriptInvocation::script_in(&local_test, PREDICT_SCRIPT)
            .arg(payload)
            .arg(content_type);
        self.runner.run(&invocation).await?.check(&invocation)?;

        Ok(CommandOutcome::Completed)
    }

    /// Uploads a directory under the chosen container's repository prefix
    pub async fn s3_upload(&self, work_directory: &Path) -> Result<CommandOutcome> {
        let record = match self.select_registered("Select s3 data upload prefix name").await? {
            Selection::Chosen(record) => record,
            Selection::Stop(outcome) => return Ok(outcome),
        };

        let location = self
            .platform
            .upload_directory(work_directory, &self.config.bucket, &record.repository)
            .await?;

        println!("Data location: {}", location);
        Ok(CommandOutcome::Completed)
    }

    /// Prompts for image, instance type and count, then submits a training job
    pub async fn train_remote(&self) -> Result<CommandOutcome> {
        let images = self.remote_images().await?;
        if images.is_empty() {
            println!("No images tagged for the remote registry; run `stoic push` first");
            return Ok(CommandOutcome::NothingToDo);
        }

        let image = images[self.prompt.select("Which Image?", &images)?].clone();

        let instance_types: Vec<String> = TRAINING_INSTANCE_TYPES.iter().map(|t| t.to_string()).collect();
        let instance_type = instance_types[self.prompt.select("What instance type?", &instance_types)?].clone();

        let counts: Vec<String> = InstanceCount::ALL.iter().map(|c| c.to_string()).collect();
        let instance_count = InstanceCount::ALL[self.prompt.select("How many instances?", &counts)?];

        let repository = repository_from_image(&image).to_string();
        let request = TrainingJobRequest {
            job_name: training_job_name(&repository, Utc::now()),
            image_uri: image,
            role_arn: self.config.sagemaker_role.clone(),
            instance_type,
            instance_count: instance_count.get(),
            input_data_uri: format!("s3://{}/{}", self.config.bucket, repository),
            output_uri: format!("s3://{}/{}/output", self.config.bucket, repository),
            volume_size_gb: self.config.training.volume_size_gb,
            max_runtime_secs: self.config.training.max_runtime_secs,
        };

        let arn = self.platform.create_training_job(&request).await?;

        println!("{}", success(&format!("Training job {} submitted: {}", request.job_name, arn)));
        Ok(CommandOutcome::Completed)
    }

    /// Prints every registry record
    pub async fn show_registry(&self) -> Result<CommandOutcome> {
        let records = match self.registry_records().await? {
            Some(records) => records,
            None => return Ok(CommandOutcome::Skipped),
        };

        if records.is_empty() {
            println!("No pushed containers registered");
            return Ok(CommandOutcome::NothingToDo);
        }

        println!("{}", format_records(&records));
        Ok(CommandOutcome::Completed)
    }

    /// Drops every registry record of a container after confirmation
    pub async fn unregister(&self, container_name: &str, yes: bool) -> Result<CommandOutcome> {
        validate_identifier("container name", container_name)?;

        if !self.confirm(yes, "Are you sure you want to unregister this container?")? {
            return Ok(CommandOutcome::Aborted);
        }

        match self.registry.delete_by_container(container_name).await {
            Ok(removed) => {
                println!(
                    "{}",
                    success(&format!("Removed {} registry record(s) for {}", removed, container_name))
                );
                Ok(CommandOutcome::Completed)
            }
            Err(e) if has_kind(&e, Error::is_storage_unavailable) => {
                self.report_unavailable(&e);
                Ok(CommandOutcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    fn confirm(&self, yes: bool, message: &str) -> Result<bool> {
        if yes || self.prompt.confirm(message)? {
            return Ok(true);
        }

        eprintln!("Aborted!");
        Ok(false)
    }

    fn report_unavailable(&self, err: &anyhow::Error) {
        warn!("Registry unavailable: {:#}", err);
        eprintln!("{}", notice(&format!("Registry unavailable, nothing done: {:#}", err)));
    }

    /// Registry records, or `None` after reporting an unavailable registry
    async fn registry_records(&self) -> Result<Option<Vec<ModelBuildRecord>>> {
        match self.registry.list_all().await {
            Ok(records) => Ok(Some(records)),
            Err(e) if has_kind(&e, Error::is_storage_unavailable) => {
                self.report_unavailable(&e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn remote_images(&self) -> Result<Vec<String>> {
        Ok(self
            .images
            .list_images()
            .await?
            .into_iter()
            .filter(|image| is_remote_image(image))
            .collect())
    }

    fn select_container(&self, message: &str) -> Result<Selection<String>> {
        let containers = self.inventory.list_containers()?;

        if containers.is_empty() {
            println!("{}", NO_CONTAINERS_MESSAGE);
            return Ok(Selection::Stop(CommandOutcome::NothingToDo));
        }

        let index = self.prompt.select(message, &containers)?;
        Ok(Selection::Chosen(containers[index].clone()))
    }

    fn select_model(&self, container: &str, container_dir: &Path) -> Result<String> {
        let mut models = self.inventory.list_models(container_dir)?;

        match models.len() {
            0 => Err(Error::NotFound(format!("model directory in container {}", container)).into()),
            1 => Ok(models.remove(0)),
            _ => {
                let index = self.prompt.select("Select model", &models)?;
                Ok(models.swap_remove(index))
            }
        }
    }

    async fn select_registered(&self, message: &str) -> Result<Selection<ModelBuildRecord>> {
        let mut records = match self.registry_records().await? {
            Some(records) => records,
            None => return Ok(Selection::Stop(CommandOutcome::Skipped)),
        };

        if records.is_empty() {
            println!("No pushed containers registered; run `stoic push` first");
            return Ok(Selection::Stop(CommandOutcome::NothingToDo));
        }

        let labels: Vec<String> = records.iter().map(ToString::to_string).collect();
        let index = self.prompt.select(message, &labels)?;
        Ok(Selection::Chosen(records.swap_remove(index)))
    }

    /// Chooses a registered container and marks its local test scripts executable
    async fn prepare_local_test(&self, message: &str) -> Result<Selection<(ModelBuildRecord, PathBuf)>> {
        let record = match self.select_registered(message).await? {
            Selection::Chosen(record) => record,
            Selection::Stop(outcome) => return Ok(Selection::Stop(outcome)),
        };

        let local_test = self.inventory.local_test_path(&record.container_name);
        if !local_test.is_dir() {
            return Err(Error::NotFound(format!("local test directory {}", local_test.display())).into());
        }

        mark_executable(&local_test_scripts(&local_test))?;

        Ok(Selection::Chosen((record, local_test)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use common::models::{SERVE_SCRIPT, TRAIN_SCRIPT};
    use common::testing::RecordingRunner;

    use crate::prompt::scripted::ScriptedPrompt;

    #[derive(Default)]
    struct FakePlatform {
        uploads: Mutex<Vec<(PathBuf, String, String)>>,
        jobs: Mutex<Vec<TrainingJobRequest>>,
        listed_repositories: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MlPlatform for FakePlatform {
        async fn list_models(&self) -> Result<Value> {
            Ok(json!({"Models": []}))
        }

        async fn list_endpoints(&self) -> Result<Value> {
            Ok(json!({"Endpoints": []}))
        }

        async fn list_repository_images(&self, repository: &str) -> Result<Value> {
            self.listed_repositories.lock().push(repository.to_string());
            Ok(json!([{"imageTag": "latest"}]))
        }

        async fn upload_directory(&self, directory: &Path, bucket: &str, prefix: &str) -> Result<String> {
            self.uploads
                .lock()
                .push((directory.to_path_buf(), bucket.to_string(), prefix.to_string()));
            Ok(format!("s3://{}/{}", bucket, prefix))
        }

        async fn create_training_job(&self, request: &TrainingJobRequest) -> Result<String> {
            self.jobs.lock().push(request.clone());
            Ok(format!("arn:aws:sagemaker:::training-job/{}", request.job_name))
        }
    }

    #[derive(Default)]
    struct FakeImages {
        images: Vec<String>,
        builds: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait]
    impl ImageStore for FakeImages {
        async fn list_images(&self) -> Result<Vec<String>> {
            Ok(self.images.clone())
        }

        async fn build_image(&self, context_dir: &Path, tag: &str) -> Result<()> {
            self.builds.lock().push((context_dir.to_path_buf(), tag.to_string()));
            Ok(())
        }
    }

    struct Harness {
        _dir: TempDir,
        models: PathBuf,
        dispatcher: CommandDispatcher,
        prompt: Arc<ScriptedPrompt>,
        runner: Arc<RecordingRunner>,
        platform: Arc<FakePlatform>,
        images: Arc<FakeImages>,
    }

    impl Harness {
        fn registry(&self) -> RegistryStore {
            RegistryStore::new(&self.dispatcher.config().database_path)
        }
    }

    fn harness_with(prompt: ScriptedPrompt, runner: RecordingRunner, images: Vec<String>) -> Harness {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::new("arn:aws:iam::1:role/SageMaker", "bucket");
        config.models_dir = dir.path().join("models");
        config.database_path = dir.path().join("database/models.db");
        config.template_archive = dir.path().join("container_template.tar.gz");

        let prompt = Arc::new(prompt);
        let runner = Arc::new(runner);
        let platform = Arc::new(FakePlatform::default());
        let images = Arc::new(FakeImages {
            images,
            ..FakeImages::default()
        });

        let dispatcher = CommandDispatcher::new(
            config,
            Collaborators {
                prompt: prompt.clone(),
                runner: runner.clone(),
                platform: platform.clone(),
                images: images.clone(),
            },
        );

        Harness {
            models: dir.path().join("models"),
            _dir: dir,
            dispatcher,
            prompt,
            runner,
            platform,
            images,
        }
    }

    fn harness(prompt: ScriptedPrompt) -> Harness {
        harness_with(prompt, RecordingRunner::new(), Vec::new())
    }

    fn write_script(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).unwrap();
    }

    fn install_container(models: &Path, container: &str, model: &str) -> PathBuf {
        let dir = models.join(container);
        write_script(&dir.join(BUILD_AND_PUSH_SCRIPT));
        write_script(&dir.join(model).join(TRAIN_SCRIPT));
        write_script(&dir.join(model).join(SERVE_SCRIPT));
        for script in [TRAIN_LOCAL_SCRIPT, SERVE_LOCAL_SCRIPT, PREDICT_SCRIPT] {
            write_script(&dir.join("local_test").join(script));
        }
        dir
    }

    fn is_executable(path: &Path) -> bool {
        std::fs::metadata(path).unwrap().permissions().mode() & 0o100 != 0
    }

    #[tokio::test]
    async fn test_init_db() {
        let h = harness(ScriptedPrompt::new());

        let outcome = h.dispatcher.dispatch(&Commands::InitDb).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        assert!(h.models.is_dir());
        assert!(h.registry().list_all().await.unwrap().is_empty());

        // Running it again is harmless.
        assert_eq!(h.dispatcher.dispatch(&Commands::InitDb).await.unwrap(), CommandOutcome::Completed);
    }

    #[tokio::test]
    async fn test_check_models_empty_and_missing_root() {
        let h = harness(ScriptedPrompt::new());

        let err = h.dispatcher.dispatch(&Commands::CheckModels).await.unwrap_err();
        assert!(has_kind(&err, Error::is_not_found));

        std::fs::create_dir_all(&h.models).unwrap();
        let outcome = h.dispatcher.dispatch(&Commands::CheckModels).await.unwrap();
        assert_eq!(outcome, CommandOutcome::NothingToDo);

        install_container(&h.models, "resnet", "modelA");
        let outcome = h.dispatcher.dispatch(&Commands::CheckModels).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Completed);
    }

    #[tokio::test]
    async fn test_push_marks_scripts_then_registers() {
        let prompt = ScriptedPrompt::new().pick("resnet");
        let runner = RecordingRunner::new().with_observer(|invocation| {
            assert!(is_executable(&invocation.program), "{} not executable", invocation.program.display());
        });
        let h = harness_with(prompt, runner, Vec::new());
        h.dispatcher.init_db().await.unwrap();
        let container_dir = install_container(&h.models, "resnet", "modelA");
        install_container(&h.models, "xgb", "modelB");

        let outcome = h.dispatcher.dispatch(&Commands::Push { yes: true }).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        let calls = h.runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, container_dir.join(BUILD_AND_PUSH_SCRIPT));
        assert_eq!(calls[0].args, vec!["modelA"]);
        assert_eq!(calls[0].working_dir.as_deref(), Some(container_dir.as_path()));
        assert!(is_executable(&container_dir.join("modelA").join(TRAIN_SCRIPT)));
        assert!(is_executable(&container_dir.join("modelA").join(SERVE_SCRIPT)));

        let records = h.registry().list_all().await.unwrap();
        assert_eq!(records, vec![ModelBuildRecord::new("resnet", "modelA").unwrap()]);

        // A second push of the same pair leaves one record.
        let h2 = CommandDispatcher::new(
            h.dispatcher.config().clone(),
            Collaborators {
                prompt: Arc::new(ScriptedPrompt::new().pick("resnet")),
                runner: h.runner.clone(),
                platform: h.platform.clone(),
                images: h.images.clone(),
            },
        );
        h2.push(true).await.unwrap();
        assert_eq!(h.registry().list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_push_declined_has_no_effect() {
        let h = harness(ScriptedPrompt::new().confirm_with(false));
        h.dispatcher.init_db().await.unwrap();
        let container_dir = install_container(&h.models, "resnet", "modelA");

        let outcome = h.dispatcher.dispatch(&Commands::Push { yes: false }).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Aborted);
        assert_eq!(outcome.exit_code(), 1);
        assert!(h.runner.calls().is_empty());
        assert!(!is_executable(&container_dir.join(BUILD_AND_PUSH_SCRIPT)));
        assert!(h.registry().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_push_is_not_registered() {
        let h = harness_with(ScriptedPrompt::new().pick("resnet"), RecordingRunner::new().respond_failure(1), Vec::new());
        h.dispatcher.init_db().await.unwrap();
        install_container(&h.models, "resnet", "modelA");

        let err = h.dispatcher.push(true).await.unwrap_err();

        assert!(has_kind(&err, Error::is_external_tool));
        assert!(h.registry().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_with_unavailable_registry_still_pushes() {
        let h = harness(ScriptedPrompt::new().pick("resnet"));
        install_container(&h.models, "resnet", "modelA");

        let outcome = h.dispatcher.push(true).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        assert_eq!(h.runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_push_prompts_for_model_when_several() {
        let h = harness(ScriptedPrompt::new().pick("resnet").pick("modelB"));
        h.dispatcher.init_db().await.unwrap();
        let container_dir = install_container(&h.models, "resnet", "modelA");
        write_script(&container_dir.join("modelB").join(TRAIN_SCRIPT));
        write_script(&container_dir.join("modelB").join(SERVE_SCRIPT));

        h.dispatcher.push(true).await.unwrap();

        assert_eq!(h.runner.calls()[0].args, vec!["modelB"]);
        assert_eq!(h.prompt.remaining(), 0);
        assert_eq!(
            h.registry().list_all().await.unwrap(),
            vec![ModelBuildRecord::new("resnet", "modelB").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_push_without_containers() {
        let h = harness(ScriptedPrompt::new());
        h.dispatcher.init_db().await.unwrap();

        let outcome = h.dispatcher.push(true).await.unwrap();

        assert_eq!(outcome, CommandOutcome::NothingToDo);
        assert!(h.runner.calls().is_empty());
        assert!(h.prompt.asked().is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_registry_records() {
        let h = harness(ScriptedPrompt::new().confirm_with(true));
        h.dispatcher.init_db().await.unwrap();
        install_container(&h.models, "resnet", "modelA");
        h.registry().insert_if_absent("resnet", "modelA").await.unwrap();

        let outcome = h
            .dispatcher
            .dispatch(&Commands::Remove {
                container_name: "resnet".to_string(),
                yes: false,
            })
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        assert!(!h.models.join("resnet").exists());
        assert_eq!(h.registry().list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_declined_keeps_container() {
        let h = harness(ScriptedPrompt::new().confirm_with(false));
        let container_dir = install_container(&h.models, "resnet", "modelA");

        let outcome = h.dispatcher.remove_container("resnet", false).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Aborted);
        assert!(container_dir.join("modelA").join(TRAIN_SCRIPT).is_file());
        assert_eq!(h.prompt.asked().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_container() {
        let h = harness(ScriptedPrompt::new());
        std::fs::create_dir_all(&h.models).unwrap();

        let err = h.dispatcher.remove_container("ghost", true).await.unwrap_err();
        assert!(has_kind(&err, Error::is_not_found));

        assert!(h.dispatcher.remove_container("../escape", true).await.is_err());
    }

    #[tokio::test]
    async fn test_container_conflict_leaves_tree_untouched() {
        let h = harness(ScriptedPrompt::new());
        let container_dir = install_container(&h.models, "resnet", "modelA");

        let err = h.dispatcher.create_container("resnet", "modelB").await.unwrap_err();

        assert!(has_kind(&err, Error::is_already_exists));
        assert!(!container_dir.join("modelB").exists());
    }

    #[tokio::test]
    async fn test_build_marks_scripts_and_builds_image() {
        let h = harness(ScriptedPrompt::new().pick("resnet"));
        let container_dir = install_container(&h.models, "resnet", "modelA");

        let outcome = h.dispatcher.dispatch(&Commands::Build).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        assert!(is_executable(&container_dir.join(BUILD_AND_PUSH_SCRIPT)));
        assert_eq!(*h.images.builds.lock(), vec![(container_dir, "modelA".to_string())]);
    }

    #[tokio::test]
    async fn test_train_local_runs_in_local_test() {
        let prompt = ScriptedPrompt::new().pick("resnet:modelA");
        let runner = RecordingRunner::new().with_observer(|invocation| {
            assert!(is_executable(&invocation.program));
        });
        let h = harness_with(prompt, runner, Vec::new());
        h.dispatcher.init_db().await.unwrap();
        let container_dir = install_container(&h.models, "resnet", "modelA");
        h.registry().insert_if_absent("resnet", "modelA").await.unwrap();

        let outcome = h.dispatcher.dispatch(&Commands::TrainLocal).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        let local_test = container_dir.join("local_test");
        let call = &h.runner.calls()[0];
        assert_eq!(call.program, local_test.join(TRAIN_LOCAL_SCRIPT));
        assert_eq!(call.args, vec!["modelA"]);
        assert_eq!(call.working_dir.as_deref(), Some(local_test.as_path()));
        for script in [SERVE_LOCAL_SCRIPT, PREDICT_SCRIPT] {
            assert!(is_executable(&local_test.join(script)));
        }
    }

    #[tokio::test]
    async fn test_serve_local_writes_log() {
        let h = harness(ScriptedPrompt::new().pick("resnet:modelA"));
        h.dispatcher.init_db().await.unwrap();
        let container_dir = install_container(&h.models, "resnet", "modelA");
        h.registry().insert_if_absent("resnet", "modelA").await.unwrap();

        h.dispatcher.serve_local().await.unwrap();

        let call = &h.runner.calls()[0];
        assert_eq!(call.program, container_dir.join("local_test").join(SERVE_LOCAL_SCRIPT));
        assert_eq!(
            call.output,
            OutputMode::File(container_dir.join("local_test").join(SERVE_LOG_FILE))
        );
    }

    #[tokio::test]
    async fn test_predict_local_passes_payload() {
        let h = harness(ScriptedPrompt::new().pick("resnet:modelA"));
        h.dispatcher.init_db().await.unwrap();
        install_container(&h.models, "resnet", "modelA");
        h.registry().insert_if_absent("resnet", "modelA").await.unwrap();

        h.dispatcher.predict_local("payload.csv", "text/csv").await.unwrap();

        assert_eq!(h.runner.calls()[0].args, vec!["payload.csv", "text/csv"]);
    }

    #[tokio::test]
    async fn test_local_verbs_skip_without_registry() {
        let h = harness(ScriptedPrompt::new());
        install_container(&h.models, "resnet", "modelA");

        assert_eq!(h.dispatcher.train_local().await.unwrap(), CommandOutcome::Skipped);
        assert_eq!(h.dispatcher.list_repos().await.unwrap(), CommandOutcome::Skipped);
        assert!(h.runner.calls().is_empty());
        assert!(!h.dispatcher.config().database_path.exists());
    }

    #[tokio::test]
    async fn test_list_repos_queries_each_repository() {
        let h = harness(ScriptedPrompt::new());
        h.dispatcher.init_db().await.unwrap();
        h.registry().insert_if_absent("resnet", "modelA").await.unwrap();
        h.registry().insert_if_absent("xgb", "modelB").await.unwrap();

        let outcome = h.dispatcher.dispatch(&Commands::ListRepos).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        assert_eq!(*h.platform.listed_repositories.lock(), vec!["modelA", "modelB"]);
    }

    #[tokio::test]
    async fn test_delete_repo_is_unimplemented() {
        let h = harness(ScriptedPrompt::new().confirm_with(false));

        assert_eq!(h.dispatcher.delete_repo(false).unwrap(), CommandOutcome::Aborted);
        assert_eq!(h.dispatcher.delete_repo(true).unwrap(), CommandOutcome::Unimplemented);
        assert_eq!(CommandOutcome::Unimplemented.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_s3_upload_uses_repository_prefix() {
        let h = harness(ScriptedPrompt::new().pick("resnet:modelA"));
        h.dispatcher.init_db().await.unwrap();
        h.registry().insert_if_absent("resnet", "modelA").await.unwrap();

        let outcome = h
            .dispatcher
            .dispatch(&Commands::S3Upload {
                work_directory: PathBuf::from("data"),
            })
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        assert_eq!(
            *h.platform.uploads.lock(),
            vec![(PathBuf::from("data"), "bucket".to_string(), "modelA".to_string())]
        );
    }

    #[tokio::test]
    async fn test_train_remote_builds_request() {
        let image = "1.dkr.ecr.us-east-1.amazonaws.com/resnet:latest";
        let prompt = ScriptedPrompt::new().pick(image).pick("ml.p2.xlarge").pick("Two");
        let h = harness_with(prompt, RecordingRunner::new(), vec!["resnet:latest".to_string(), image.to_string()]);

        let outcome = h.dispatcher.dispatch(&Commands::Train).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        let jobs = h.platform.jobs.lock();
        let job = &jobs[0];
        assert_eq!(job.image_uri, image);
        assert_eq!(job.instance_type, "ml.p2.xlarge");
        assert_eq!(job.instance_count, 2);
        assert_eq!(job.role_arn, "arn:aws:iam::1:role/SageMaker");
        assert_eq!(job.input_data_uri, "s3://bucket/resnet");
        assert_eq!(job.output_uri, "s3://bucket/resnet/output");
        assert!(job.job_name.starts_with("resnet-"));
    }

    #[tokio::test]
    async fn test_train_remote_without_remote_images() {
        let h = harness_with(ScriptedPrompt::new(), RecordingRunner::new(), vec!["resnet:latest".to_string()]);

        assert_eq!(h.dispatcher.train_remote().await.unwrap(), CommandOutcome::NothingToDo);
        assert!(h.platform.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unregister() {
        let h = harness(ScriptedPrompt::new());
        h.dispatcher.init_db().await.unwrap();
        h.registry().insert_if_absent("resnet", "modelA").await.unwrap();
        h.registry().insert_if_absent("resnet", "modelB").await.unwrap();

        let outcome = h.dispatcher.unregister("resnet", true).await.unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        assert!(h.registry().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_declined_keeps_records() {
        let h = harness(ScriptedPrompt::new().confirm_with(false));
        h.dispatcher.init_db().await.unwrap();
        h.registry().insert_if_absent("resnet", "modelA").await.unwrap();

        let outcome = h
            .dispatcher
            .dispatch(&Commands::Unregister {
                container_name: "resnet".to_string(),
                yes: false,
            })
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Aborted);
        assert_eq!(
            h.registry().list_all().await.unwrap(),
            vec![ModelBuildRecord::new("resnet", "modelA").unwrap()]
        );
    }
}
