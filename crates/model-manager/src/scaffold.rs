//! Container scaffolding
//!
//! New containers are unpacked from a gzip tarball holding a
//! `container_template/` directory whose `algorithm/` subdirectory becomes
//! the first model. Extraction happens in a staging directory inside the
//! models root and is moved into place only once complete, so a failed
//! scaffold never leaves a half-built container behind.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use tracing::{debug, info};

use common::error::Error;
use common::models::{validate_identifier, LOCAL_TEST_DIR};

use crate::inventory::ContainerInventory;

/// Top-level directory inside the template archive
pub const TEMPLATE_DIR: &str = "container_template";

/// Model directory inside the template that gets renamed
pub const TEMPLATE_MODEL_DIR: &str = "algorithm";

/// Creates containers from the template archive
#[derive(Debug, Clone)]
pub struct ContainerScaffolder {
    /// Inventory of the models root
    inventory: ContainerInventory,
    /// Template archive
    template_archive: PathBuf,
}

impl ContainerScaffolder {
    /// Creates a new scaffolder
    pub fn new(inventory: ContainerInventory, template_archive: impl Into<PathBuf>) -> Self {
        Self {
            inventory,
            template_archive: template_archive.into(),
        }
    }

    /// Scaffolds `models/<container_name>/<model_name>` and returns the container directory
    ///
    /// An existing container of the same name is a conflict and leaves the
    /// models root untouched.
    pub async fn scaffold(&self, container_name: &str, model_name: &str) -> Result<PathBuf> {
        validate_identifier("container name", container_name)?;
        validate_identifier("model name", model_name)?;

        if container_name.starts_with('.') {
            return Err(Error::InvalidArgument(format!("container name '{}' may not start with '.'", container_name)).into());
        }

        if model_name == LOCAL_TEST_DIR {
            return Err(Error::InvalidArgument(format!("'{}' is reserved for local test scripts", LOCAL_TEST_DIR)).into());
        }

        if self.inventory.contains(container_name)? || self.inventory.container_path(container_name).exists() {
            return Err(Error::AlreadyExists(format!("container {}", container_name)).into());
        }

        if !self.template_archive.is_file() {
            return Err(Error::NotFound(format!("container template {}", self.template_archive.display())).into());
        }

        info!("Scaffolding container {} with model {}", container_name, model_name);

        let archive = self.template_archive.clone();
        let root = self.inventory.root().to_path_buf();
        let container = container_name.to_string();
        let model = model_name.to_string();

        let target = tokio::task::spawn_blocking(move || unpack_template(&archive, &root, &container, &model))
            .await
            .map_err(|e| Error::Internal(format!("scaffold task failed: {}", e)))??;

        info!("Container {} created at {}", container_name, target.display());

        Ok(target)
    }
}

fn unpack_template(archive: &Path, root: &Path, container_name: &str, model_name: &str) -> Result<PathBuf> {
    let staging = tempfile::Builder::new()
        .prefix(".scaffold-")
        .tempdir_in(root)
        .with_context(|| format!("creating staging directory in {}", root.display()))?;

    let file = File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
    tar::Archive::new(GzDecoder::new(BufReader::new(file)))
        .unpack(staging.path())
        .with_context(|| format!("extracting {}", archive.display()))?;

    let template_dir = staging.path().join(TEMPLATE_DIR);
    let model_dir = template_dir.join(TEMPLATE_MODEL_DIR);
    if !model_dir.is_dir() {
        return Err(Error::NotFound(format!(
            "{}/{} in {}",
            TEMPLATE_DIR,
            TEMPLATE_MODEL_DIR,
            archive.display()
        ))
        .into());
    }

    std::fs::rename(&model_dir, template_dir.join(model_name))?;
    debug!("Renamed {} to {}", TEMPLATE_MODEL_DIR, model_name);

    let target = root.join(container_name);
    if target.exists() {
        return Err(Error::AlreadyExists(format!("container {}", container_name)).into());
    }

    std::fs::rename(&template_dir, &target)
        .with_context(|| format!("moving template into {}", target.display()))?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::error::has_kind;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn append_file(builder: &mut tar::Builder<GzEncoder<File>>, path: &str, body: &str) {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, body.as_bytes()).unwrap();
    }

    fn write_template(path: &Path, with_algorithm: bool) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        append_file(&mut builder, "container_template/Dockerfile", "FROM python:3\n");
        append_file(&mut builder, "container_template/build_and_push.sh", "#!/bin/sh\n");
        append_file(&mut builder, "container_template/local_test/train_local.sh", "#!/bin/sh\n");
        if with_algorithm {
            append_file(&mut builder, "container_template/algorithm/train", "#!/bin/sh\n");
            append_file(&mut builder, "container_template/algorithm/serve", "#!/bin/sh\n");
        }

        builder.into_inner().unwrap().finish().unwrap();
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        scaffolder: ContainerScaffolder,
    }

    fn fixture(with_algorithm: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("models");
        std::fs::create_dir_all(&root).unwrap();

        let archive = dir.path().join("container_template.tar.gz");
        write_template(&archive, with_algorithm);

        let scaffolder = ContainerScaffolder::new(ContainerInventory::new(&root), archive);
        Fixture { _dir: dir, root, scaffolder }
    }

    fn listing(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(root)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_scaffold_creates_container() {
        let fixture = fixture(true);

        let target = fixture.scaffolder.scaffold("resnet", "modelA").await.unwrap();

        assert_eq!(target, fixture.root.join("resnet"));
        assert!(target.join("modelA/train").is_file());
        assert!(target.join("build_and_push.sh").is_file());
        assert!(target.join("local_test/train_local.sh").is_file());
        assert!(!target.join("algorithm").exists());
        assert_eq!(listing(&fixture.root), vec!["resnet"]);

        let inventory = ContainerInventory::new(&fixture.root);
        assert_eq!(inventory.container("resnet").unwrap().models, vec!["modelA"]);
    }

    #[tokio::test]
    async fn test_existing_container_is_conflict() {
        let fixture = fixture(true);
        std::fs::create_dir_all(fixture.root.join("x/old_model")).unwrap();
        let before = listing(&fixture.root.join("x"));

        let err = fixture.scaffolder.scaffold("x", "modelA").await.unwrap_err();

        assert!(has_kind(&err, Error::is_already_exists));
        assert_eq!(listing(&fixture.root), vec!["x"]);
        assert_eq!(listing(&fixture.root.join("x")), before);
    }

    #[tokio::test]
    async fn test_bad_archive_leaves_nothing_behind() {
        let fixture = fixture(false);

        let err = fixture.scaffolder.scaffold("resnet", "modelA").await.unwrap_err();

        assert!(has_kind(&err, Error::is_not_found));
        assert!(listing(&fixture.root).is_empty());
    }

    #[tokio::test]
    async fn test_stale_staging_directory_is_ignored() {
        let fixture = fixture(true);
        std::fs::create_dir_all(fixture.root.join(".scaffold-stale/container_template/algorithm")).unwrap();

        fixture.scaffolder.scaffold("resnet", "modelA").await.unwrap();

        let inventory = ContainerInventory::new(&fixture.root);
        assert_eq!(inventory.list_containers().unwrap(), vec!["resnet"]);
    }

    #[tokio::test]
    async fn test_reserved_model_name() {
        let fixture = fixture(true);
        assert!(fixture.scaffolder.scaffold("resnet", "local_test").await.is_err());
        assert!(fixture.scaffolder.scaffold("a/b", "modelA").await.is_err());
        assert!(fixture.scaffolder.scaffold(".hidden", "modelA").await.is_err());
        assert!(listing(&fixture.root).is_empty());
    }

    #[tokio::test]
    async fn test_missing_template() {
        let dir = TempDir::new().unwrap();
        let scaffolder = ContainerScaffolder::new(
            ContainerInventory::new(dir.path()),
            dir.path().join("missing.tar.gz"),
        );

        let err = scaffolder.scaffold("resnet", "modelA").await.unwrap_err();
        assert!(has_kind(&err, Error::is_not_found));
    }
}
