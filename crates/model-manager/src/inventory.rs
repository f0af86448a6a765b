//! Container inventory
//!
//! This module enumerates the containers installed under the models root
//! and the model directories inside each one. Scans are a single level deep
//! and always read the current state of the disk.

use std::path::{Path, PathBuf};
use anyhow::Result;
use tracing::{debug, warn};

use common::error::Error;
use common::models::{ContainerDirectory, LOCAL_TEST_DIR};

/// Read-only view of `models/<container>/<model>/...`
#[derive(Debug, Clone)]
pub struct ContainerInventory {
    /// Models root
    root: PathBuf,
}

impl ContainerInventory {
    /// Creates a new inventory over `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Gets the models root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Gets the directory of a container
    pub fn container_path(&self, container_name: &str) -> PathBuf {
        self.root.join(container_name)
    }

    /// Gets the `local_test` directory of a container
    pub fn local_test_path(&self, container_name: &str) -> PathBuf {
        self.container_path(container_name).join(LOCAL_TEST_DIR)
    }

    /// Lists installed containers
    ///
    /// Returns an empty list when the root has no subdirectories, and a
    /// not-found error when the root itself is missing.
    pub fn list_containers(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(Error::NotFound(format!(
                "models directory {} (run `stoic init-db` first)",
                self.root.display()
            ))
            .into());
        }

        subdirectories(&self.root)
    }

    /// Lists the models of a container, `local_test` excluded
    pub fn list_models(&self, container_path: &Path) -> Result<Vec<String>> {
        if !container_path.is_dir() {
            return Err(Error::NotFound(format!("container directory {}", container_path.display())).into());
        }

        let models = subdirectories(container_path)?
            .into_iter()
            .filter(|name| name != LOCAL_TEST_DIR)
            .collect();

        Ok(models)
    }

    /// Returns true if a container with this name is installed
    pub fn contains(&self, container_name: &str) -> Result<bool> {
        Ok(self.list_containers()?.iter().any(|name| name == container_name))
    }

    /// Reads one container
    pub fn container(&self, container_name: &str) -> Result<ContainerDirectory> {
        let models = self.list_models(&self.container_path(container_name))?;
        Ok(ContainerDirectory {
            name: container_name.to_string(),
            models,
        })
    }

    /// Reads every installed container
    pub fn scan(&self) -> Result<Vec<ContainerDirectory>> {
        self.list_containers()?
            .into_iter()
            .map(|name| self.container(&name))
            .collect()
    }
}

/// Names of the immediate subdirectories of `dir`, sorted
///
/// Symlinks are not followed, so a link to a directory is not listed.
/// Dot-prefixed names are hidden; scaffold staging directories use them.
fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;

        if !entry.file_type()?.is_dir() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) if name.starts_with('.') => debug!("Skipping hidden directory {} in {}", name, dir.display()),
            Ok(name) => names.push(name),
            Err(name) => warn!("Skipping non UTF-8 directory name {:?} in {}", name, dir.display()),
        }
    }

    names.sort();
    debug!("Found {} subdirectories in {}", names.len(), dir.display());

    Ok(names)
}
