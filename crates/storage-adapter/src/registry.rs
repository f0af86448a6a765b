//! Model build registry
//!
//! A single SQLite table maps container names to the remote repositories
//! their images were pushed to. Every operation opens its own connection
//! and closes it before returning; SQLite's locking serializes concurrent
//! processes.

use std::path::{Path, PathBuf};
use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use tracing::{debug, info};

use common::error::Error;
use common::models::{validate_identifier, ModelBuildRecord};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS model_builds (
    container_name TEXT NOT NULL,
    repository TEXT NOT NULL,
    UNIQUE (container_name, repository)
)";

/// Registry of pushed model containers
#[derive(Debug, Clone)]
pub struct RegistryStore {
    /// Database file
    path: PathBuf,
}

impl RegistryStore {
    /// Creates a registry handle; nothing is opened until an operation runs
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Gets the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self, create: bool) -> Result<SqliteConnection> {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(create);

        SqliteConnection::connect_with(&options).await.map_err(|e| {
            let hint = if !create && !self.path.exists() {
                " (run `stoic init-db` first)"
            } else {
                ""
            };
            Error::StorageUnavailable(format!("{}: {}{}", self.path.display(), e, hint)).into()
        })
    }

    /// Ensures the database file and the `model_builds` table exist
    pub async fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StorageUnavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let mut conn = self.connect(true).await?;
        sqlx::query(CREATE_TABLE)
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        conn.close().await.map_err(storage_error)?;

        info!("Model registry ready at {}", self.path.display());

        Ok(())
    }

    /// Records a pushed container; an existing identical record is left as is
    pub async fn insert_if_absent(&self, container_name: &str, repository: &str) -> Result<()> {
        validate_identifier("container name", container_name)?;
        validate_identifier("repository", repository)?;

        let mut conn = self.connect(false).await?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO model_builds (container_name, repository) VALUES (?, ?)",
        )
        .bind(container_name)
        .bind(repository)
        .execute(&mut conn)
        .await
        .map_err(storage_error)?;
        conn.close().await.map_err(storage_error)?;

        if result.rows_affected() == 0 {
            debug!("Registry already holds {}:{}", container_name, repository);
        } else {
            info!("Registered {}:{}", container_name, repository);
        }

        Ok(())
    }

    /// Removes every record for a container; returns how many were removed
    pub async fn delete_by_container(&self, container_name: &str) -> Result<u64> {
        let mut conn = self.connect(false).await?;
        let result = sqlx::query("DELETE FROM model_builds WHERE container_name = ?")
            .bind(container_name)
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        conn.close().await.map_err(storage_error)?;

        debug!("Removed {} registry record(s) for {}", result.rows_affected(), container_name);

        Ok(result.rows_affected())
    }

    /// Lists all records in insertion order
    pub async fn list_all(&self) -> Result<Vec<ModelBuildRecord>> {
        let mut conn = self.connect(false).await?;
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT container_name, repository FROM model_builds ORDER BY rowid",
        )
        .fetch_all(&mut conn)
        .await
        .map_err(storage_error)?;
        conn.close().await.map_err(storage_error)?;

        Ok(rows
            .into_iter()
            .map(|(container_name, repository)| ModelBuildRecord { container_name, repository })
            .collect())
    }
}

fn storage_error(e: sqlx::Error) -> anyhow::Error {
    Error::Storage(e.to_string()).into()
}
