//! Output formatters for the CLI

use anyhow::Result;
use console::style;
use serde_json::Value;

use common::models::{ContainerDirectory, ModelBuildRecord};

/// Formats the container inventory, one container per line
pub fn format_containers(containers: &[ContainerDirectory]) -> String {
    let width = containers.iter().map(|c| c.name.len()).max().unwrap_or(0);

    containers
        .iter()
        .map(|container| {
            let models = if container.models.is_empty() {
                "(no models)".to_string()
            } else {
                container.models.join(", ")
            };
            format!("{:<width$}  {}", container.name, models, width = width)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formats registry records as an aligned two-column table
pub fn format_records(records: &[ModelBuildRecord]) -> String {
    let width = records
        .iter()
        .map(|r| r.container_name.len())
        .max()
        .unwrap_or(0)
        .max("CONTAINER".len());

    let mut lines = vec![format!("{:<width$}  {}", "CONTAINER", "REPOSITORY", width = width)];
    lines.extend(
        records
            .iter()
            .map(|r| format!("{:<width$}  {}", r.container_name, r.repository, width = width)),
    );

    lines.join("\n")
}

/// Pretty-prints a JSON document
pub fn format_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Styled success line
pub fn success(message: &str) -> String {
    format!("{} {}", style("✔").green(), message)
}

/// Styled notice line
pub fn notice(message: &str) -> String {
    format!("{} {}", style("!").yellow(), message)
}
