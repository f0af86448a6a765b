//! Utility functions for Stoic
//!
//! This module provides utility functions used throughout the workspace.

use std::future::Future;
use std::time::Duration;
use chrono::{DateTime, Utc};
use tokio::time::timeout;

use crate::error::{Error, Result};

/// Formats a duration into a human-readable string
///
/// # Examples
///
/// ```
/// use common::utils::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs == 0 {
        return format!("{}ms", duration.subsec_millis());
    }

    let hours = total_secs / (60 * 60);
    let minutes = (total_secs % (60 * 60)) / 60;
    let seconds = total_secs % 60;

    let mut result = String::new();

    if hours > 0 {
        result.push_str(&format!("{}h ", hours));
    }

    if minutes > 0 || !result.is_empty() {
        result.push_str(&format!("{}m ", minutes));
    }

    result.push_str(&format!("{}s", seconds));

    result
}

/// Executes a future with a timeout
///
/// The future is dropped when the limit is hit, so anything it owns
/// (for example a child process spawned with `kill_on_drop`) is released.
pub async fn execute_with_timeout<T, F>(
    future: F,
    duration: Duration,
    operation_name: &str,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "Operation '{}' timed out after {}",
            operation_name,
            format_duration(duration)
        ))),
    }
}

/// Extracts the repository name from an image URI
///
/// # Examples
///
/// ```
/// use common::utils::repository_from_image;
///
/// assert_eq!(
///     repository_from_image("123.dkr.ecr.us-east-1.amazonaws.com/resnet:latest"),
///     "resnet"
/// );
/// ```
pub fn repository_from_image(image: &str) -> &str {
    let name = image.rsplit('/').next().unwrap_or(image);
    match name.split_once(':') {
        Some((repository, _tag)) => repository,
        None => name,
    }
}

/// Builds a platform-safe training job name from a repository and a timestamp
pub fn training_job_name(repository: &str, at: DateTime<Utc>) -> String {
    let suffix = at.format("%Y-%m-%d-%H-%M-%S").to_string();
    let mut base: String = repository
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    // Job names are capped at 63 characters.
    let max_base = 63 - suffix.len() - 1;
    base.truncate(max_base);
    let base = base.trim_matches('-');

    if base.is_empty() {
        format!("training-{}", suffix)
    } else {
        format!("{}-{}", base, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[tokio::test]
    async fn test_execute_with_timeout_expires() {
        let result: Result<()> = execute_with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            Duration::from_millis(10),
            "sleep",
        )
        .await;

        assert!(result.unwrap_err().is_timeout());
    }

    #[test]
    fn test_repository_from_image() {
        assert_eq!(repository_from_image("resnet:latest"), "resnet");
        assert_eq!(repository_from_image("registry/ns/resnet"), "resnet");
    }

    #[test]
    fn test_training_job_name() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(training_job_name("my_repo", at), "my-repo-2024-03-01-12-30-00");
        assert_eq!(training_job_name("___", at), "training-2024-03-01-12-30-00");

        let long = "x".repeat(100);
        assert!(training_job_name(&long, at).len() <= 63);
    }
}
