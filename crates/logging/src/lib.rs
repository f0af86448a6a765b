//! Logging for Stoic
//!
//! Installs the global `tracing` subscriber. Diagnostics go to stderr so
//! command output on stdout stays clean; an optional file sink receives a
//! copy through a non-blocking writer.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use stoic_config::LogSettings;

/// Keeps the file writer flushing until dropped at process exit
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Picks the filter directive for a `-v` count, falling back to the configured level
pub fn filter_directive(settings: &LogSettings, verbosity: u8) -> String {
    match verbosity {
        0 => settings.level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Initializes logging; `RUST_LOG` takes precedence over everything else
pub fn init_logging(settings: &LogSettings, verbosity: u8) -> Result<LoggingGuard> {
    let directive = filter_directive(settings, verbosity);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&directive)
            .with_context(|| format!("invalid log level '{}'", directive))?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(true);
    layers.push(if settings.json {
        stderr.json().boxed()
    } else {
        stderr.boxed()
    });

    let file_guard = match &settings.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("log file has no name: {}", path.display()))?;

            std::fs::create_dir_all(directory)
                .with_context(|| format!("creating log directory {}", directory.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
            layers.push(if settings.json {
                file_layer.json().boxed()
            } else {
                file_layer.boxed()
            });

            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(LoggingGuard { _file: file_guard })
}
