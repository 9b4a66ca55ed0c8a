use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::helpers::app_config::AppConfig;
use crate::interfaces::error::IngestError;
use crate::services::ingestion::error_log::INSERTION_ERRORS_TARGET;

/// Keeps the file writers flushing until the run ends.
#[must_use]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Initializes the logging, ensuring that the `RUST_LOG` environment
/// variable is always considered first.
///
/// Insertion errors go to their own file in addition to the console.
pub fn init_logging(config: &AppConfig) -> Result<LogGuards, IngestError> {
    let mut guards = Vec::new();

    let console = fmt::layer().with_filter(env_filter(&config.log_filter)?);

    let main_file = match &config.log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            guards.push(guard);
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(env_filter(&config.log_filter)?),
            )
        }
        None => None,
    };

    let (writer, guard) =
        tracing_appender::non_blocking(file_appender(&config.insertion_error_file)?);
    guards.push(guard);
    let insertion_errors = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer)
        .with_filter(filter_fn(|metadata| {
            metadata.target() == INSERTION_ERRORS_TARGET
        }));

    tracing_subscriber::registry()
        .with(console)
        .with(main_file)
        .with(insertion_errors)
        .try_init()
        .map_err(|e| IngestError::Config(format!("Failed to set the global tracing subscriber: {e}")))?;

    Ok(LogGuards { _guards: guards })
}

fn env_filter(default_filter: &str) -> Result<EnvFilter, IngestError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| IngestError::Config(format!("Invalid log filter: {e}")))
}

fn file_appender(path: &str) -> Result<RollingFileAppender, IngestError> {
    let path = Path::new(path);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::Config(format!("Invalid log file path: {}", path.display())))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|e| IngestError::Config(format!("Can't open log file {}: {e}", path.display())))
}
