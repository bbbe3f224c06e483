use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::result::{ExporterError, Result};

const DEFAULT_DIRECTIVES: &str = "info";

/// Output format of log lines on stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    #[default]
    Fmt,
    /// One JSON object per event
    Json,
}

/// Install the global subscriber.
///
/// Filtering follows `RUST_LOG`, falling back to `info`. The returned guard
/// flushes buffered lines on drop and must be held for the process lifetime.
pub fn init_logging(format: LogFormat) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Fmt => registry
            .with(fmt::layer().with_writer(writer).with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer).with_current_span(true))
            .try_init(),
    };
    installed.map_err(ExporterError::logging_init)?;

    Ok(guard)
}
