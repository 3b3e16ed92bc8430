//! Logging system initialization and configuration
//!
//! Uses the tracing ecosystem for structured logging with support for:
//! - Environment variable override (TMPDIR_LOG)
//! - Optional file output with daily rotation
//! - Console output on stderr, so stdout stays reserved for the directory path

use crate::config::LoggingConfig;
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Environment variable that overrides the configured filter
pub const LOG_ENV_VAR: &str = "TMPDIR_LOG";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Get the default log directory path
fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tmpdir")
        .join("logs")
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn console_layer(config: &LoggingConfig) -> BoxedLayer {
    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    match (LogFormat::parse(&config.format), config.timestamps) {
        (LogFormat::Json, true) => base.json().boxed(),
        (LogFormat::Json, false) => base.json().without_time().boxed(),
        (LogFormat::Compact, true) => base.compact().boxed(),
        (LogFormat::Compact, false) => base.compact().without_time().boxed(),
        (LogFormat::Pretty, true) => base.boxed(),
        (LogFormat::Pretty, false) => base.without_time().boxed(),
    }
}

fn file_layer(config: &LoggingConfig) -> Option<BoxedLayer> {
    if !config.file_output {
        return None;
    }

    let log_dir = config.file_path.clone().unwrap_or_else(default_log_dir);

    // Ensure log directory exists
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {:?}: {}", log_dir, e);
        return None;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "tmpdir.log");

    Some(
        fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    )
}

/// Build the filter from `TMPDIR_LOG`, falling back to the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tmpdir={}",
            parse_level(&config.level).as_str().to_lowercase()
        ))
    })
}

/// Initialize the logging system
///
/// # Environment Variables
/// - `TMPDIR_LOG`: Override log level (e.g., "tmpdir=debug,tmpdir::archive=trace")
pub fn init_logging(config: &LoggingConfig) {
    let layers = vec![Some(console_layer(config)), file_layer(config)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(config))
        .init();

    tracing::debug!(
        level = %config.level,
        format = %config.format,
        file_output = config.file_output,
        "Logging initialized"
    );
}

/// Parse log level from string
pub fn parse_level(s: &str) -> Level {
    match s.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}
