use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty, // Default to pretty
        }
    }
}

/// Where formatted records go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Standard error (stdout carries the response in CGI mode)
    Stderr,
    /// Daily rolling files under [`LogConfig::directory`]
    File,
}

impl LogTarget {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "file" => LogTarget::File,
            _ => LogTarget::Stderr,
        }
    }
}

/// Logging configuration, read from the settings file and `TRELLIS_LOG_*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Whether the application [`Logger`](super::Logger) writes at all
    pub enabled: bool,
    /// Log level: trace/debug/info/warn/error
    pub level: String,
    /// Log format: json/pretty
    pub format: LogFormat,
    /// Log target: stderr/file
    pub writer: LogTarget,
    /// Directory for daily log files
    pub directory: PathBuf,
    /// Include file:line location (dev only)
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Pretty,
            writer: LogTarget::Stderr,
            directory: PathBuf::from("./log"),
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields with any `TRELLIS_LOG_*` variables that are set
    pub fn apply_env(&mut self) {
        if let Some(enabled) = env_flag("TRELLIS_LOG_ENABLED") {
            self.enabled = enabled;
        }
        if let Ok(level) = env::var("TRELLIS_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("TRELLIS_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        if let Ok(writer) = env::var("TRELLIS_LOG_WRITER") {
            self.writer = LogTarget::parse(&writer);
        }
        if let Ok(dir) = env::var("TRELLIS_LOG_DIR") {
            self.directory = PathBuf::from(dir);
        }
        if let Some(location) = env_flag("TRELLIS_LOG_INCLUDE_LOCATION") {
            self.include_location = location;
        }
    }

    fn tracing_level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Parse a boolean-ish environment variable (`1/true/yes/on`, `0/false/no/off`).
pub(crate) fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over [`LogConfig::level`] when set. With
/// [`LogTarget::File`] records go to `<directory>/trellis.log.YYYY-MM-DD` through a
/// non-blocking writer; keep the returned guard alive until exit so buffered lines
/// are flushed.
///
/// # Example
///
/// ```no_run
/// use trellis::logging::{init_logging, LogConfig};
///
/// let _guard = init_logging(&LogConfig::from_env()).expect("Failed to initialize logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.tracing_level().as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.writer {
        LogTarget::File => {
            std::fs::create_dir_all(&config.directory).with_context(|| {
                format!("Failed to create log directory {}", config.directory.display())
            })?;
            let appender = tracing_appender::rolling::daily(&config.directory, "trellis.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            let fmt_layer = match config.format {
                LogFormat::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_writer(non_blocking)
                    .boxed(),
                LogFormat::Pretty => tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_writer(non_blocking)
                    .boxed(),
            };

            registry
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize file logging")?;
            Ok(Some(guard))
        }
        LogTarget::Stderr => {
            let fmt_layer = match config.format {
                LogFormat::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_writer(std::io::stderr)
                    .boxed(),
                LogFormat::Pretty => tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_writer(std::io::stderr)
                    .boxed(),
            };

            registry
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize stderr logging")?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Pretty); // Default
    }

    #[test]
    fn test_log_target_parse() {
        assert_eq!(LogTarget::parse("file"), LogTarget::File);
        assert_eq!(LogTarget::parse("FILE"), LogTarget::File);
        assert_eq!(LogTarget::parse("stderr"), LogTarget::Stderr);
        assert_eq!(LogTarget::parse("syslog"), LogTarget::Stderr);
    }

    #[test]
    fn test_tracing_level_falls_back_to_info() {
        let mut config = LogConfig::default();
        config.level = "WARN".to_string();
        assert_eq!(config.tracing_level(), Level::WARN);
        config.level = "loud".to_string();
        assert_eq!(config.tracing_level(), Level::INFO);
    }

    #[test]
    fn test_log_config_deserializes_partial_yaml() {
        let config: LogConfig = serde_yaml::from_str("format: json\nwriter: file\n").unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.writer, LogTarget::File);
        assert_eq!(config.level, "info");
        assert_eq!(config.directory, PathBuf::from("./log"));
    }
}
