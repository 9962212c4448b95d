//! Logging setup shared by the annoload binary and tests
//!
//! Console and/or daily-rotated file output, text or JSON lines, and extra
//! `EnvFilter` directives on top of the base level.
//!
//! ```no_run
//! use annoload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!(records = 42, "Extracted records");
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("Invalid log level: {}", s)),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    fn console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl std::str::FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(anyhow::anyhow!("Invalid log output: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub format: LogFormat,
    /// Only used when output includes a file
    pub log_dir: PathBuf,
    /// Rolled files are named `<prefix>.<date>`
    pub log_file_prefix: String,
    /// Comma-separated directives, e.g. `annoload_ingest::gtf=debug`
    pub filter_directives: Option<String>,
    /// Source file and line on every event
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "annoload".to_string(),
            filter_directives: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Read `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`,
    /// `LOG_FILE_PREFIX`, `LOG_FILTER` and `LOG_INCLUDE_LOCATION`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup("LOG_LEVEL") {
            config.level = level.parse()?;
        }
        if let Some(output) = lookup("LOG_OUTPUT") {
            config.output = output.parse()?;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = lookup("LOG_FILE_PREFIX") {
            config.log_file_prefix = prefix;
        }
        config.filter_directives = lookup("LOG_FILTER").filter(|f| !f.trim().is_empty());
        if let Some(value) = lookup("LOG_INCLUDE_LOCATION") {
            config.include_location = value
                .parse()
                .with_context(|| format!("LOG_INCLUDE_LOCATION must be true or false, got '{}'", value))?;
        }

        Ok(config)
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Keeps the non-blocking file writer alive; drop it at process exit to
/// flush buffered log lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize logging with the given configuration
///
/// Installs the global subscriber. Call once at startup and hold the
/// returned guard for the lifetime of the program.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
    let filter = build_filter(config)?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut file_guard = None;

    if config.output.console() {
        layers.push(fmt_layer(config, std::io::stdout, true));
    }

    if config.output.file() {
        std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;

        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        layers.push(fmt_layer(config, non_blocking, false));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    let mut filter =
        EnvFilter::from_default_env().add_directive(config.level.to_tracing_level().into());

    if let Some(ref directives) = config.filter_directives {
        for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
            filter = filter.add_directive(
                directive
                    .trim()
                    .parse()
                    .with_context(|| format!("Failed to parse filter directive '{}'", directive))?,
            );
        }
    }

    Ok(filter)
}

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    match config.format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_output_targets() {
        assert!("both".parse::<LogOutput>().unwrap().console());
        assert!("both".parse::<LogOutput>().unwrap().file());
        assert!(!"console".parse::<LogOutput>().unwrap().file());
        assert!("syslog".parse::<LogOutput>().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::File)
            .format(LogFormat::Json)
            .log_dir("/var/log/annoload")
            .log_file_prefix("run")
            .filter_directives("annoload_ingest=trace")
            .build();

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/annoload"));
        assert_eq!(config.log_file_prefix, "run");
        assert_eq!(config.filter_directives.as_deref(), Some("annoload_ingest=trace"));
    }

    #[test]
    fn test_config_from_lookup() {
        let vars = [
            ("LOG_LEVEL", "warn"),
            ("LOG_OUTPUT", "both"),
            ("LOG_FORMAT", "json"),
            ("LOG_FILTER", " "),
        ];
        let lookup = |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        };

        let config = LogConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.output, LogOutput::Both);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter_directives, None);
        assert_eq!(config.log_file_prefix, "annoload");
    }

    #[test]
    fn test_config_from_lookup_rejects_bad_level() {
        let lookup = |key: &str| (key == "LOG_LEVEL").then(|| "loud".to_string());
        let err = LogConfig::from_lookup(lookup).unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_from_lookup_rejects_bad_flag() {
        let lookup = |key: &str| (key == "LOG_INCLUDE_LOCATION").then(|| "sometimes".to_string());
        assert!(LogConfig::from_lookup(lookup).is_err());
    }

    #[test]
    fn test_build_filter_rejects_bad_directive() {
        let config = LogConfig::builder()
            .filter_directives("annoload_ingest=notalevel")
            .build();
        assert!(build_filter(&config).is_err());
    }
}
