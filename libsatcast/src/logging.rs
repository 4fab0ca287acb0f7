//! Logging setup shared by the Satcast binaries
//!
//! Events go to stderr as text, JSON or pretty output. `RUST_LOG` wins when
//! set; otherwise the configured level applies to our crates and noisy HTTP
//! internals are held at `warn`.
//!
//! # Examples
//!
//! ```no_run
//! use libsatcast::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "debug").init();
//!
//! // Or honour SATCAST_LOG_FORMAT / SATCAST_LOG_LEVEL
//! libsatcast::logging::init_default();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const FORMAT_ENV: &str = "SATCAST_LOG_FORMAT";
pub const LEVEL_ENV: &str = "SATCAST_LOG_LEVEL";

const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,h2=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: impl Into<String>) -> Self {
        Self {
            format,
            level: level.into(),
        }
    }

    /// Read `SATCAST_LOG_FORMAT` and `SATCAST_LOG_LEVEL`, defaulting to text at info
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = lookup(FORMAT_ENV)
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text);
        let level = lookup(LEVEL_ENV)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        Self::new(format, level)
    }

    /// Filter directives used when `RUST_LOG` is not set
    pub fn directives(&self) -> String {
        format!("{},{}", self.level, QUIET_DEPENDENCIES)
    }

    /// Install the global subscriber
    ///
    /// A second call (e.g. from tests sharing a process) is ignored.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.directives()));

        let result = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false)
                .try_init(),
        };

        if let Err(e) = result {
            tracing::debug!("Logging already initialized: {}", e);
        }
    }
}

/// Initialize logging from `SATCAST_LOG_FORMAT` and `SATCAST_LOG_LEVEL`
pub fn init_default() {
    LoggingConfig::from_env().init();
}
