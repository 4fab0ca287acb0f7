//! Error types for Satcast

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SatcastError>;

/// Result of a single call against a platform or data feed
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

#[derive(Error, Debug)]
pub enum SatcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Upstream data was missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SatcastError {
    /// HTTP status used when this error escapes an HTTP trigger
    pub fn status_code(&self) -> u16 {
        match self {
            SatcastError::Validation(_) | SatcastError::InvalidInput(_) => 400,
            SatcastError::Api(e) => e.status,
            SatcastError::Config(_) | SatcastError::Io(_) => 500,
        }
    }

    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SatcastError::InvalidInput(_) => 3,
            SatcastError::Config(_) => 2,
            SatcastError::Validation(_) | SatcastError::Api(_) | SatcastError::Io(_) => 1,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, SatcastError::Api(e) if e.is_circuit_open())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Failure of a single call against a remote platform or data feed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Circuit breaker open, retry in {}s", remaining.as_secs())]
    CircuitOpen { remaining: Duration },

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl PlatformError {
    /// Map a non-success HTTP status from a remote API
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = format!("HTTP {}: {}", status, message.into());
        match status {
            429 => PlatformError::RateLimit(message),
            401 | 403 => PlatformError::Authentication(message),
            400 | 413 | 422 => PlatformError::Validation(message),
            500..=599 => PlatformError::Network(message),
            _ => PlatformError::Posting(message),
        }
    }

    /// Whether the remote refused us for quota reasons (or we refused
    /// ourselves because of a tripped breaker)
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            PlatformError::RateLimit(_) | PlatformError::CircuitOpen { .. }
        )
    }

    /// Only explicit rate-limit responses feed the circuit breaker
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(self, PlatformError::RateLimit(_))
    }

    /// Transient errors are worth another attempt; the rest are client bugs
    /// or bad credentials
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::Network(_)
                | PlatformError::RateLimit(_)
                | PlatformError::CircuitOpen { .. }
        )
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return PlatformError::from_status(status.as_u16(), e.to_string());
        }
        if e.is_decode() {
            return PlatformError::Validation(format!("Unexpected response body: {}", e));
        }
        PlatformError::Network(e.to_string())
    }
}

/// A failure attributed to a named external service.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{service} API error: {kind}")]
pub struct ApiError {
    pub service: String,
    pub status: u16,
    pub kind: PlatformError,
}

impl ApiError {
    pub fn new(service: impl Into<String>, kind: PlatformError) -> Self {
        Self {
            service: service.into(),
            status: 503,
            kind,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self.kind, PlatformError::CircuitOpen { .. })
    }
}
