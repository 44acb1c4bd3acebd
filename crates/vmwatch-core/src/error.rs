//! Error handling for vmwatch
//!
//! Provides a unified error type and result type for use across all vmwatch
//! components.

/// Result type alias for vmwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for vmwatch
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Credential acquisition errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Instance not found in the cloud API
    #[error("Instance not found: {0}")]
    NotFound(String),

    /// Cloud API reported a failure
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// HTTP transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration parsing errors
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a gateway error
    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Check if this error is retryable on a later reconciliation round
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Gateway(_) | Error::Transport(_) | Error::Timeout(_) | Error::Io(_)
        )
    }

    /// Check if this error indicates a startup-fatal configuration problem
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::InvalidConfiguration(_) | Error::Config(_))
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "configuration",
            Error::Auth(_) => "auth",
            Error::NotFound(_) => "not_found",
            Error::Gateway(_) => "gateway",
            Error::Timeout(_) => "timeout",
            Error::Transport(_) => "transport",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}
