//! Error types for Testbed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Environment errors
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    // Execution errors
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Test report errors
    #[error("Test report error: {0}")]
    Report(String),

    // Serialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a failed capability or structural check.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
