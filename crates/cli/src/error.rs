//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum CliError {
    /// Input file not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Configuration parsing error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// No usable recipients in the input file
    #[error("No usable recipients in {path}: {message}")]
    NoRecipients { path: String, message: String },

    /// Dispatch run error
    #[error("Dispatch run failed: {message}")]
    RunFailed { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

#[allow(dead_code)]
impl CliError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn no_recipients(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NoRecipients {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn run_failed(message: impl Into<String>) -> Self {
        Self::RunFailed {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
#[allow(dead_code)]
pub type Result<T> = std::result::Result<T, CliError>;
