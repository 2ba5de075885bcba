//! Layered error definitions
//!
//! Categorized by source: config / identity / render pool / transport / ingestion

use thiserror::Error;

/// Transport failure classification.
///
/// Transient failures are worth retrying (connection reset, timeout);
/// permanent failures will not improve on retry (bad credentials, rejected
/// recipient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Transient,
    Permanent,
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Identity Errors =====
    /// Identity is missing required fields; never attempted on the wire
    #[error("invalid identity '{username}': {message}")]
    InvalidIdentity { username: String, message: String },

    /// Identity reachability/credential check failed; terminal for the run
    #[error("verification failed for '{host}': {message}")]
    Verification { host: String, message: String },

    // ===== Render Pool Errors =====
    /// Render task exceeded its time budget; the worker was replaced
    #[error("render task {task_id} timed out after {timeout_ms}ms")]
    RenderTimeout { task_id: u64, timeout_ms: u64 },

    /// Worker process exited abnormally while bound to a task
    #[error("render worker crashed on task {task_id}: {message}")]
    WorkerCrashed { task_id: u64, message: String },

    /// Task submitted during or after pool shutdown
    #[error("render pool is shut down")]
    PoolShutdown,

    /// Rendering backend unavailable or misbehaving (probe failure, spawn error)
    #[error("render backend error: {message}")]
    RenderBackend { message: String },

    // ===== Transport Errors =====
    /// Send failed; `kind` decides whether the dispatch engine retries
    #[error("transport error ({kind:?}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    // ===== Ingestion Errors =====
    /// Input file produced nothing usable; no run starts
    #[error("input '{path}' is empty or unparseable: {message}")]
    EmptyOrUnparseable { path: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid identity error
    pub fn invalid_identity(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            username: username.into(),
            message: message.into(),
        }
    }

    /// Create verification error
    pub fn verification(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Verification {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create render backend error
    pub fn render_backend(message: impl Into<String>) -> Self {
        Self::RenderBackend {
            message: message.into(),
        }
    }

    /// Create transient transport error
    pub fn transport_transient(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::Transient,
            message: message.into(),
        }
    }

    /// Create permanent transport error
    pub fn transport_permanent(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Create ingestion error
    pub fn empty_or_unparseable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmptyOrUnparseable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation could succeed.
    ///
    /// Only transient transport errors qualify; render and identity failures
    /// are terminal for the item or identity they belong to.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                kind: TransportErrorKind::Transient,
                ..
            }
        )
    }

    /// Classify a raw transport error message the way the retry policy expects.
    ///
    /// The retriable substrings match connection-level failures; everything
    /// else (authentication, rejected addresses) is permanent.
    pub fn classify_transport(message: impl Into<String>) -> Self {
        const RETRIABLE: [&str; 7] = [
            "econnreset",
            "epipe",
            "etimedout",
            "econnrefused",
            "connection closed",
            "connection lost",
            "connection error",
        ];

        let message = message.into();
        let lowered = message.to_lowercase();
        let kind = if RETRIABLE.iter().any(|s| lowered.contains(s)) {
            TransportErrorKind::Transient
        } else {
            TransportErrorKind::Permanent
        };

        Self::Transport { kind, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transport_transient() {
        let err = ContractError::classify_transport("ECONNRESET by peer");
        assert!(err.is_transient());

        let err = ContractError::classify_transport("connection closed unexpectedly");
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_transport_permanent() {
        let err = ContractError::classify_transport("535 authentication failed");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_non_transport_never_transient() {
        assert!(!ContractError::PoolShutdown.is_transient());
        assert!(!ContractError::verification("mx.example.com", "refused").is_transient());
    }
}
