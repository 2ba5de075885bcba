//! Outbound sending identity
//!
//! One `SmtpIdentity` describes one destination account. Identities are
//! immutable after construction and shared across dispatch tasks via `Arc`.

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Default submission port when the input omits one.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Connection ceilings for one pooled transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    /// Maximum simultaneous connections the handle may open
    pub max_connections: u32,
    /// Maximum messages per connection before the handle recycles it
    pub max_messages: u32,
    /// Connection/greeting timeout in milliseconds
    pub connection_timeout_ms: u64,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_connections: 5,
            max_messages: 100,
            connection_timeout_ms: 30_000,
        }
    }
}

/// One outbound sending account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpIdentity {
    /// Server hostname
    pub host: String,
    /// Submission port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login / envelope-from address
    pub username: String,
    /// Credential
    pub password: String,
    /// Optional display name used in the From header
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Connection ceilings for the pooled handle
    #[serde(default)]
    pub limits: PoolLimits,
}

fn default_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl SmtpIdentity {
    /// Create an identity with default port and limits.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SMTP_PORT,
            username: username.into(),
            password: password.into(),
            sender_name: None,
            limits: PoolLimits::default(),
        }
    }

    /// Derived transport pool key.
    ///
    /// Two identities with the same key share one pooled transport handle.
    pub fn pool_key(&self) -> String {
        format!("{}:{}:{}", self.host, self.port, self.username)
    }

    /// Check that all fields required for a connection attempt are present.
    ///
    /// Incomplete identities fail as `InvalidIdentity` without any network
    /// I/O being attempted.
    pub fn check_complete(&self) -> Result<(), ContractError> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("host");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.password.is_empty() {
            missing.push("password");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ContractError::invalid_identity(
                &self.username,
                format!("missing required fields: {}", missing.join(", ")),
            ))
        }
    }
}
