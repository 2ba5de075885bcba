//! Run-scoped statistics types
//!
//! Exactly one [`RunStats`] snapshot stream is live per run; the telemetry
//! owner resets it atomically at run start and broadcasts a fresh snapshot
//! after every terminal outcome.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch, used to timestamp failure records.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Terminal failure record for one item. Appended at most once per item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendFailure {
    /// Destination address of the failed item
    pub recipient: String,
    /// Username of the identity that attempted the send
    pub identity_username: String,
    /// Host of the identity that attempted the send
    pub identity_host: String,
    /// Human-readable error
    pub error: String,
    /// Unix milliseconds
    pub timestamp_ms: u64,
}

/// Failure record for one identity that did not validate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFailure {
    pub username: String,
    pub host: String,
    pub error: String,
    pub timestamp_ms: u64,
}

/// Aggregate run counters plus terminal failure lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub identities_validated: u64,
    pub identities_failed: u64,
    pub items_succeeded: u64,
    pub items_failed: u64,
    pub total_items: u64,
    pub is_running: bool,
    pub failed_sends: Vec<SendFailure>,
    pub failed_identities: Vec<IdentityFailure>,
}

impl RunStats {
    /// Items with a terminal outcome so far.
    pub fn items_settled(&self) -> u64 {
        self.items_succeeded + self.items_failed
    }

    /// True once every item has a terminal outcome.
    pub fn is_complete(&self) -> bool {
        !self.is_running && self.items_settled() == self.total_items
    }
}

/// One-shot result of the identity validation phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub valid_count: u64,
    pub invalid_count: u64,
    pub failures: Vec<IdentityFailure>,
}
