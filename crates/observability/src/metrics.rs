//! Dispatch metrics recording
//!
//! Thin wrappers over the `metrics` facade; every terminal outcome is
//! recorded once, labeled by identity host where useful.

use std::collections::HashMap;
use std::time::Duration;

use contracts::RunStats;
use metrics::counter;

/// Record the terminal outcome of one item send.
pub fn record_send_outcome(identity_host: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "mailflow_sends_total",
        "identity" => identity_host.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one retry attempt after a transient transport failure.
pub fn record_retry_attempt(identity_host: &str) {
    counter!(
        "mailflow_send_retries_total",
        "identity" => identity_host.to_string()
    )
    .increment(1);
}

/// Record the outcome of one identity validation.
pub fn record_identity_validation(identity_host: &str, success: bool) {
    let status = if success { "valid" } else { "invalid" };
    counter!(
        "mailflow_identity_validations_total",
        "identity" => identity_host.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Human-readable end-of-run summary, printed by the CLI.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub identities_validated: u64,
    pub identities_failed: u64,
    pub items_succeeded: u64,
    pub items_failed: u64,
    pub total_items: u64,
    pub duration: Duration,
    /// Failure counts grouped by error text
    pub failure_breakdown: HashMap<String, u64>,
}

impl RunSummary {
    pub fn from_stats(stats: &RunStats, duration: Duration) -> Self {
        let mut failure_breakdown: HashMap<String, u64> = HashMap::new();
        for f in &stats.failed_sends {
            *failure_breakdown.entry(f.error.clone()).or_insert(0) += 1;
        }

        Self {
            identities_validated: stats.identities_validated,
            identities_failed: stats.identities_failed,
            items_succeeded: stats.items_succeeded,
            items_failed: stats.items_failed,
            total_items: stats.total_items,
            duration,
            failure_breakdown,
        }
    }

    /// Sends per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            (self.items_succeeded + self.items_failed) as f64 / secs
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Run Summary ===")?;
        writeln!(
            f,
            "Identities: {} valid, {} failed",
            self.identities_validated, self.identities_failed
        )?;
        writeln!(
            f,
            "Items: {} sent, {} failed, {} total",
            self.items_succeeded, self.items_failed, self.total_items
        )?;
        writeln!(
            f,
            "Duration: {:.2}s ({:.2} items/s)",
            self.duration.as_secs_f64(),
            self.throughput()
        )?;

        if !self.failure_breakdown.is_empty() {
            writeln!(f, "Failure breakdown:")?;
            let mut entries: Vec<_> = self.failure_breakdown.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (error, count) in entries {
                writeln!(f, "  {count}x {error}")?;
            }
        }

        Ok(())
    }
}
