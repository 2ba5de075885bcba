//! Run telemetry
//!
//! One [`RunTelemetry`] instance is live per run. The dispatch engine owns
//! it for the duration of the run and mutates it only through this API;
//! external observers subscribe to the broadcast channel instead of reading
//! shared state. Every mutation publishes a fresh [`RunStats`] snapshot in
//! completion order, so final counters are exact regardless of interleaving.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use contracts::{now_millis, IdentityFailure, RunStats, SendFailure, ValidationSummary};
use tokio::sync::watch;
use tracing::debug;

/// Mutable run-scoped counters with a broadcast hook and a cooperative
/// stop flag.
pub struct RunTelemetry {
    stats: Mutex<RunStats>,
    stats_tx: watch::Sender<RunStats>,
    validation_tx: watch::Sender<Option<ValidationSummary>>,
    stop: AtomicBool,
}

impl RunTelemetry {
    pub fn new() -> Self {
        let (stats_tx, _) = watch::channel(RunStats::default());
        let (validation_tx, _) = watch::channel(None);
        Self {
            stats: Mutex::new(RunStats::default()),
            stats_tx,
            validation_tx,
            stop: AtomicBool::new(false),
        }
    }

    /// Reset all counters atomically at run start.
    pub fn reset(&self, total_items: u64) {
        {
            let mut stats = self.stats.lock().unwrap();
            *stats = RunStats {
                total_items,
                is_running: true,
                ..Default::default()
            };
        }
        self.stop.store(false, Ordering::SeqCst);
        self.validation_tx.send_replace(None);
        self.broadcast();
        debug!(total_items, "run telemetry reset");
    }

    /// Record one identity passing validation.
    pub fn identity_validated(&self) {
        self.stats.lock().unwrap().identities_validated += 1;
        self.broadcast();
    }

    /// Record one identity failing validation.
    pub fn identity_failed(&self, failure: IdentityFailure) {
        {
            let mut stats = self.stats.lock().unwrap();
            stats.identities_failed += 1;
            stats.failed_identities.push(failure);
        }
        self.broadcast();
    }

    /// Record one item reaching terminal success.
    pub fn item_succeeded(&self) {
        self.stats.lock().unwrap().items_succeeded += 1;
        self.broadcast();
    }

    /// Record one item reaching terminal failure. Exactly one record per
    /// item; callers only invoke this after retries are exhausted.
    pub fn item_failed(&self, failure: SendFailure) {
        {
            let mut stats = self.stats.lock().unwrap();
            stats.items_failed += 1;
            stats.failed_sends.push(failure);
        }
        self.broadcast();
    }

    /// Record items that were never attempted (stopped run, zero valid
    /// identities) so the settled-items invariant holds.
    pub fn items_not_attempted(&self, recipients: impl IntoIterator<Item = String>, reason: &str) {
        {
            let mut stats = self.stats.lock().unwrap();
            for recipient in recipients {
                stats.items_failed += 1;
                stats.failed_sends.push(SendFailure {
                    recipient,
                    identity_username: String::new(),
                    identity_host: String::new(),
                    error: reason.to_string(),
                    timestamp_ms: now_millis(),
                });
            }
        }
        self.broadcast();
    }

    /// Clear `is_running` and emit the final broadcast.
    pub fn finish(&self) {
        self.stats.lock().unwrap().is_running = false;
        self.broadcast();
    }

    /// Publish the one-shot identity-validation-complete event.
    pub fn validation_complete(&self, summary: ValidationSummary) {
        debug!(
            valid = summary.valid_count,
            invalid = summary.invalid_count,
            "identity validation complete"
        );
        self.validation_tx.send_replace(Some(summary));
    }

    /// Request cooperative stop. In-flight items drain; no new items start.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.stats.lock().unwrap().is_running
    }

    /// Current stats snapshot.
    pub fn snapshot(&self) -> RunStats {
        self.stats.lock().unwrap().clone()
    }

    /// Subscribe to stats snapshots. The receiver always observes the most
    /// recent snapshot first.
    pub fn subscribe(&self) -> watch::Receiver<RunStats> {
        self.stats_tx.subscribe()
    }

    /// Subscribe to the identity-validation-complete event.
    pub fn validation_events(&self) -> watch::Receiver<Option<ValidationSummary>> {
        self.validation_tx.subscribe()
    }

    fn broadcast(&self) {
        let snapshot = self.stats.lock().unwrap().clone();
        self.stats_tx.send_replace(snapshot);
    }
}

impl Default for RunTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
