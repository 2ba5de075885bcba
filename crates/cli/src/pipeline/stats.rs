//! Run report printed at the end of a dispatch.

use std::time::Duration;

use contracts::RunStats;
use observability::RunSummary;

/// Final outcome of one dispatch run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final run counters and failure lists
    pub stats: RunStats,

    /// Wall-clock duration of the whole run
    pub duration: Duration,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_stats(&self.stats, self.duration)
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let summary = self.summary();

        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Dispatch Run Report                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", summary.duration.as_secs_f64());
        println!("   ├─ Items: {} total", summary.total_items);
        println!("   ├─ Succeeded: {}", summary.items_succeeded);
        println!("   ├─ Failed: {}", summary.items_failed);
        println!("   └─ Throughput: {:.2} items/s", summary.throughput());

        println!("\n🔑 Identities");
        println!("   ├─ Validated: {}", summary.identities_validated);
        println!("   └─ Failed: {}", summary.identities_failed);

        if !self.stats.failed_identities.is_empty() {
            println!("\n⚠  Failed Identities");
            for failure in &self.stats.failed_identities {
                println!("   ├─ {} @ {}: {}", failure.username, failure.host, failure.error);
            }
        }

        if !summary.failure_breakdown.is_empty() {
            println!("\n⚠  Failure Breakdown");
            let mut entries: Vec<_> = summary.failure_breakdown.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (error, count) in entries {
                println!("   ├─ {}x {}", count, error);
            }
        }

        println!();
    }
}
