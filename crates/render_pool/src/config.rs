//! Render pool configuration

use std::time::Duration;

/// Pool sizing and timing knobs.
#[derive(Debug, Clone)]
pub struct RenderPoolConfig {
    /// Number of worker slots
    pub workers: usize,
    /// Per-task budget; expired tasks fail and the worker is replaced
    pub task_timeout: Duration,
    /// FIFO task queue capacity; `submit` backpressures when full
    pub queue_capacity: usize,
}

impl RenderPoolConfig {
    /// Worker count derived from the CPU count: `cpus - 1`, clamped to
    /// `[2, 8]`.
    pub fn default_worker_count() -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        cpus.saturating_sub(1).clamp(2, 8)
    }
}

impl Default for RenderPoolConfig {
    fn default() -> Self {
        Self {
            workers: Self::default_worker_count(),
            task_timeout: Duration::from_secs(60),
            queue_capacity: 64,
        }
    }
}
