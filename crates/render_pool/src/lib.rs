//! # Render Pool
//!
//! Supervised pool of out-of-process rendering workers.
//!
//! Responsibilities:
//! - FIFO task queue matched against fungible idle workers
//! - Per-task timeout with forced worker replacement
//! - Crash detection and automatic replacement
//! - Terminal shutdown that fails queued and in-flight tasks
//!
//! A stuck external process never blocks the pool indefinitely: the task
//! fails with a timeout, the process is killed, and the slot is recycled
//! while the rest of the queue keeps draining.

mod backend;
mod config;
mod mock;
mod pool;
mod task;

pub use backend::CommandBackend;
pub use config::RenderPoolConfig;
pub use contracts::{RenderBackend, RenderFormat, RenderRequest};
pub use mock::MockBackend;
pub use pool::{RenderPool, WorkerState};
pub use task::RenderHandle;
