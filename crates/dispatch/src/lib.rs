//! # Dispatch
//!
//! Batch dispatch engine: partitions a recipient list across validated
//! identities and drives bounded-concurrency delivery with pacing, retry
//! classification, and cooperative cancellation.
//!
//! Responsibilities:
//! - Sequential identity validation through the transport pool
//! - Ceiling-based partitioning, one partition per identity
//! - Per-partition concurrency gates carved out of a shared budget
//! - Retry on transient transport failures, terminal accounting otherwise
//! - Run lifecycle control (start / stop / status)

mod controller;
mod engine;
mod error;
mod gate;
mod partition;
mod retry;

pub use controller::RunController;
pub use engine::DispatchEngine;
pub use error::DispatchError;
pub use gate::{Gate, GatePermit};
pub use partition::{partition, per_identity_budget, Partition};
pub use retry::{send_with_retry, RetryPolicy};
