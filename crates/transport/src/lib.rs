//! # Transport
//!
//! Transport resource pool and client implementations.
//!
//! Responsibilities:
//! - Cache one reusable transport handle per destination identity
//! - Lazy, once-per-run verification with sticky failure
//! - Mock client for tests; lettre-backed client behind `real-smtp`

mod mock;
mod pool;
#[cfg(feature = "real-smtp")]
mod smtp;

pub use contracts::Transport;
pub use mock::{MockCounters, MockTransport, ScriptedFailure, SentRecord};
pub use pool::{PooledTransport, TransportPool};
#[cfg(feature = "real-smtp")]
pub use smtp::SmtpTransport;
