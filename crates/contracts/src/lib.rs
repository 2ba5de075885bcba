//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Identity Model
//! - An [`SmtpIdentity`] is one outbound sending account; many dispatch tasks
//!   reference one identity concurrently via `Arc`
//! - The derived pool key `host:port:username` deduplicates pooled transports

mod campaign;
mod error;
mod identity;
mod message;
mod recipient;
mod render;
mod run;
mod transport;

pub use campaign::*;
pub use error::*;
pub use identity::*;
pub use message::*;
pub use recipient::*;
pub use render::{RenderBackend, RenderFormat, RenderRequest};
pub use run::*;
pub use transport::Transport;
