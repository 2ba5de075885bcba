//! Transport trait - outbound send boundary interface
//!
//! Abstracts the message transport client for testing and implementation
//! replacement. The dispatch engine only needs "submit, await success or a
//! typed failure"; connection management is the implementation's concern.

use crate::{ContractError, OutboundMessage, SmtpIdentity};

/// Message transport trait
///
/// Implementations must be safe to call from many dispatch tasks at once;
/// per-identity concurrency is limited upstream by the dispatch engine.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport: Sync {
    /// Liveness/credential check for one identity.
    ///
    /// # Errors
    /// Returns `Verification` when the identity is unreachable or rejected.
    /// Called at most once per identity per run (the pool caches the result).
    async fn verify(&self, identity: &SmtpIdentity) -> Result<(), ContractError>;

    /// Send one fully-assembled message through the given identity.
    ///
    /// # Errors
    /// Returns `Transport` with a transient or permanent kind; the dispatch
    /// engine retries transient failures.
    async fn send(
        &self,
        message: &OutboundMessage,
        identity: &SmtpIdentity,
    ) -> Result<(), ContractError>;
}
