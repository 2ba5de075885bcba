//! Recipient partitioning
//!
//! Items are split as evenly as possible across validated identities in
//! original order: identity `i` receives the contiguous slice
//! `[i*k, (i+1)*k)` with `k = ceil(total / identities)`. Trailing empty
//! partitions are dropped. Partitions are disjoint and together cover every
//! item exactly once.

use std::sync::Arc;

use contracts::{Recipient, SmtpIdentity};

/// One identity plus its ordered slice of recipients; the unit of
/// batch-level parallelism.
#[derive(Debug, Clone)]
pub struct Partition {
    pub identity: Arc<SmtpIdentity>,
    pub recipients: Vec<Recipient>,
}

/// Ceiling-based split of `recipients` across `identities`.
pub fn partition(recipients: &[Recipient], identities: &[Arc<SmtpIdentity>]) -> Vec<Partition> {
    if recipients.is_empty() || identities.is_empty() {
        return Vec::new();
    }

    let chunk = recipients.len().div_ceil(identities.len());
    identities
        .iter()
        .zip(recipients.chunks(chunk))
        .map(|(identity, slice)| Partition {
            identity: Arc::clone(identity),
            recipients: slice.to_vec(),
        })
        .collect()
}

/// Per-partition concurrent-send budget: the total budget divided across
/// validated identities, floored at 1. More identities than budget therefore
/// oversubscribes the total; that is deliberate policy, never a cap on
/// identity count.
pub fn per_identity_budget(total_budget: u32, valid_identities: usize) -> usize {
    (total_budget as usize / valid_identities.max(1)).max(1)
}
