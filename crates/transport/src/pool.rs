//! Transport resource pool
//!
//! Caches one [`PooledTransport`] per identity pool key. Creation is
//! side-effect-free; no network I/O happens until [`TransportPool::verify`]
//! runs, and that check runs at most once per identity per run. A failed
//! check is sticky: the identity stays invalid for the rest of the run.
//!
//! Rationale: validating N identities eagerly serializes startup latency;
//! lazy-once verification amortizes the cost across the run while still
//! failing fast on an identity's first real use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use contracts::{ContractError, OutboundMessage, SmtpIdentity, Transport};
use metrics::gauge;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Cached state for one identity.
///
/// Owned exclusively by the pool; dispatch tasks hold an `Arc` borrow and
/// never tear the handle down themselves.
pub struct PooledTransport {
    identity: Arc<SmtpIdentity>,
    // Verification result, computed at most once. Concurrent verifiers
    // coalesce on the cell; the stored error string keeps failure sticky.
    verify_result: OnceCell<Result<(), String>>,
    messages_sent: AtomicU64,
}

impl PooledTransport {
    fn new(identity: Arc<SmtpIdentity>) -> Self {
        Self {
            identity,
            verify_result: OnceCell::new(),
            messages_sent: AtomicU64::new(0),
        }
    }

    pub fn identity(&self) -> &Arc<SmtpIdentity> {
        &self.identity
    }

    /// Whether verification has run and succeeded.
    pub fn is_verified(&self) -> bool {
        matches!(self.verify_result.get(), Some(Ok(())))
    }

    /// Messages sent through this handle so far.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }
}

/// Resource pool: one transport handle per destination identity.
pub struct TransportPool<T: Transport> {
    transport: Arc<T>,
    entries: Mutex<HashMap<String, Arc<PooledTransport>>>,
}

impl<T: Transport> TransportPool<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get the cached entry for the identity's key, creating it (without
    /// verifying) if absent. Concurrent callers for one key observe the
    /// same instance.
    pub fn get(&self, identity: &Arc<SmtpIdentity>) -> Arc<PooledTransport> {
        let key = identity.pool_key();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            debug!(key = %key, "creating pooled transport");
            Arc::new(PooledTransport::new(Arc::clone(identity)))
        });
        let entry = Arc::clone(entry);
        gauge!("mailflow_transport_pool_size").set(entries.len() as f64);
        entry
    }

    /// One-time liveness/credential check for the entry. Idempotent: an
    /// already-verified entry returns immediately, an already-failed entry
    /// returns its sticky failure without repeating the check.
    pub async fn verify(&self, entry: &PooledTransport) -> Result<(), ContractError> {
        let identity = Arc::clone(&entry.identity);
        let transport = Arc::clone(&self.transport);

        let result = entry
            .verify_result
            .get_or_init(|| async move {
                info!(host = %identity.host, username = %identity.username, "verifying transport");
                transport
                    .verify(&identity)
                    .await
                    .map_err(|e| e.to_string())
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(message) => Err(ContractError::verification(
                &entry.identity.host,
                message.clone(),
            )),
        }
    }

    /// Send one message through the entry's identity.
    ///
    /// The entry must have verified successfully; unverified sends are a
    /// caller bug and fail as permanent.
    pub async fn send(
        &self,
        entry: &PooledTransport,
        message: &OutboundMessage,
    ) -> Result<(), ContractError> {
        if !entry.is_verified() {
            return Err(ContractError::transport_permanent(format!(
                "identity {} used before verification",
                entry.identity.pool_key()
            )));
        }

        self.transport.send(message, &entry.identity).await?;

        let sent = entry.messages_sent.fetch_add(1, Ordering::Relaxed) + 1;
        let ceiling = u64::from(entry.identity.limits.max_messages)
            * u64::from(entry.identity.limits.max_connections);
        if ceiling > 0 && sent % ceiling == 0 {
            // The underlying client recycles connections; this is visibility only.
            warn!(
                key = %entry.identity.pool_key(),
                sent,
                "pooled transport passed its message ceiling"
            );
        }

        Ok(())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn identity(host: &str, user: &str) -> Arc<SmtpIdentity> {
        Arc::new(SmtpIdentity::new(host, user, "pw"))
    }

    #[tokio::test]
    async fn test_get_dedupes_by_key() {
        let pool = TransportPool::new(MockTransport::new());
        let id = identity("mx.example.com", "a@example.com");

        let first = pool.get(&id);
        let second = pool.get(&id);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_get_concurrent_same_key() {
        let pool = Arc::new(TransportPool::new(MockTransport::new()));
        let id = identity("mx.example.com", "a@example.com");

        let a = {
            let pool = Arc::clone(&pool);
            let id = Arc::clone(&id);
            tokio::spawn(async move { pool.get(&id) })
        };
        let b = {
            let pool = Arc::clone(&pool);
            let id = Arc::clone(&id);
            tokio::spawn(async move { pool.get(&id) })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_verify_runs_once_when_concurrent() {
        let transport = MockTransport::new();
        let counters = transport.counters();
        let pool = Arc::new(TransportPool::new(transport));
        let id = identity("mx.example.com", "a@example.com");
        let entry = pool.get(&id);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            let entry = Arc::clone(&entry);
            handles.push(tokio::spawn(async move { pool.verify(&entry).await }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }

        assert_eq!(counters.verify_calls("mx.example.com:587:a@example.com"), 1);
        assert!(entry.is_verified());
    }

    #[tokio::test]
    async fn test_verify_failure_is_sticky() {
        let transport = MockTransport::new();
        transport.fail_verify_host("bad.example.com");
        let counters = transport.counters();
        let pool = TransportPool::new(transport);
        let id = identity("bad.example.com", "a@example.com");
        let entry = pool.get(&id);

        assert!(pool.verify(&entry).await.is_err());
        assert!(pool.verify(&entry).await.is_err());
        // The underlying check ran exactly once; the failure was cached.
        assert_eq!(counters.verify_calls("bad.example.com:587:a@example.com"), 1);
        assert!(!entry.is_verified());
    }

    #[tokio::test]
    async fn test_send_before_verify_rejected() {
        let pool = TransportPool::new(MockTransport::new());
        let id = identity("mx.example.com", "a@example.com");
        let entry = pool.get(&id);

        let template = contracts::MessageTemplate {
            subject: "s".to_string(),
            sender_name: "n".to_string(),
            plain_body: Some("b".to_string()),
            html_body: None,
            attachment: contracts::AttachmentSpec::None,
        };
        let message = OutboundMessage::assemble(
            &template,
            &contracts::Recipient::new("jo@example.com"),
            &id,
        );

        let err = pool.send(&entry, &message).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
