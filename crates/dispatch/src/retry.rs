//! Send retry policy
//!
//! Transient transport failures are retried a bounded number of times with
//! a fixed backoff; permanent failures and retry exhaustion surface to the
//! caller for terminal accounting. Only the transport error taxonomy
//! decides retriability.

use std::time::Duration;

use contracts::{ContractError, OutboundMessage, Transport};
use observability::metrics::record_retry_attempt;
use tracing::warn;
use transport::{PooledTransport, TransportPool};

/// Retry knobs for one run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Fixed pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Send one message, retrying transient failures per the policy.
///
/// # Errors
/// The last transport error once retries are exhausted, or the first
/// non-transient error immediately.
pub async fn send_with_retry<T: Transport>(
    pool: &TransportPool<T>,
    entry: &PooledTransport,
    message: &OutboundMessage,
    policy: &RetryPolicy,
) -> Result<(), ContractError> {
    let mut attempt = 0u32;
    loop {
        match pool.send(entry, message).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                record_retry_attempt(&entry.identity().host);
                warn!(
                    recipient = %message.to_address,
                    attempt,
                    max = policy.max_retries,
                    error = %err,
                    "transient send failure, retrying"
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AttachmentSpec, MessageTemplate, Recipient, SmtpIdentity};
    use std::sync::Arc;
    use transport::{MockTransport, ScriptedFailure};

    fn setup(
        transport: MockTransport,
    ) -> (TransportPool<MockTransport>, Arc<PooledTransport>, OutboundMessage) {
        let identity = Arc::new(SmtpIdentity::new("mx.example.com", "ops@example.com", "pw"));
        let template = MessageTemplate {
            subject: "s".to_string(),
            sender_name: "n".to_string(),
            plain_body: Some("b".to_string()),
            html_body: None,
            attachment: AttachmentSpec::None,
        };
        let message =
            OutboundMessage::assemble(&template, &Recipient::new("jo@example.com"), &identity);
        let pool = TransportPool::new(transport);
        let entry = pool.get(&identity);
        (pool, entry, message)
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(200),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_transient_failures_then_success() {
        let transport = MockTransport::new();
        let counters = transport.counters();
        transport.script_send_failures(
            "jo@example.com",
            vec![
                ScriptedFailure::Transient("connection closed".to_string()),
                ScriptedFailure::Transient("ECONNRESET".to_string()),
            ],
        );

        let (pool, entry, message) = setup(transport);
        pool.verify(&entry).await.unwrap();

        send_with_retry(&pool, &entry, &message, &policy())
            .await
            .unwrap();
        assert_eq!(counters.sent_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_transient_failures_exhaust_retries() {
        let transport = MockTransport::new();
        let counters = transport.counters();
        transport.script_send_failures(
            "jo@example.com",
            vec![
                ScriptedFailure::Transient("connection closed".to_string()),
                ScriptedFailure::Transient("connection lost".to_string()),
                ScriptedFailure::Transient("ETIMEDOUT".to_string()),
            ],
        );

        let (pool, entry, message) = setup(transport);
        pool.verify(&entry).await.unwrap();

        let err = send_with_retry(&pool, &entry, &message, &policy())
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(counters.sent_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let transport = MockTransport::new();
        transport.script_send_failures(
            "jo@example.com",
            vec![
                ScriptedFailure::Permanent("550 mailbox unavailable".to_string()),
                // would succeed on retry; must never be reached
            ],
        );

        let (pool, entry, message) = setup(transport);
        pool.verify(&entry).await.unwrap();

        let started = tokio::time::Instant::now();
        let err = send_with_retry(&pool, &entry, &message, &policy())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        // failed without sleeping through any backoff
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
