//! Mock transport client
//!
//! Test implementation with injectable failure scenarios: per-host verify
//! failures and per-recipient scripted send failures.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{ContractError, OutboundMessage, SmtpIdentity, Transport};
use tracing::debug;

/// One scripted send failure, consumed in order per recipient.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    Transient(String),
    Permanent(String),
}

impl ScriptedFailure {
    fn into_error(self) -> ContractError {
        match self {
            Self::Transient(m) => ContractError::transport_transient(m),
            Self::Permanent(m) => ContractError::transport_permanent(m),
        }
    }
}

/// Record of one successful mock send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub recipient: String,
    pub identity_key: String,
    pub has_attachment: bool,
}

#[derive(Default)]
struct MockState {
    fail_verify_hosts: HashSet<String>,
    verify_calls: HashMap<String, u32>,
    send_scripts: HashMap<String, VecDeque<ScriptedFailure>>,
    sent: Vec<SentRecord>,
}

/// Shared counters handle, usable after the transport moves into a pool.
#[derive(Clone)]
pub struct MockCounters {
    state: Arc<Mutex<MockState>>,
}

impl MockCounters {
    /// Verify invocations recorded for one pool key.
    pub fn verify_calls(&self, key: &str) -> u32 {
        *self
            .state
            .lock()
            .unwrap()
            .verify_calls
            .get(key)
            .unwrap_or(&0)
    }

    /// All successful sends, in completion order.
    pub fn sent(&self) -> Vec<SentRecord> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }
}

/// Mock transport client
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    /// Artificial latency per send, to exercise concurrency limits
    send_delay: Option<Duration>,
    /// Artificial latency per verify
    verify_delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            send_delay: None,
            verify_delay: None,
        }
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn with_verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = Some(delay);
        self
    }

    /// Make verification fail for every identity on `host`.
    pub fn fail_verify_host(&self, host: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_verify_hosts
            .insert(host.to_string());
    }

    /// Queue failures for a recipient; once the queue drains, sends succeed.
    pub fn script_send_failures(&self, recipient: &str, failures: Vec<ScriptedFailure>) {
        self.state
            .lock()
            .unwrap()
            .send_scripts
            .insert(recipient.to_string(), failures.into());
    }

    /// Handle for inspecting calls after the transport is moved.
    pub fn counters(&self) -> MockCounters {
        MockCounters {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    async fn verify(&self, identity: &SmtpIdentity) -> Result<(), ContractError> {
        if let Some(delay) = self.verify_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        *state
            .verify_calls
            .entry(identity.pool_key())
            .or_insert(0) += 1;

        if state.fail_verify_hosts.contains(&identity.host) {
            return Err(ContractError::verification(
                &identity.host,
                "mock verification refused",
            ));
        }
        Ok(())
    }

    async fn send(
        &self,
        message: &OutboundMessage,
        identity: &SmtpIdentity,
    ) -> Result<(), ContractError> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(script) = state.send_scripts.get_mut(&message.to_address) {
            if let Some(failure) = script.pop_front() {
                debug!(recipient = %message.to_address, "mock send failing per script");
                return Err(failure.into_error());
            }
        }

        state.sent.push(SentRecord {
            recipient: message.to_address.clone(),
            identity_key: identity.pool_key(),
            has_attachment: message.attachment.is_some(),
        });
        Ok(())
    }
}
