//! Mock rendering backend
//!
//! Scriptable in-process backend for pool and dispatch tests: configurable
//! delay, documents that hang forever, documents that fail, and a failing
//! probe. Completed renders are observable in completion order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, RenderBackend, RenderRequest};

#[derive(Default)]
struct MockState {
    rendered: Mutex<Vec<String>>,
    probe_calls: AtomicU64,
}

/// Shared view into what the backend has done, cheap to clone.
#[derive(Clone)]
pub struct MockObserver {
    state: Arc<MockState>,
}

impl MockObserver {
    /// Documents rendered to completion, in completion order.
    pub fn rendered(&self) -> Vec<String> {
        self.state.rendered.lock().unwrap().clone()
    }

    pub fn probe_calls(&self) -> u64 {
        self.state.probe_calls.load(Ordering::Relaxed)
    }
}

/// Mock rendering backend
pub struct MockBackend {
    state: Arc<MockState>,
    delay: Option<Duration>,
    probe_error: Option<String>,
    hang_on: Option<String>,
    crash_on: Option<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            delay: None,
            probe_error: None,
            hang_on: None,
            crash_on: None,
        }
    }

    /// Every render takes at least this long.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `probe` fails with this message.
    pub fn with_failing_probe(mut self, message: impl Into<String>) -> Self {
        self.probe_error = Some(message.into());
        self
    }

    /// Renders of this exact document never complete.
    pub fn with_hang_on(mut self, html: impl Into<String>) -> Self {
        self.hang_on = Some(html.into());
        self
    }

    /// Renders of this exact document fail like a dead process.
    pub fn with_crash_on(mut self, html: impl Into<String>) -> Self {
        self.crash_on = Some(html.into());
        self
    }

    pub fn observer(&self) -> MockObserver {
        MockObserver {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for MockBackend {
    async fn probe(&self) -> Result<(), ContractError> {
        self.state.probe_calls.fetch_add(1, Ordering::Relaxed);
        match &self.probe_error {
            Some(message) => Err(ContractError::render_backend(message.clone())),
            None => Ok(()),
        }
    }

    async fn render(&self, request: &RenderRequest) -> Result<Bytes, ContractError> {
        if self.hang_on.as_deref() == Some(request.html.as_str()) {
            std::future::pending::<()>().await;
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.crash_on.as_deref() == Some(request.html.as_str()) {
            return Err(ContractError::render_backend(
                "process exited with code 1",
            ));
        }

        self.state
            .rendered
            .lock()
            .unwrap()
            .push(request.html.clone());
        Ok(Bytes::from(format!(
            "{}:{}",
            request.format.content_type(),
            request.html
        )))
    }
}
