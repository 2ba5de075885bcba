//! Run lifecycle control
//!
//! Thin boundary over the engine: starts a run in the background, exposes
//! live stats, and forwards cooperative stop requests. Exactly one run may
//! be active at a time.

use std::sync::{Arc, Mutex};

use contracts::{CampaignConfig, Recipient, RenderBackend, RunStats, SmtpIdentity, Transport, ValidationSummary};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::engine::DispatchEngine;
use crate::error::DispatchError;

type RunHandle = JoinHandle<Result<RunStats, DispatchError>>;

/// Run controller
pub struct RunController<T: Transport, B: RenderBackend> {
    engine: Arc<DispatchEngine<T, B>>,
    active: Mutex<Option<RunHandle>>,
}

impl<T, B> RunController<T, B>
where
    T: Transport + Send + Sync + 'static,
    B: RenderBackend + Send + Sync + 'static,
{
    pub fn new(engine: DispatchEngine<T, B>) -> Self {
        Self {
            engine: Arc::new(engine),
            active: Mutex::new(None),
        }
    }

    /// Start a run in the background.
    ///
    /// # Errors
    /// `AlreadyRunning` while a previous run is still live.
    pub fn start(
        &self,
        identities: Vec<Arc<SmtpIdentity>>,
        recipients: Vec<Recipient>,
        config: CampaignConfig,
    ) -> Result<(), DispatchError> {
        let mut active = self.active.lock().unwrap();
        if let Some(handle) = active.as_ref() {
            if !handle.is_finished() {
                return Err(DispatchError::AlreadyRunning);
            }
        }

        info!(items = recipients.len(), "starting dispatch run");
        let engine = Arc::clone(&self.engine);
        *active = Some(tokio::spawn(async move {
            engine.run(&identities, recipients, &config).await
        }));
        Ok(())
    }

    /// Request cooperative stop: in-flight items drain, nothing new starts.
    ///
    /// # Errors
    /// `NoRunActive` when no run is live.
    pub fn stop(&self) -> Result<(), DispatchError> {
        let active = self.active.lock().unwrap();
        let running = matches!(active.as_ref(), Some(handle) if !handle.is_finished());
        if !running {
            return Err(DispatchError::NoRunActive);
        }

        info!("stop requested");
        self.engine.telemetry().request_stop();
        Ok(())
    }

    /// Current stats snapshot.
    pub fn status(&self) -> RunStats {
        self.engine.telemetry().snapshot()
    }

    /// Live stats broadcast.
    pub fn subscribe(&self) -> watch::Receiver<RunStats> {
        self.engine.telemetry().subscribe()
    }

    /// One-shot identity-validation-complete event for the current run.
    pub fn validation_events(&self) -> watch::Receiver<Option<ValidationSummary>> {
        self.engine.telemetry().validation_events()
    }

    /// Wait for the active run to finish and return its final stats.
    ///
    /// # Errors
    /// `NoRunActive` when nothing was started; `RunTaskFailed` if the run
    /// task panicked or was aborted.
    pub async fn wait(&self) -> Result<RunStats, DispatchError> {
        let handle = self
            .active
            .lock()
            .unwrap()
            .take()
            .ok_or(DispatchError::NoRunActive)?;
        handle
            .await
            .map_err(|e| DispatchError::RunTaskFailed(e.to_string()))?
    }
}
