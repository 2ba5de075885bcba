//! Dispatch orchestrator - wires transport, render pool, and engine.
//!
//! Supports both real SMTP and mock modes via feature flags.
//! When the `real-smtp` feature is disabled, sends are simulated.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{CampaignConfig, Recipient, RenderBackend, SmtpIdentity, Transport};
use dispatch::{DispatchEngine, RunController};
use observability::RunTelemetry;
use render_pool::{RenderPool, RenderPoolConfig};
use tracing::{info, warn};
use transport::TransportPool;

use super::RunReport;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The campaign to dispatch
    pub campaign: CampaignConfig,

    /// Sending identities
    pub identities: Vec<Arc<SmtpIdentity>>,

    /// Recipient items
    pub recipients: Vec<Recipient>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main dispatch orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the dispatch to completion
    pub async fn run(self) -> Result<RunReport> {
        #[cfg(feature = "real-smtp")]
        return self.run_real().await;

        #[cfg(not(feature = "real-smtp"))]
        return self.run_mock().await;
    }

    /// Run with the lettre-backed SMTP client and wkhtmltox rendering
    #[cfg(feature = "real-smtp")]
    async fn run_real(self) -> Result<RunReport> {
        use render_pool::CommandBackend;
        use transport::SmtpTransport;

        self.execute(SmtpTransport::new(), CommandBackend::new())
            .await
    }

    /// Run with mock transport and rendering
    #[cfg(not(feature = "real-smtp"))]
    async fn run_mock(self) -> Result<RunReport> {
        use render_pool::MockBackend;
        use transport::MockTransport;

        warn!("real-smtp feature disabled - sends are simulated");
        self.execute(MockTransport::new(), MockBackend::new())
            .await
    }

    async fn execute<T, B>(self, transport: T, backend: B) -> Result<RunReport>
    where
        T: Transport + Send + Sync + 'static,
        B: RenderBackend + Send + Sync + 'static,
    {
        let start_time = Instant::now();
        let PipelineConfig {
            campaign,
            identities,
            recipients,
            metrics_port,
        } = self.config;

        // Initialize Metrics (optional)
        if let Some(port) = metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Bring up the render pool only when the campaign needs it; the
        // startup probe fails fast on a missing converter binary.
        let render = if campaign.message.attachment.is_none() {
            None
        } else {
            info!("Starting render worker pool...");
            let pool = RenderPool::start(
                backend,
                RenderPoolConfig {
                    workers: campaign.render.workers as usize,
                    task_timeout: Duration::from_secs(campaign.render.task_timeout_secs),
                    queue_capacity: campaign.render.queue_capacity as usize,
                },
            )
            .await
            .context("Failed to start render pool")?;
            Some(pool)
        };

        let telemetry = Arc::new(RunTelemetry::new());
        let engine = DispatchEngine::new(
            TransportPool::new(transport),
            render.clone(),
            Arc::clone(&telemetry),
        );
        let controller = Arc::new(RunController::new(engine));

        // Graceful shutdown: the first signal requests cooperative stop so
        // in-flight items drain before the report is printed.
        let signal_controller = Arc::clone(&controller);
        let signal_watcher = tokio::spawn(async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, draining in-flight items...");
            let _ = signal_controller.stop();
        });

        controller
            .start(identities, recipients, campaign)
            .context("Failed to start dispatch run")?;
        let result = controller.wait().await;

        signal_watcher.abort();
        if let Some(render) = render {
            render.shutdown();
        }

        let stats = result.context("Dispatch run failed")?;
        Ok(RunReport {
            stats,
            duration: start_time.elapsed(),
        })
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
