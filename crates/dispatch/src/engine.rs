//! Batch dispatch engine
//!
//! Drives one run through four phases: sequential identity validation,
//! ceiling-based partitioning, concurrent per-partition dispatch, and
//! completion. Every item ends in exactly one terminal state; stopped runs
//! account unstarted items as terminal failures so the settled-items
//! invariant holds regardless of where the stop landed.

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    now_millis, Attachment, AttachmentSpec, CampaignConfig, ContractError, IdentityFailure,
    MessageTemplate, OutboundMessage, Recipient, RenderBackend, RenderRequest, RunStats,
    SendFailure, SmtpIdentity, Transport, ValidationSummary,
};
use observability::metrics::{record_identity_validation, record_send_outcome};
use observability::RunTelemetry;
use render_pool::RenderPool;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use transport::{PooledTransport, TransportPool};

use crate::error::DispatchError;
use crate::gate::Gate;
use crate::partition::{partition, per_identity_budget, Partition};
use crate::retry::{send_with_retry, RetryPolicy};

const STOPPED_REASON: &str = "run stopped before item started";
const NO_IDENTITIES_REASON: &str = "no valid identities";

/// Per-run state shared by every dispatch task.
struct RunContext<T: Transport, B: RenderBackend> {
    transport_pool: Arc<TransportPool<T>>,
    render: Option<RenderPool<B>>,
    render_gate: Gate,
    telemetry: Arc<RunTelemetry>,
    template: MessageTemplate,
    retry: RetryPolicy,
    inter_item_delay: Duration,
}

/// Batch dispatch engine
///
/// Owns the transport pool and (optionally) a render pool; one engine
/// drives at most one run at a time.
pub struct DispatchEngine<T: Transport, B: RenderBackend> {
    transport_pool: Arc<TransportPool<T>>,
    render: Option<RenderPool<B>>,
    render_gate: Gate,
    telemetry: Arc<RunTelemetry>,
}

impl<T, B> DispatchEngine<T, B>
where
    T: Transport + Send + Sync + 'static,
    B: RenderBackend + Send + Sync + 'static,
{
    pub fn new(
        transport_pool: TransportPool<T>,
        render: Option<RenderPool<B>>,
        telemetry: Arc<RunTelemetry>,
    ) -> Self {
        Self {
            transport_pool: Arc::new(transport_pool),
            render,
            render_gate: Gate::new(1),
            telemetry,
        }
    }

    pub fn telemetry(&self) -> &Arc<RunTelemetry> {
        &self.telemetry
    }

    /// Execute one full run to completion.
    ///
    /// Per-item failures are accounted in telemetry, never raised here.
    ///
    /// # Errors
    /// `NoValidIdentities` when every identity fails validation; all items
    /// are still given a terminal failure record first.
    pub async fn run(
        &self,
        identities: &[Arc<SmtpIdentity>],
        recipients: Vec<Recipient>,
        config: &CampaignConfig,
    ) -> Result<RunStats, DispatchError> {
        self.telemetry.reset(recipients.len() as u64);
        info!(
            identities = identities.len(),
            items = recipients.len(),
            concurrency = config.delivery.concurrency,
            "dispatch run starting"
        );

        // Phase 1: sequential validation, to bound load on unverified hosts.
        let valid = match self.validate_identities(identities, &recipients).await {
            Some(valid) => valid,
            // stop requested mid-validation
            None => return Ok(self.telemetry.snapshot()),
        };

        if valid.is_empty() {
            warn!("no identities passed validation, run aborted");
            self.telemetry.items_not_attempted(
                recipients.into_iter().map(|r| r.address),
                NO_IDENTITIES_REASON,
            );
            self.telemetry.finish();
            return Err(DispatchError::NoValidIdentities);
        }

        // Phase 2: ceiling split, one partition per validated identity.
        let partitions = partition(&recipients, &valid);
        let budget = per_identity_budget(config.delivery.concurrency, valid.len());
        self.render_gate.set_limit(config.render.concurrency as usize);

        let ctx = Arc::new(RunContext {
            transport_pool: Arc::clone(&self.transport_pool),
            render: self.render.clone(),
            render_gate: self.render_gate.clone(),
            telemetry: Arc::clone(&self.telemetry),
            template: config.message.clone(),
            retry: RetryPolicy {
                max_retries: config.delivery.retry_max,
                backoff: Duration::from_millis(config.delivery.retry_backoff_ms),
            },
            inter_item_delay: Duration::from_millis(config.delivery.inter_item_delay_ms),
        });

        // Phase 3: partitions run fully in parallel; concurrency inside
        // each one is capped by its own gate.
        let mut tasks = JoinSet::new();
        for part in partitions {
            let ctx = Arc::clone(&ctx);
            let gate = Gate::new(budget);
            tasks.spawn(dispatch_partition(ctx, part, gate));
        }
        while tasks.join_next().await.is_some() {}

        // Phase 4
        self.telemetry.finish();
        let stats = self.telemetry.snapshot();
        if self.telemetry.stop_requested() {
            info!(
                succeeded = stats.items_succeeded,
                failed = stats.items_failed,
                "dispatch run stopped before completion"
            );
        } else {
            info!(
                succeeded = stats.items_succeeded,
                failed = stats.items_failed,
                "dispatch run complete"
            );
        }
        Ok(stats)
    }

    /// Validate identities in input order. Returns `None` when a stop
    /// request aborted validation (items are accounted before returning).
    async fn validate_identities(
        &self,
        identities: &[Arc<SmtpIdentity>],
        recipients: &[Recipient],
    ) -> Option<Vec<Arc<SmtpIdentity>>> {
        let mut valid = Vec::new();
        let mut summary = ValidationSummary::default();

        for identity in identities {
            if self.telemetry.stop_requested() {
                info!("stop requested during identity validation, aborting run");
                self.telemetry.validation_complete(summary);
                self.telemetry.items_not_attempted(
                    recipients.iter().map(|r| r.address.clone()),
                    STOPPED_REASON,
                );
                self.telemetry.finish();
                return None;
            }

            match self.validate_identity(identity).await {
                Ok(()) => {
                    debug!(host = %identity.host, username = %identity.username, "identity validated");
                    record_identity_validation(&identity.host, true);
                    summary.valid_count += 1;
                    self.telemetry.identity_validated();
                    valid.push(Arc::clone(identity));
                }
                Err(err) => {
                    warn!(host = %identity.host, username = %identity.username, error = %err, "identity failed validation");
                    record_identity_validation(&identity.host, false);
                    let failure = IdentityFailure {
                        username: identity.username.clone(),
                        host: identity.host.clone(),
                        error: err.to_string(),
                        timestamp_ms: now_millis(),
                    };
                    summary.invalid_count += 1;
                    summary.failures.push(failure.clone());
                    self.telemetry.identity_failed(failure);
                }
            }
        }

        self.telemetry.validation_complete(summary);
        Some(valid)
    }

    /// Incomplete identities fail before any network I/O; complete ones go
    /// through the pool's lazy-once verification.
    async fn validate_identity(&self, identity: &Arc<SmtpIdentity>) -> Result<(), ContractError> {
        identity.check_complete()?;
        let entry = self.transport_pool.get(identity);
        self.transport_pool.verify(&entry).await
    }
}

async fn dispatch_partition<T, B>(ctx: Arc<RunContext<T, B>>, part: Partition, gate: Gate)
where
    T: Transport + Send + Sync + 'static,
    B: RenderBackend + Send + Sync + 'static,
{
    let Partition {
        identity,
        recipients,
    } = part;

    if ctx.telemetry.stop_requested() {
        ctx.telemetry
            .items_not_attempted(recipients.into_iter().map(|r| r.address), STOPPED_REASON);
        return;
    }

    info!(
        identity = %identity.username,
        items = recipients.len(),
        limit = gate.limit(),
        "partition dispatch started"
    );
    let entry = ctx.transport_pool.get(&identity);

    let mut items = JoinSet::new();
    let mut remaining = recipients.into_iter();
    let mut index = 0usize;
    while let Some(recipient) = remaining.next() {
        // stop check at the per-item boundary: in-flight items drain,
        // nothing new starts
        if ctx.telemetry.stop_requested() {
            let skipped: Vec<String> = std::iter::once(recipient.address)
                .chain(remaining.map(|r| r.address))
                .collect();
            ctx.telemetry.items_not_attempted(skipped, STOPPED_REASON);
            break;
        }

        // pacing happens before gate acquisition so it never holds a slot
        if index > 0 && !ctx.inter_item_delay.is_zero() {
            tokio::time::sleep(ctx.inter_item_delay).await;
        }

        let permit = gate.acquire().await;
        let ctx = Arc::clone(&ctx);
        let identity = Arc::clone(&identity);
        let entry = Arc::clone(&entry);
        items.spawn(async move {
            let _permit = permit;
            process_item(ctx, identity, entry, recipient).await;
        });
        index += 1;
    }

    while items.join_next().await.is_some() {}
}

/// Drive one item to its terminal state and record it exactly once.
async fn process_item<T, B>(
    ctx: Arc<RunContext<T, B>>,
    identity: Arc<SmtpIdentity>,
    entry: Arc<PooledTransport>,
    recipient: Recipient,
) where
    T: Transport + Send + Sync + 'static,
    B: RenderBackend + Send + Sync + 'static,
{
    let address = recipient.address.clone();
    match deliver_item(&ctx, &identity, &entry, &recipient).await {
        Ok(()) => {
            debug!(recipient = %address, identity = %identity.username, "item delivered");
            record_send_outcome(&identity.host, true);
            ctx.telemetry.item_succeeded();
        }
        Err(err) => {
            warn!(recipient = %address, error = %err, "item failed terminally");
            record_send_outcome(&identity.host, false);
            ctx.telemetry.item_failed(SendFailure {
                recipient: address,
                identity_username: identity.username.clone(),
                identity_host: identity.host.clone(),
                error: err.to_string(),
                timestamp_ms: now_millis(),
            });
        }
    }
}

/// Render (when requested), assemble, send with retries.
///
/// Rendering concurrency is capped by its own gate: the render budget is
/// process-bound while the send budget is network-bound, so they never
/// share slots.
async fn deliver_item<T, B>(
    ctx: &RunContext<T, B>,
    identity: &Arc<SmtpIdentity>,
    entry: &PooledTransport,
    recipient: &Recipient,
) -> Result<(), ContractError>
where
    T: Transport + Send + Sync + 'static,
    B: RenderBackend + Send + Sync + 'static,
{
    let mut message = OutboundMessage::assemble(&ctx.template, recipient, identity);

    if let AttachmentSpec::Render { format, html, .. } = &ctx.template.attachment {
        let render = ctx.render.as_ref().ok_or_else(|| {
            ContractError::render_backend("template requests an attachment but no render pool is attached")
        })?;

        let content = {
            let _permit = ctx.render_gate.acquire().await;
            let handle = render.submit(RenderRequest {
                html: html.clone(),
                format: *format,
            })
            .await?;
            handle.await_result().await?
        };

        let filename = ctx
            .template
            .attachment
            .resolve_filename()
            .unwrap_or_else(|| format.default_filename().to_string());
        message = message.with_attachment(Attachment {
            filename,
            content,
            content_type: format.content_type(),
        });
    }

    send_with_retry(&ctx.transport_pool, entry, &message, &ctx.retry).await
}
