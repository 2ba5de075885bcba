//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::Recipient;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_dispatch(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading campaign configuration");

    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    // Load and parse configuration
    let mut campaign = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides. Out-of-range concurrency is clamped, not rejected.
    if let Some(concurrency) = args.concurrency {
        let clamped = concurrency.clamp(1, 100);
        if clamped != concurrency {
            warn!(
                requested = concurrency,
                effective = clamped,
                "send concurrency clamped to [1, 100]"
            );
        }
        info!(concurrency = clamped, "Overriding send concurrency from CLI");
        campaign.delivery.concurrency = clamped;
    }
    if let Some(delay_ms) = args.delay_ms {
        info!(delay_ms, "Overriding inter-item delay from CLI");
        campaign.delivery.inter_item_delay_ms = delay_ms;
    }
    if let Some(workers) = args.workers {
        info!(workers, "Overriding render worker count from CLI");
        campaign.render.workers = workers;
    }

    // Load identities and recipients
    let identities: Vec<_> = config_loader::ConfigLoader::load_identities(&args.identities)
        .with_context(|| {
            format!(
                "Failed to load identities from {}",
                args.identities.display()
            )
        })?
        .into_iter()
        .map(Arc::new)
        .collect();

    let recipients = load_recipients(args)?;

    info!(
        subject = %campaign.message.subject,
        identities = identities.len(),
        recipients = recipients.len(),
        concurrency = campaign.delivery.concurrency,
        "Campaign loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - inputs are valid, exiting");
        print_campaign_summary(&campaign, identities.len(), recipients.len());
        return Ok(());
    }

    // Build and run the pipeline
    let pipeline = Pipeline::new(PipelineConfig {
        campaign,
        identities,
        recipients,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    info!("Starting dispatch...");
    let report = pipeline.run().await.context("Dispatch run failed")?;

    report.print_summary();
    info!("Mailflow finished");
    Ok(())
}

/// Read the recipient CSV and lift rows into typed recipients. Rows without
/// a usable `email` value are skipped with a warning, not failed.
fn load_recipients(args: &RunArgs) -> Result<Vec<Recipient>> {
    let rows = ingestion::read_rows(&args.recipients).with_context(|| {
        format!(
            "Failed to read recipients from {}",
            args.recipients.display()
        )
    })?;

    let total = rows.len();
    let recipients: Vec<Recipient> = rows.iter().filter_map(Recipient::from_row).collect();
    let skipped = total - recipients.len();
    if skipped > 0 {
        warn!(skipped, "rows without an email column were skipped");
    }
    if recipients.is_empty() {
        anyhow::bail!(
            "no usable recipients in {} (missing `email` column?)",
            args.recipients.display()
        );
    }

    Ok(recipients)
}

/// Print campaign summary for dry-run mode
fn print_campaign_summary(
    campaign: &contracts::CampaignConfig,
    identity_count: usize,
    recipient_count: usize,
) {
    println!("\n=== Campaign Summary ===\n");
    println!("Message:");
    println!("  Subject: {}", campaign.message.subject);
    println!("  Sender: {}", campaign.message.sender_name);
    println!(
        "  Attachment: {}",
        campaign
            .message
            .attachment
            .resolve_filename()
            .unwrap_or_else(|| "none".to_string())
    );
    println!("\nDelivery:");
    println!("  Identities: {identity_count}");
    println!("  Recipients: {recipient_count}");
    println!("  Concurrency: {}", campaign.delivery.concurrency);
    println!(
        "  Pacing delay: {} ms",
        campaign.delivery.inter_item_delay_ms
    );
    println!(
        "  Retries: {} (backoff {} ms)",
        campaign.delivery.retry_max, campaign.delivery.retry_backoff_ms
    );

    if !campaign.message.attachment.is_none() {
        println!("\nRender pool:");
        let workers = if campaign.render.workers == 0 {
            "auto".to_string()
        } else {
            campaign.render.workers.to_string()
        };
        println!("  Workers: {workers}");
        println!("  Task timeout: {} s", campaign.render.task_timeout_secs);
        println!("  Render concurrency: {}", campaign.render.concurrency);
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_with_recipients(path: std::path::PathBuf) -> RunArgs {
        RunArgs {
            config: "campaign.toml".into(),
            recipients: path,
            identities: "identities.toml".into(),
            concurrency: None,
            delay_ms: None,
            workers: None,
            dry_run: false,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_load_recipients_skips_rows_without_email() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "email,name").unwrap();
        writeln!(file, "a@example.com,Ann").unwrap();
        writeln!(file, ",NoAddress").unwrap();
        writeln!(file, "b@example.com,").unwrap();
        file.flush().unwrap();

        let recipients = load_recipients(&args_with_recipients(file.path().to_path_buf())).unwrap();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].address, "a@example.com");
        assert_eq!(recipients[1].display_name(), "b");
    }

    #[test]
    fn test_load_recipients_fails_without_email_column() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "address,name").unwrap();
        writeln!(file, "a@example.com,Ann").unwrap();
        file.flush().unwrap();

        assert!(load_recipients(&args_with_recipients(file.path().to_path_buf())).is_err());
    }
}
