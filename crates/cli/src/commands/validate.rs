//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::Recipient;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    subject: String,
    attachment: String,
    concurrency: u32,
    retry_max: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient_count: Option<usize>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    let campaign = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(campaign) => campaign,
        Err(e) => {
            return ValidationResult {
                valid: false,
                config_path,
                error: Some(e.to_string()),
                warnings: None,
                summary: None,
            }
        }
    };

    let mut warnings = collect_warnings(&campaign);
    let mut identity_count = None;
    let mut recipient_count = None;

    if let Some(ref path) = args.identities {
        match config_loader::ConfigLoader::load_identities(path) {
            Ok(identities) => {
                for identity in &identities {
                    if let Err(e) = identity.check_complete() {
                        warnings.push(e.to_string());
                    }
                }
                identity_count = Some(identities.len());
            }
            Err(e) => {
                return ValidationResult {
                    valid: false,
                    config_path,
                    error: Some(format!("identities: {e}")),
                    warnings: None,
                    summary: None,
                }
            }
        }
    }

    if let Some(ref path) = args.recipients {
        match ingestion::read_rows(path) {
            Ok(rows) => {
                let usable = rows.iter().filter_map(Recipient::from_row).count();
                if usable < rows.len() {
                    warnings.push(format!(
                        "{} of {} recipient rows have no usable email",
                        rows.len() - usable,
                        rows.len()
                    ));
                }
                recipient_count = Some(usable);
            }
            Err(e) => {
                return ValidationResult {
                    valid: false,
                    config_path,
                    error: Some(format!("recipients: {e}")),
                    warnings: None,
                    summary: None,
                }
            }
        }
    }

    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(ConfigSummary {
            subject: campaign.message.subject.clone(),
            attachment: campaign
                .message
                .attachment
                .resolve_filename()
                .unwrap_or_else(|| "none".to_string()),
            concurrency: campaign.delivery.concurrency,
            retry_max: campaign.delivery.retry_max,
            identity_count,
            recipient_count,
        }),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(campaign: &contracts::CampaignConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if campaign.delivery.inter_item_delay_ms == 0 {
        warnings.push("delivery.inter_item_delay_ms is 0 - items are sent without pacing".to_string());
    }

    if campaign.delivery.retry_max == 0 {
        warnings.push("delivery.retry_max is 0 - transient failures will not be retried".to_string());
    }

    if campaign.message.attachment.is_none() && campaign.render.workers != 0 {
        warnings.push(
            "render.workers is set but the message requests no attachment - render settings are ignored"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Subject: {}", summary.subject);
            println!("  Attachment: {}", summary.attachment);
            println!("  Concurrency: {}", summary.concurrency);
            println!("  Retries: {}", summary.retry_max);
            if let Some(count) = summary.identity_count {
                println!("  Identities: {}", count);
            }
            if let Some(count) = summary.recipient_count {
                println!("  Recipients: {}", count);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
