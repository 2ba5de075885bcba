//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::AttachmentSpec;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Campaign info for JSON output
#[derive(Serialize)]
struct CampaignInfo {
    message: MessageInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    delivery: Option<DeliveryInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    render: Option<RenderInfo>,
}

#[derive(Serialize)]
struct MessageInfo {
    subject: String,
    sender_name: String,
    has_plain_body: bool,
    has_html_body: bool,
    attachment: String,
}

#[derive(Serialize)]
struct DeliveryInfo {
    concurrency: u32,
    inter_item_delay_ms: u64,
    retry_max: u32,
    retry_backoff_ms: u64,
}

#[derive(Serialize)]
struct RenderInfo {
    workers: String,
    task_timeout_secs: u64,
    queue_capacity: u32,
    concurrency: u32,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading campaign info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let campaign = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_campaign_info(&campaign, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize campaign info")?;
        println!("{}", json);
    } else {
        print_campaign_info(&campaign, args);
    }

    Ok(())
}

fn build_campaign_info(campaign: &contracts::CampaignConfig, args: &InfoArgs) -> CampaignInfo {
    let delivery = args.delivery.then(|| DeliveryInfo {
        concurrency: campaign.delivery.concurrency,
        inter_item_delay_ms: campaign.delivery.inter_item_delay_ms,
        retry_max: campaign.delivery.retry_max,
        retry_backoff_ms: campaign.delivery.retry_backoff_ms,
    });

    let render = (args.render && !campaign.message.attachment.is_none()).then(|| RenderInfo {
        workers: if campaign.render.workers == 0 {
            "auto".to_string()
        } else {
            campaign.render.workers.to_string()
        },
        task_timeout_secs: campaign.render.task_timeout_secs,
        queue_capacity: campaign.render.queue_capacity,
        concurrency: campaign.render.concurrency,
    });

    CampaignInfo {
        message: MessageInfo {
            subject: campaign.message.subject.clone(),
            sender_name: campaign.message.sender_name.clone(),
            has_plain_body: campaign.message.plain_body.is_some(),
            has_html_body: campaign.message.html_body.is_some(),
            attachment: campaign
                .message
                .attachment
                .resolve_filename()
                .unwrap_or_else(|| "none".to_string()),
        },
        delivery,
        render,
    }
}

fn print_campaign_info(campaign: &contracts::CampaignConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Mailflow Campaign                           ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Message
    println!("✉  Message");
    println!("   ├─ Subject: {}", campaign.message.subject);
    println!("   ├─ Sender: {}", campaign.message.sender_name);
    let bodies = match (
        campaign.message.plain_body.is_some(),
        campaign.message.html_body.is_some(),
    ) {
        (true, true) => "plain + html",
        (true, false) => "plain",
        (false, true) => "html",
        (false, false) => "(none)",
    };
    println!("   ├─ Body parts: {}", bodies);
    match &campaign.message.attachment {
        AttachmentSpec::None => println!("   └─ Attachment: none"),
        spec @ AttachmentSpec::Render { format, .. } => {
            println!(
                "   └─ Attachment: {} ({:?})",
                spec.resolve_filename().unwrap_or_default(),
                format
            );
        }
    }

    // Delivery
    if args.delivery {
        println!("\n🚚 Delivery");
        println!("   ├─ Concurrency: {}", campaign.delivery.concurrency);
        println!(
            "   ├─ Pacing delay: {} ms",
            campaign.delivery.inter_item_delay_ms
        );
        println!("   ├─ Retries: {}", campaign.delivery.retry_max);
        println!(
            "   └─ Retry backoff: {} ms",
            campaign.delivery.retry_backoff_ms
        );
    }

    // Render pool
    if args.render && !campaign.message.attachment.is_none() {
        println!("\n🖨  Render Pool");
        if campaign.render.workers == 0 {
            println!("   ├─ Workers: auto");
        } else {
            println!("   ├─ Workers: {}", campaign.render.workers);
        }
        println!(
            "   ├─ Task timeout: {} s",
            campaign.render.task_timeout_secs
        );
        println!("   ├─ Queue capacity: {}", campaign.render.queue_capacity);
        println!("   └─ Render concurrency: {}", campaign.render.concurrency);
    }

    println!();
}
