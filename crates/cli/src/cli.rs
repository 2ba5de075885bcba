//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Mailflow - batch mail dispatch engine
#[derive(Parser, Debug)]
#[command(
    name = "mailflow",
    author,
    version,
    about = "Batch mail dispatch engine",
    long_about = "A batch mail dispatch engine with per-identity concurrency limits.\n\n\
                  Loads a campaign configuration and recipient list, validates the \n\
                  sending identities, renders optional attachments through a worker \n\
                  pool, and dispatches with retry and live telemetry."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MAILFLOW_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "MAILFLOW_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a dispatch campaign
    Run(RunArgs),

    /// Validate configuration files without sending anything
    Validate(ValidateArgs),

    /// Display campaign configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to campaign configuration file (TOML or JSON)
    #[arg(short, long, default_value = "campaign.toml", env = "MAILFLOW_CONFIG")]
    pub config: PathBuf,

    /// Path to the recipient list (CSV with an `email` column)
    #[arg(
        short,
        long,
        default_value = "recipients.csv",
        env = "MAILFLOW_RECIPIENTS"
    )]
    pub recipients: PathBuf,

    /// Path to the identity file (TOML or JSON with an `identities` list)
    #[arg(
        short,
        long,
        default_value = "identities.toml",
        env = "MAILFLOW_IDENTITIES"
    )]
    pub identities: PathBuf,

    /// Override total concurrent-send budget from configuration
    #[arg(long, env = "MAILFLOW_CONCURRENCY")]
    pub concurrency: Option<u32>,

    /// Override inter-item pacing delay in milliseconds
    #[arg(long, env = "MAILFLOW_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Override render worker count (0 = derive from CPU count)
    #[arg(long, env = "MAILFLOW_WORKERS")]
    pub workers: Option<u32>,

    /// Validate inputs and exit without dispatching
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "MAILFLOW_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to campaign configuration file to validate
    #[arg(short, long, default_value = "campaign.toml")]
    pub config: PathBuf,

    /// Also check an identity file
    #[arg(short, long)]
    pub identities: Option<PathBuf>,

    /// Also check a recipient list
    #[arg(short, long)]
    pub recipients: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to campaign configuration file
    #[arg(short, long, default_value = "campaign.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show delivery and retry settings
    #[arg(long)]
    pub delivery: bool,

    /// Show render pool settings
    #[arg(long)]
    pub render: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
