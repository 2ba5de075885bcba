//! Campaign configuration
//!
//! The declarative description of one run: message template, delivery
//! knobs, render pool sizing. Loaded by `config_loader` from TOML or JSON.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::MessageTemplate;

/// Delivery pacing and retry knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DeliveryConfig {
    /// Total concurrent-send budget, divided across validated identities
    /// (floor of 1 per identity)
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Pause between consecutive items within one partition, milliseconds
    #[serde(default)]
    pub inter_item_delay_ms: u64,

    /// Additional attempts after a transient send failure
    #[serde(default = "default_retry_max")]
    pub retry_max: u32,

    /// Fixed pause between retry attempts, milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_concurrency() -> u32 {
    10
}

fn default_retry_max() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    2_000
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            inter_item_delay_ms: 0,
            retry_max: default_retry_max(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Render pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RenderConfig {
    /// Worker count; 0 = derive from CPU count (clamped to [2, 8])
    #[serde(default)]
    pub workers: u32,

    /// Per-task budget in seconds; expired tasks fail and the worker is
    /// replaced
    #[validate(range(min = 1))]
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// FIFO task queue capacity
    #[validate(range(min = 1))]
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: u32,

    /// Concurrent render submissions allowed from the dispatch engine;
    /// independent of the transport concurrency budget
    #[validate(range(min = 1))]
    #[serde(default = "default_render_concurrency")]
    pub concurrency: u32,
}

fn default_task_timeout_secs() -> u64 {
    60
}

fn default_queue_capacity() -> u32 {
    64
}

fn default_render_concurrency() -> u32 {
    4
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            task_timeout_secs: default_task_timeout_secs(),
            queue_capacity: default_queue_capacity(),
            concurrency: default_render_concurrency(),
        }
    }
}

/// Full campaign description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CampaignConfig {
    /// Message template shared by every item
    pub message: MessageTemplate,

    /// Delivery knobs
    #[validate(nested)]
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Render pool sizing; ignored when the template requests no attachment
    #[validate(nested)]
    #[serde(default)]
    pub render: RenderConfig,
}
