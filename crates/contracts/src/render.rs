//! RenderBackend trait - rendering boundary interface
//!
//! The backend is a black box that turns an HTML document into bytes of the
//! requested format. It must tolerate being invoked concurrently up to the
//! render pool's configured worker count.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Target format for a rendered attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderFormat {
    Pdf,
    Png,
    Jpeg,
}

impl RenderFormat {
    /// Filename extension including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Png => ".png",
            Self::Jpeg => ".jpg",
        }
    }

    /// MIME type for the attachment part.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Default attachment filename when the template provides none.
    pub fn default_filename(&self) -> &'static str {
        match self {
            Self::Pdf => "document.pdf",
            Self::Png => "image.png",
            Self::Jpeg => "image.jpg",
        }
    }
}

/// One rendering job payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub html: String,
    pub format: RenderFormat,
}

/// Rendering backend trait
///
/// All backend implementations must implement this trait.
#[trait_variant::make(RenderBackend: Send)]
pub trait LocalRenderBackend {
    /// One-time availability probe (binary present, version readable).
    ///
    /// # Errors
    /// Returns `RenderBackend` error when the backend cannot run at all.
    async fn probe(&self) -> Result<(), ContractError>;

    /// Render an HTML document into the target format.
    ///
    /// # Errors
    /// Non-zero exit, empty output, or spawn failure. Timeouts are enforced
    /// by the caller, which may drop this future mid-flight; implementations
    /// must release external resources (processes, scratch files) on drop.
    async fn render(&self, request: &RenderRequest) -> Result<Bytes, ContractError>;
}
