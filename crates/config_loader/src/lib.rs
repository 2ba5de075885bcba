//! # Config Loader
//!
//! Campaign configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON campaign files
//! - Validate configuration legality
//! - Produce a [`CampaignConfig`]
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let campaign = ConfigLoader::load_from_path(Path::new("campaign.toml")).unwrap();
//! println!("Subject: {}", campaign.message.subject);
//! ```

mod parser;
mod validator;

pub use contracts::CampaignConfig;
pub use parser::ConfigFormat;

use contracts::{ContractError, SmtpIdentity};
use std::path::Path;

/// Campaign configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<CampaignConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CampaignConfig, ContractError> {
        let campaign = parser::parse(content, format)?;
        validator::validate(&campaign)?;
        Ok(campaign)
    }

    /// Load the identity list from a file path
    ///
    /// The file carries a top-level `identities` list; format is detected
    /// from the extension like [`load_from_path`](Self::load_from_path).
    ///
    /// # Errors
    /// File read or parse failure, or an empty identity list.
    pub fn load_identities(path: &Path) -> Result<Vec<SmtpIdentity>, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let identities = parser::parse_identities(&content, format)?;
        if identities.is_empty() {
            return Err(ContractError::config_validation(
                "identities",
                "at least one identity is required",
            ));
        }
        Ok(identities)
    }

    /// Serialize a CampaignConfig to TOML
    pub fn to_toml(campaign: &CampaignConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(campaign)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a CampaignConfig to JSON
    pub fn to_json(campaign: &CampaignConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(campaign)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
