//! Campaign file parsing
//!
//! Supports TOML (primary) and JSON (optional) formats.

use contracts::{CampaignConfig, ContractError, SmtpIdentity};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format (recommended)
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse a TOML campaign file
pub fn parse_toml(content: &str) -> Result<CampaignConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse a JSON campaign file
pub fn parse_json(content: &str) -> Result<CampaignConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse by format
pub fn parse(content: &str, format: ConfigFormat) -> Result<CampaignConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[derive(serde::Deserialize)]
struct IdentityFile {
    identities: Vec<SmtpIdentity>,
}

/// Parse an identity file: a top-level `identities` list in either format.
pub fn parse_identities(
    content: &str,
    format: ConfigFormat,
) -> Result<Vec<SmtpIdentity>, ContractError> {
    let file: IdentityFile = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ContractError::ConfigParse {
            message: format!("TOML parse error: {e}"),
            source: Some(Box::new(e)),
        })?,
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
                message: format!("JSON parse error: {e}"),
                source: Some(Box::new(e)),
            })?
        }
    };
    Ok(file.identities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::AttachmentSpec;

    #[test]
    fn test_parse_toml_with_attachment() {
        let content = r#"
[message]
subject = "Invoice"
sender_name = "Billing"
html_body = "<p>See attached.</p>"

[message.attachment]
type = "render"
format = "pdf"
html = "<h1>Invoice</h1>"
filename = "invoice"

[delivery]
concurrency = 20
inter_item_delay_ms = 500

[render]
workers = 4
task_timeout_secs = 30
"#;
        let campaign = parse_toml(content).unwrap();
        assert_eq!(campaign.delivery.concurrency, 20);
        assert_eq!(campaign.render.workers, 4);
        match &campaign.message.attachment {
            AttachmentSpec::Render { filename, .. } => {
                assert_eq!(filename.as_deref(), Some("invoice"));
            }
            other => panic!("unexpected attachment: {other:?}"),
        }
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "message": {
                "subject": "Hello",
                "sender_name": "Ops",
                "plain_body": "hi",
                "attachment": { "type": "none" }
            }
        }"#;
        let campaign = parse_json(content).unwrap();
        assert_eq!(campaign.message.subject, "Hello");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(
            result.unwrap_err(),
            ContractError::ConfigParse { .. }
        ));
    }

    #[test]
    fn test_parse_identities_toml() {
        let content = r#"
[[identities]]
host = "mx.example.com"
username = "ops@example.com"
password = "pw"

[[identities]]
host = "mx2.example.com"
port = 465
username = "billing@example.com"
password = "pw2"
sender_name = "Billing"
"#;
        let identities = parse_identities(content, ConfigFormat::Toml).unwrap();
        assert_eq!(identities.len(), 2);
        assert_eq!(identities[0].port, 587);
        assert_eq!(identities[1].port, 465);
        assert_eq!(identities[1].sender_name.as_deref(), Some("Billing"));
    }

    #[test]
    fn test_parse_identities_json() {
        let content = r#"{
            "identities": [
                { "host": "mx.example.com", "username": "a@b.c", "password": "pw" }
            ]
        }"#;
        let identities = parse_identities(content, ConfigFormat::Json).unwrap();
        assert_eq!(identities.len(), 1);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("JSON"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
