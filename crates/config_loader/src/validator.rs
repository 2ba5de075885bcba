//! Campaign validation
//!
//! Rules:
//! - field ranges (via `validator` derive on the contract types)
//! - subject and sender_name non-empty
//! - at least one body part present
//! - render attachment HTML non-empty
//! - render worker count bounded

use contracts::{AttachmentSpec, CampaignConfig, ContractError};
use validator::Validate;

const MAX_RENDER_WORKERS: u32 = 32;

/// Validate a parsed campaign.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(campaign: &CampaignConfig) -> Result<(), ContractError> {
    validate_ranges(campaign)?;
    validate_message(campaign)?;
    validate_attachment(campaign)?;
    validate_render(campaign)?;
    Ok(())
}

fn validate_ranges(campaign: &CampaignConfig) -> Result<(), ContractError> {
    campaign.validate().map_err(|e| {
        let field = e
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "campaign".to_string());
        ContractError::config_validation(field, e.to_string())
    })
}

fn validate_message(campaign: &CampaignConfig) -> Result<(), ContractError> {
    let message = &campaign.message;

    if message.subject.trim().is_empty() {
        return Err(ContractError::config_validation(
            "message.subject",
            "subject must not be empty",
        ));
    }

    if message.sender_name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "message.sender_name",
            "sender_name must not be empty",
        ));
    }

    let has_plain = message
        .plain_body
        .as_deref()
        .is_some_and(|b| !b.trim().is_empty());
    let has_html = message
        .html_body
        .as_deref()
        .is_some_and(|b| !b.trim().is_empty());

    if !has_plain && !has_html {
        return Err(ContractError::config_validation(
            "message.plain_body / message.html_body",
            "at least one body part is required",
        ));
    }

    Ok(())
}

fn validate_attachment(campaign: &CampaignConfig) -> Result<(), ContractError> {
    if let AttachmentSpec::Render { html, .. } = &campaign.message.attachment {
        if html.trim().is_empty() {
            return Err(ContractError::config_validation(
                "message.attachment.html",
                "attachment HTML must not be empty",
            ));
        }
    }
    Ok(())
}

fn validate_render(campaign: &CampaignConfig) -> Result<(), ContractError> {
    if campaign.render.workers > MAX_RENDER_WORKERS {
        return Err(ContractError::config_validation(
            "render.workers",
            format!(
                "worker count {} exceeds maximum {}",
                campaign.render.workers, MAX_RENDER_WORKERS
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DeliveryConfig, MessageTemplate, RenderConfig, RenderFormat};

    fn campaign() -> CampaignConfig {
        CampaignConfig {
            message: MessageTemplate {
                subject: "Hello".to_string(),
                sender_name: "Ops".to_string(),
                plain_body: Some("hi".to_string()),
                html_body: None,
                attachment: AttachmentSpec::None,
            },
            delivery: DeliveryConfig::default(),
            render: RenderConfig::default(),
        }
    }

    #[test]
    fn test_valid_campaign() {
        assert!(validate(&campaign()).is_ok());
    }

    #[test]
    fn test_empty_subject_rejected() {
        let mut c = campaign();
        c.message.subject = "  ".to_string();
        let err = validate(&c).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { field, .. } if field.contains("subject")));
    }

    #[test]
    fn test_missing_bodies_rejected() {
        let mut c = campaign();
        c.message.plain_body = None;
        c.message.html_body = Some(String::new());
        assert!(validate(&c).is_err());
    }

    #[test]
    fn test_empty_attachment_html_rejected() {
        let mut c = campaign();
        c.message.attachment = AttachmentSpec::Render {
            format: RenderFormat::Pdf,
            html: "".to_string(),
            filename: None,
        };
        assert!(validate(&c).is_err());
    }

    #[test]
    fn test_excessive_workers_rejected() {
        let mut c = campaign();
        c.render.workers = 64;
        assert!(validate(&c).is_err());
    }

    #[test]
    fn test_concurrency_out_of_range_rejected() {
        let mut c = campaign();
        c.delivery.concurrency = 0;
        assert!(validate(&c).is_err());
    }
}
