//! Outbound message model
//!
//! [`MessageTemplate`] is the run-wide message description; per item it is
//! assembled into one [`OutboundMessage`] (tag substitution is out of scope
//! here, the template bodies are sent as provided).

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::render::RenderFormat;
use crate::{Recipient, SmtpIdentity};

/// Attachment request carried by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentSpec {
    /// No attachment
    None,
    /// Render the given HTML document into the target format per item
    Render {
        format: RenderFormat,
        html: String,
        /// Optional filename; defaults per format, extension fixed up
        #[serde(default)]
        filename: Option<String>,
    },
}

impl AttachmentSpec {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Final attachment filename: configured name with the format extension
    /// appended when absent, or the format default.
    pub fn resolve_filename(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Render {
                format, filename, ..
            } => Some(match filename {
                Some(name) if name.to_lowercase().ends_with(format.extension()) => name.clone(),
                Some(name) => format!("{name}{}", format.extension()),
                None => format.default_filename().to_string(),
            }),
        }
    }
}

/// Run-wide message description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub subject: String,
    /// From header display name
    pub sender_name: String,
    /// Plain-text body part
    #[serde(default)]
    pub plain_body: Option<String>,
    /// HTML body part
    #[serde(default)]
    pub html_body: Option<String>,
    /// Attachment request
    #[serde(default = "AttachmentSpec::none")]
    pub attachment: AttachmentSpec,
}

impl AttachmentSpec {
    fn none() -> Self {
        Self::None
    }
}

/// Rendered attachment bound to one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Bytes,
    pub content_type: &'static str,
}

/// One fully-assembled message, ready for the transport client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from_name: String,
    pub from_address: String,
    pub to_name: String,
    pub to_address: String,
    pub subject: String,
    pub plain_body: Option<String>,
    pub html_body: Option<String>,
    pub attachment: Option<Attachment>,
}

impl OutboundMessage {
    /// Assemble a message for one recipient, without the attachment
    /// (rendering happens upstream and is attached via [`with_attachment`]).
    ///
    /// [`with_attachment`]: OutboundMessage::with_attachment
    pub fn assemble(
        template: &MessageTemplate,
        recipient: &Recipient,
        identity: &SmtpIdentity,
    ) -> Self {
        Self {
            from_name: identity
                .sender_name
                .clone()
                .unwrap_or_else(|| template.sender_name.clone()),
            from_address: identity.username.clone(),
            to_name: recipient.display_name(),
            to_address: recipient.address.clone(),
            subject: template.subject.clone(),
            plain_body: template.plain_body.clone(),
            html_body: template.html_body.clone(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> MessageTemplate {
        MessageTemplate {
            subject: "Invoice".to_string(),
            sender_name: "Billing".to_string(),
            plain_body: Some("see attached".to_string()),
            html_body: None,
            attachment: AttachmentSpec::None,
        }
    }

    #[test]
    fn test_assemble_uses_identity_username_as_from() {
        let identity = SmtpIdentity::new("mx.example.com", "billing@example.com", "pw");
        let msg = OutboundMessage::assemble(&template(), &Recipient::new("jo@example.com"), &identity);
        assert_eq!(msg.from_address, "billing@example.com");
        assert_eq!(msg.from_name, "Billing");
        assert_eq!(msg.to_name, "jo");
    }

    #[test]
    fn test_identity_sender_name_overrides_template() {
        let mut identity = SmtpIdentity::new("mx.example.com", "billing@example.com", "pw");
        identity.sender_name = Some("Acme Billing".to_string());
        let msg = OutboundMessage::assemble(&template(), &Recipient::new("jo@example.com"), &identity);
        assert_eq!(msg.from_name, "Acme Billing");
    }

    #[test]
    fn test_resolve_filename_defaults_and_extension_fixup() {
        let spec = AttachmentSpec::Render {
            format: RenderFormat::Pdf,
            html: "<p>hi</p>".to_string(),
            filename: None,
        };
        assert_eq!(spec.resolve_filename().unwrap(), "document.pdf");

        let spec = AttachmentSpec::Render {
            format: RenderFormat::Png,
            html: "<p>hi</p>".to_string(),
            filename: Some("receipt".to_string()),
        };
        assert_eq!(spec.resolve_filename().unwrap(), "receipt.png");

        let spec = AttachmentSpec::Render {
            format: RenderFormat::Png,
            html: "<p>hi</p>".to_string(),
            filename: Some("receipt.PNG".to_string()),
        };
        assert_eq!(spec.resolve_filename().unwrap(), "receipt.PNG");
    }

    #[test]
    fn test_attachment_spec_serde_tagging() {
        let json = r#"{"type":"render","format":"pdf","html":"<p>x</p>"}"#;
        let spec: AttachmentSpec = serde_json::from_str(json).unwrap();
        assert!(!spec.is_none());
    }
}
