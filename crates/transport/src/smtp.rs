//! Lettre-backed SMTP transport
//!
//! One async SMTP client per identity pool key, with connection pooling
//! limits taken from the identity. Raw lettre errors are classified into
//! transient/permanent through the contract taxonomy.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use contracts::{ContractError, OutboundMessage, SmtpIdentity, Transport};
use lettre::message::header::ContentType;
use lettre::message::{Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

type Client = AsyncSmtpTransport<Tokio1Executor>;

/// SMTP transport client
pub struct SmtpTransport {
    clients: Mutex<HashMap<String, Client>>,
}

impl SmtpTransport {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, identity: &SmtpIdentity) -> Result<Client, ContractError> {
        let key = identity.pool_key();
        let mut clients = self.clients.lock().unwrap();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        info!(host = %identity.host, port = identity.port, "creating SMTP client");
        let builder = if identity.port == 465 {
            Client::relay(&identity.host)
        } else {
            Client::starttls_relay(&identity.host)
        }
        .map_err(|e| ContractError::classify_transport(e.to_string()))?;

        let client = builder
            .port(identity.port)
            .credentials(Credentials::new(
                identity.username.clone(),
                identity.password.clone(),
            ))
            .timeout(Some(Duration::from_millis(
                identity.limits.connection_timeout_ms,
            )))
            .pool_config(PoolConfig::new().max_size(identity.limits.max_connections))
            .build();

        clients.insert(key, client.clone());
        Ok(client)
    }

    fn build_message(message: &OutboundMessage) -> Result<Message, ContractError> {
        let from_addr: Address = message
            .from_address
            .parse()
            .map_err(|e| ContractError::transport_permanent(format!("bad from address: {e}")))?;
        let to_addr: Address = message
            .to_address
            .parse()
            .map_err(|e| ContractError::transport_permanent(format!("bad to address: {e}")))?;

        let builder = Message::builder()
            .from(Mailbox::new(Some(message.from_name.clone()), from_addr))
            .to(Mailbox::new(Some(message.to_name.clone()), to_addr))
            .subject(&message.subject);

        let body = match (&message.plain_body, &message.html_body) {
            (Some(plain), Some(html)) => MultiPart::alternative_plain_html(plain.clone(), html.clone()),
            (Some(plain), None) => {
                MultiPart::mixed().singlepart(SinglePart::plain(plain.clone()))
            }
            (None, Some(html)) => MultiPart::mixed().singlepart(SinglePart::html(html.clone())),
            (None, None) => MultiPart::mixed().singlepart(SinglePart::plain(String::new())),
        };

        let body = match &message.attachment {
            Some(att) => {
                let content_type = ContentType::parse(att.content_type).map_err(|e| {
                    ContractError::transport_permanent(format!("bad content type: {e}"))
                })?;
                MultiPart::mixed().multipart(body).singlepart(
                    LettreAttachment::new(att.filename.clone())
                        .body(att.content.to_vec(), content_type),
                )
            }
            None => body,
        };

        builder
            .multipart(body)
            .map_err(|e| ContractError::transport_permanent(format!("message build error: {e}")))
    }
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SmtpTransport {
    async fn verify(&self, identity: &SmtpIdentity) -> Result<(), ContractError> {
        let client = self.client_for(identity)?;
        let ok = client
            .test_connection()
            .await
            .map_err(|e| ContractError::verification(&identity.host, e.to_string()))?;
        if ok {
            Ok(())
        } else {
            Err(ContractError::verification(
                &identity.host,
                "connection test returned false",
            ))
        }
    }

    async fn send(
        &self,
        message: &OutboundMessage,
        identity: &SmtpIdentity,
    ) -> Result<(), ContractError> {
        let client = self.client_for(identity)?;
        let email = Self::build_message(message)?;

        debug!(recipient = %message.to_address, host = %identity.host, "sending message");
        client
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| ContractError::classify_transport(e.to_string()))
    }
}
