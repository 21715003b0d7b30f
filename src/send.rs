//! Outbound mail submission

use crate::config::SmtpConfig;
use crate::error::{Error, Result};
use crate::message::Address;
use crate::reply::OutboundMessage;
use async_trait::async_trait;
use chrono::Utc;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, info};

/// Port on which SMTP speaks TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Something that can deliver an [`OutboundMessage`].
#[async_trait]
pub trait MailSender: Send + Sync {
    /// # Errors
    ///
    /// Implementations report failures as [`Error::Send`] (or
    /// [`Error::Compose`] for messages that cannot be built).
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// SMTP submission through a relay with credentials.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpSender {
    /// Build the transport. Port 465 uses implicit TLS, anything else
    /// STARTTLS. No connection is made until the first send.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the relay host is unusable.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| Error::Config(format!("SMTP relay {}: {e}", config.host)))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        debug!("SMTP transport for {}:{}", config.host, config.port);
        Ok(Self { transport })
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let wire = message.to_lettre()?;
        self.transport
            .send(wire)
            .await
            .map_err(|e| Error::Send(format!("SMTP send failed: {e}")))?;
        info!("Sent '{}' to {}", message.subject, message.to);
        Ok(())
    }
}

/// A plain message with no threading headers, dated now.
#[must_use]
pub fn compose_plain(from: &Address, to: &Address, subject: &str, body: &str) -> OutboundMessage {
    OutboundMessage {
        from: from.clone(),
        to: to.clone(),
        subject: subject.to_string(),
        in_reply_to: None,
        references: None,
        date: Utc::now(),
        body: body.to_string(),
    }
}
