use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::core::config::MailSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutgoingEmail {
    pub(crate) to: String,
    pub(crate) subject: String,
    pub(crate) text_body: String,
    pub(crate) html_body: String,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum MailError {
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("smtp transport failed: {0}")]
    Transport(String),
}

/// Outbound email transport. Implementations may fail per recipient.
#[async_trait]
pub(crate) trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

pub(crate) struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub(crate) fn from_settings(mail: &MailSettings) -> Result<Self, MailError> {
        let builder = if mail.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&mail.smtp_host)
                .map_err(|err| MailError::Transport(err.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&mail.smtp_host)
        };

        let mut builder = builder.port(mail.smtp_port);
        if !mail.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                mail.smtp_username.clone(),
                mail.smtp_password.clone(),
            ));
        }

        let address = parse_address(&mail.from_address)?;
        let name = Some(mail.from_name.clone()).filter(|name| !name.trim().is_empty());

        Ok(Self { transport: builder.build(), from: Mailbox::new(name, address) })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let to = Mailbox::new(None, parse_address(&email.to)?);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.text_body, email.html_body))
            .map_err(|err| MailError::Build(err.to_string()))?;

        self.transport.send(message).await.map_err(|err| MailError::Transport(err.to_string()))?;
        Ok(())
    }
}

/// Used when SMTP is disabled: the email is only logged.
pub(crate) struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        parse_address(&email.to)?;
        tracing::info!(to = %email.to, subject = %email.subject, "SMTP disabled; email not sent");
        Ok(())
    }
}

pub(crate) fn build_mailer(mail: &MailSettings) -> Result<Arc<dyn Mailer>, MailError> {
    if !mail.enabled {
        tracing::warn!("SMTP disabled; notification emails will only be logged");
        return Ok(Arc::new(LogMailer));
    }

    let mailer = SmtpMailer::from_settings(mail)?;
    tracing::info!(
        host = %mail.smtp_host,
        port = mail.smtp_port,
        starttls = mail.starttls,
        "SMTP mailer configured"
    );
    Ok(Arc::new(mailer))
}

fn parse_address(raw: &str) -> Result<Address, MailError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|err| MailError::Address { address: raw.to_string(), reason: err.to_string() })
}
