//! Outgoing e-mail. Delivery is best effort: a failed notification is logged
//! and reported back to the caller, but never undoes the action behind it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Something that can deliver an HTML e-mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;

    /// False for mailers that drop everything.
    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Use STARTTLS instead of implicit TLS (SMTPS).
    pub starttls: bool,
}

/// SMTP delivery over TLS with plain credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        }
        .with_context(|| format!("invalid SMTP host {}", settings.host))?;

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        let from = settings
            .username
            .parse::<Mailbox>()
            .with_context(|| format!("invalid sender address {}", settings.username))?;

        info!("SMTP mailer configured for {}:{}", settings.host, settings.port);
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML);
        for addr in mail.to.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            builder = builder.to(addr
                .parse::<Mailbox>()
                .with_context(|| format!("invalid recipient address {}", addr))?);
        }
        let message = builder.body(mail.html_body)?;

        self.transport.send(message).await?;
        info!("Mail delivered to {}", mail.to);
        Ok(())
    }
}

/// Used when no SMTP server is configured.
pub struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        debug!("Mail disabled, dropping '{}' to {}", mail.subject, mail.to);
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// What happened to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Delivered,
    Failed,
    /// Mail is disabled or the recipient has no address.
    Skipped,
}

/// Send a notification, logging instead of propagating failures.
pub async fn notify(mailer: &dyn Mailer, mail: OutgoingMail) -> Notification {
    if !mailer.is_enabled() || mail.to.trim().is_empty() {
        return Notification::Skipped;
    }

    let to = mail.to.clone();
    match mailer.send(mail).await {
        Ok(()) => Notification::Delivered,
        Err(e) => {
            warn!("Failed to send mail to {}: {:#}", to, e);
            Notification::Failed
        }
    }
}
