use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{RenderedDigest, Transport};
use crate::config::EmailSettings;

const SMTP_TIMEOUT: Duration = Duration::from_secs(20);

/// STARTTLS relay with login credentials.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    pub fn from_settings(settings: &EmailSettings) -> Result<Self> {
        let host = settings.smtp_host.as_deref().ok_or_else(|| anyhow!("SMTP_HOST missing"))?;
        let user = settings.smtp_user.clone().ok_or_else(|| anyhow!("SMTP_USER missing"))?;
        let pass = settings
            .smtp_password
            .clone()
            .ok_or_else(|| anyhow!("SMTP_PASSWORD missing"))?;
        let from_addr = settings.sender().ok_or_else(|| anyhow!("FROM_EMAIL missing"))?;

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("invalid SMTP_HOST {host:?}"))?
            .port(settings.smtp_port)
            .credentials(creds)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        let from = from_addr
            .parse()
            .with_context(|| format!("invalid sender address {from_addr:?}"))?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, recipient: &str, subject: &str, body: &RenderedDigest) -> Result<()> {
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("invalid recipient {recipient:?}"))?;

        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(body.text.clone(), body.html.clone()))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        tracing::info!(target: "notify", recipient, "email sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
