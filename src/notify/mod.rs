// src/notify/mod.rs
pub mod email;
pub mod template;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::EmailSettings;

/// Rendered message bodies: HTML plus a plain-text alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &RenderedDigest) -> Result<()>;
    fn name(&self) -> &'static str;
}

pub type DynTransport = Arc<dyn Transport>;

/// Logs instead of sending. Used when SMTP is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, recipient: &str, subject: &str, body: &RenderedDigest) -> Result<()> {
        tracing::info!(
            target: "notify",
            recipient,
            subject,
            html_bytes = body.html.len(),
            "smtp not configured, digest logged instead of sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// SMTP when fully configured, otherwise the log transport.
pub fn build_transport(settings: &EmailSettings) -> Result<DynTransport> {
    if settings.is_configured() {
        let smtp = email::SmtpTransport::from_settings(settings)?;
        tracing::info!(target: "notify", host = settings.smtp_host.as_deref().unwrap_or_default(), "smtp transport ready");
        Ok(Arc::new(smtp))
    } else {
        tracing::warn!(target: "notify", "SMTP settings incomplete; using log transport");
        Ok(Arc::new(LogTransport))
    }
}
