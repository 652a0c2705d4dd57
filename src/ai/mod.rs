//! AI layer: text-generation provider abstraction + the enrichment gateway.
//!
//! `TextGenerator` is the seam to the external model. The gateway in
//! [`gateway`] owns retries, validation and deterministic fallbacks, so
//! providers only need to return raw text or an error.

pub mod gateway;
pub mod openrouter;
pub mod parse;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::ai::AiConfig;

pub use gateway::EnrichmentGateway;
pub use openrouter::OpenRouterClient;

/// One generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object when it supports it.
    pub structured: bool,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<String>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;

    /// `false` means callers should skip the call and use their fallback directly.
    fn is_configured(&self) -> bool {
        true
    }
}

pub type DynGenerator = Arc<dyn TextGenerator>;

/// Used when no provider/key is configured.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _req: &GenerateRequest<'_>) -> Result<String> {
        bail!("text generation is disabled")
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
    fn is_configured(&self) -> bool {
        false
    }
}

/// Deterministic provider for local runs (`AI_TEST_MODE=mock`).
#[derive(Clone)]
pub struct FixedGenerator {
    pub structured_reply: String,
    pub text_reply: String,
}

impl Default for FixedGenerator {
    fn default() -> Self {
        Self {
            structured_reply: r#"{"summary":"Mock summary of the article.","takeaways":["Mock point one","Mock point two","Mock point three"],"topic":"ai"}"#.to_string(),
            text_reply: "Good morning! Today's digest features a mock overview.".to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<String> {
        Ok(if req.structured {
            self.structured_reply.clone()
        } else {
            self.text_reply.clone()
        })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Factory: build a generator according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock generator.
/// * Else if the config has no key (or provider is `disabled`), returns a disabled generator.
/// * Else builds the OpenRouter client with the given request timeout.
pub fn build_generator(config: &AiConfig, timeout: Duration) -> Result<DynGenerator> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(FixedGenerator::default()));
    }

    if !config.is_enabled() {
        tracing::warn!("no model API key configured; enrichment will use fallback text");
        return Ok(Arc::new(DisabledGenerator));
    }

    match config.provider.as_str() {
        "openrouter" => Ok(Arc::new(OpenRouterClient::new(config, timeout)?)),
        other => bail!("unsupported ai provider in config: {other}"),
    }
}
