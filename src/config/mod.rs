//! Process configuration.
//!
//! Resolution order (later wins):
//! 1) built-in defaults
//! 2) TOML file: `$DIGEST_CONFIG_PATH`, else `config/digest.toml` if present
//! 3) environment variables (`DIGEST_GENERATION_TIME`, `MAX_ARTICLES_PER_DIGEST`, ...)
//!
//! `Settings::load` validates everything; an invalid value is fatal at startup.

pub mod ai;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::DailyTime;
use self::ai::AiConfig;

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub content_char_limit: usize,
    pub concurrency: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 2_000,
            request_timeout_secs: 30,
            content_char_limit: 3_000,
            concurrency: 4,
        }
    }
}

impl EnrichmentSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    /// Defaults to `smtp_user` when absent.
    pub from: Option<String>,
    pub subject: String,
    pub send_timeout_secs: u64,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_password: None,
            from: None,
            subject: "Your Daily AI Digest".to_string(),
            send_timeout_secs: 30,
        }
    }
}

impl EmailSettings {
    /// SMTP is usable only with host, credentials and a sender.
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some()
            && self.smtp_user.is_some()
            && self.smtp_password.is_some()
            && self.sender().is_some()
    }

    pub fn sender(&self) -> Option<&str> {
        self.from.as_deref().or(self.smtp_user.as_deref())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// "HH:MM", UTC.
    pub digest_generation_time: String,
    pub max_articles_per_digest: usize,
    pub article_age_limit_days: i64,
    pub fallback_candidates: usize,
    pub run_on_start: bool,
    pub ingest_concurrency: usize,
    pub database_path: String,
    pub sources_path: String,
    pub topics_path: String,
    pub metrics_addr: Option<String>,
    pub enrichment: EnrichmentSettings,
    pub ai: AiConfig,
    pub email: EmailSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            digest_generation_time: "09:00".to_string(),
            max_articles_per_digest: 5,
            article_age_limit_days: 7,
            fallback_candidates: 10,
            run_on_start: cfg!(debug_assertions),
            ingest_concurrency: 3,
            database_path: "data/digest.db".to_string(),
            sources_path: crate::ingest::config::DEFAULT_SOURCES_PATH.to_string(),
            topics_path: crate::topics::DEFAULT_TOPICS_CONFIG_PATH.to_string(),
            metrics_addr: None,
            enrichment: EnrichmentSettings::default(),
            ai: AiConfig::default(),
            email: EmailSettings::default(),
        }
    }
}

impl Settings {
    /// Load using env var + fallbacks, apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let base = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
                }
                Self::from_file(&pb)?
            }
            Err(_) => {
                let p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::from_file(&p)?
                } else {
                    Self::default()
                }
            }
        };
        let settings = base.with_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing settings toml")
    }

    /// Apply environment overrides. A present-but-unparsable value is an error.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_str("DIGEST_GENERATION_TIME") {
            self.digest_generation_time = v;
        }
        if let Some(v) = env_parse("MAX_ARTICLES_PER_DIGEST")? {
            self.max_articles_per_digest = v;
        }
        if let Some(v) = env_parse("ARTICLE_AGE_LIMIT_DAYS")? {
            self.article_age_limit_days = v;
        }
        if let Some(v) = env_parse("FALLBACK_CANDIDATES")? {
            self.fallback_candidates = v;
        }
        if let Some(v) = env_str("RUN_ON_START") {
            self.run_on_start = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = env_parse("INGEST_CONCURRENCY")? {
            self.ingest_concurrency = v;
        }
        if let Some(v) = env_str("DATABASE_PATH") {
            self.database_path = v;
        }
        if let Some(v) = env_str("SOURCES_CONFIG_PATH") {
            self.sources_path = v;
        }
        if let Some(v) = env_str("TOPICS_CONFIG_PATH") {
            self.topics_path = v;
        }
        if let Some(v) = env_str("METRICS_ADDR") {
            self.metrics_addr = Some(v);
        }

        if let Some(v) = env_parse("ENRICH_RETRY_ATTEMPTS")? {
            self.enrichment.retry_attempts = v;
        }
        if let Some(v) = env_parse("ENRICH_RETRY_DELAY_MS")? {
            self.enrichment.retry_delay_ms = v;
        }
        if let Some(v) = env_parse("ENRICH_REQUEST_TIMEOUT_SECS")? {
            self.enrichment.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("ENRICH_CONTENT_CHAR_LIMIT")? {
            self.enrichment.content_char_limit = v;
        }
        if let Some(v) = env_parse("ENRICH_CONCURRENCY")? {
            self.enrichment.concurrency = v;
        }

        if let Some(v) = env_str("SMTP_HOST") {
            self.email.smtp_host = Some(v);
        }
        if let Some(v) = env_parse("SMTP_PORT")? {
            self.email.smtp_port = v;
        }
        if let Some(v) = env_str("SMTP_USER") {
            self.email.smtp_user = Some(v);
        }
        if let Some(v) = env_str("SMTP_PASSWORD") {
            self.email.smtp_password = Some(v);
        }
        if let Some(v) = env_str("FROM_EMAIL") {
            self.email.from = Some(v);
        }

        self.ai = self.ai.resolve();
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.schedule()?;
        if self.max_articles_per_digest < 1 {
            bail!("max_articles_per_digest must be >= 1");
        }
        if self.article_age_limit_days < 1 {
            bail!("article_age_limit_days must be >= 1");
        }
        if self.fallback_candidates < 1 {
            bail!("fallback_candidates must be >= 1");
        }
        if self.enrichment.retry_attempts < 1 {
            bail!("enrichment.retry_attempts must be >= 1");
        }
        if self.enrichment.request_timeout_secs < 1 {
            bail!("enrichment.request_timeout_secs must be >= 1");
        }
        if self.enrichment.content_char_limit < 1 {
            bail!("enrichment.content_char_limit must be >= 1");
        }
        self.metrics_socket()?;
        Ok(())
    }

    pub fn schedule(&self) -> Result<DailyTime> {
        self.digest_generation_time
            .parse()
            .with_context(|| format!("invalid digest_generation_time {:?}", self.digest_generation_time))
    }

    pub fn metrics_socket(&self) -> Result<Option<SocketAddr>> {
        self.metrics_addr
            .as_deref()
            .map(|a| a.parse::<SocketAddr>().with_context(|| format!("invalid metrics_addr {a:?}")))
            .transpose()
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_str(key) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {key}={v:?}: {e}")),
    }
}
