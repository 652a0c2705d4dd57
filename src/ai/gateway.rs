//! Enrichment gateway: the only entry point for per-article enrichment and
//! digest overview text. Collaborator failures never escape; every path ends
//! in either a validated model result or deterministic fallback text.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, warn};

use super::parse::{fallback_enrichment, parse_enrichment, strip_fences, truncate_content};
use super::{DynGenerator, GenerateRequest};
use crate::config::EnrichmentSettings;
use crate::models::{Article, Enrichment};
use crate::topics::TopicTable;

const ENRICH_SYSTEM_PROMPT: &str = "You are a senior technology newsletter editor. \
You write extremely concise summaries for email digests. \
ALWAYS return valid JSON with exactly these keys: summary, takeaways, topic.";

const OVERVIEW_SYSTEM_PROMPT: &str = "You are a professional tech newsletter editor.";
const ENRICH_MAX_TOKENS: u32 = 500;
const OVERVIEW_MAX_TOKENS: u32 = 150;

pub struct EnrichmentGateway {
    generator: DynGenerator,
    topics: Arc<TopicTable>,
    attempts: u32,
    retry_delay: Duration,
    timeout: Duration,
    content_char_limit: usize,
}

impl EnrichmentGateway {
    pub fn new(generator: DynGenerator, topics: Arc<TopicTable>, settings: &EnrichmentSettings) -> Self {
        Self {
            generator,
            topics,
            attempts: settings.retry_attempts.max(1),
            retry_delay: settings.retry_delay(),
            timeout: settings.request_timeout(),
            content_char_limit: settings.content_char_limit.max(1),
        }
    }

    pub fn topics(&self) -> &TopicTable {
        &self.topics
    }

    /// Summary, three takeaways and a canonical topic for `content`. Never fails.
    pub async fn enrich(&self, content: &str) -> Enrichment {
        let limited = truncate_content(content, self.content_char_limit);

        if !self.generator.is_configured() {
            debug!("generator unconfigured, using fallback enrichment");
            counter!("enrich_fallbacks_total").increment(1);
            return fallback_enrichment(&limited);
        }

        let user_prompt = format!(
            "ARTICLE CONTENT:\n{limited}\n\nTASK:\nReturn STRICT JSON with:\n\
             - summary: ONE or TWO sentences, max 40 words total\n\
             - takeaways: list of EXACTLY 3 very short bullet points (5-7 words each)\n\
             - topic: ONE lowercase word (ai, mlops, startup, product, vc, general)\n"
        );
        let req = GenerateRequest {
            system: ENRICH_SYSTEM_PROMPT,
            user: &user_prompt,
            max_tokens: ENRICH_MAX_TOKENS,
            structured: true,
        };

        for attempt in 1..=self.attempts {
            counter!("enrich_attempts_total").increment(1);
            match tokio::time::timeout(self.timeout, self.generator.generate(&req)).await {
                Ok(Ok(text)) => match parse_enrichment(&text, &self.topics) {
                    Some(enrichment) => {
                        debug!(attempt, topic = %enrichment.topic, "article enriched");
                        return enrichment;
                    }
                    None => warn!(attempt, "unusable enrichment output"),
                },
                Ok(Err(e)) => warn!(attempt, error = %e, "enrichment call failed"),
                Err(_) => warn!(attempt, timeout_ms = self.timeout.as_millis() as u64, "enrichment call timed out"),
            }
            if attempt < self.attempts && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!(attempts = self.attempts, "all enrichment attempts failed, using fallback");
        counter!("enrich_fallbacks_total").increment(1);
        fallback_enrichment(&limited)
    }

    /// Short natural-language intro for a digest. Never fails.
    pub async fn overview(&self, articles: &[Article], interests: &[String]) -> String {
        if articles.is_empty() {
            return "No articles selected for today's digest.".to_string();
        }
        let n = articles.len();

        if !self.generator.is_configured() {
            return unconfigured_overview(n);
        }

        let titles = articles
            .iter()
            .take(10)
            .map(|a| format!("- {}", a.title.chars().take(100).collect::<String>()))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "User interests: {}\n\nArticles selected:\n{titles}\n\n\
             Write a short professional daily digest overview (3-4 lines).\n\
             Start with: \"Good morning! Today's digest features...\"\n",
            interests.join(", ")
        );
        let req = GenerateRequest {
            system: OVERVIEW_SYSTEM_PROMPT,
            user: &prompt,
            max_tokens: OVERVIEW_MAX_TOKENS,
            structured: false,
        };

        match tokio::time::timeout(self.timeout, self.generator.generate(&req)).await {
            Ok(Ok(text)) => {
                let cleaned = strip_fences(&text);
                if !cleaned.is_empty() {
                    info!(articles = n, "digest overview generated");
                    return cleaned;
                }
                warn!("empty overview output");
            }
            Ok(Err(e)) => warn!(error = %e, "overview generation failed"),
            Err(_) => warn!("overview generation timed out"),
        }
        failed_overview(n)
    }
}

// The two fallbacks differ on purpose: "on technology" marks a digest built
// with no model configured, the shorter text marks a failed model call.
fn unconfigured_overview(n: usize) -> String {
    format!("Good morning! Today's digest features {n} curated articles on technology.")
}

fn failed_overview(n: usize) -> String {
    format!("Good morning! Today's digest features {n} curated articles.")
}
