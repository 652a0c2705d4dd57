// Shared helpers for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use knowledge_digest::ai::{DynGenerator, EnrichmentGateway, GenerateRequest, TextGenerator};
use knowledge_digest::config::EnrichmentSettings;
use knowledge_digest::deliver::DeliveryDispatcher;
use knowledge_digest::digest::{BuilderSettings, DigestBuilder};
use knowledge_digest::models::{Enrichment, RawItem};
use knowledge_digest::notify::template::HtmlTemplate;
use knowledge_digest::notify::{DynTransport, RenderedDigest, Transport};
use knowledge_digest::store::{DynStore, Store};
use knowledge_digest::topics::{Topic, TopicTable};

/// Generator that replays queued replies, then repeats `fallback`.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, String>>, fallback: Result<String, String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `reply`.
    pub fn always(reply: &str) -> Self {
        Self::new(vec![], Ok(reply.to_string()))
    }

    /// Always fails.
    pub fn failing() -> Self {
        Self::new(vec![], Err("upstream down".to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(req.user.to_string());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone()).map_err(|e| anyhow!(e))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Picks the topic from keywords in the prompt, like a tiny model would.
pub struct KeywordGenerator;

#[async_trait]
impl TextGenerator for KeywordGenerator {
    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<String> {
        if !req.structured {
            return Ok("Good morning! Today's digest features fresh picks.".to_string());
        }
        let text = req.user.to_lowercase();
        let topic = if text.contains("llm") || text.contains("gpt") {
            "LLM"
        } else if text.contains("kubernetes") || text.contains("deploy") {
            "devops"
        } else {
            "general"
        };
        Ok(format!(
            r#"```json
{{"summary": "About {topic}.", "takeaways": ["one", "two", "three"], "topic": "{topic}"}}
```"#
        ))
    }

    fn provider_name(&self) -> &'static str {
        "keyword"
    }
}

/// Generator that never answers in time.
pub struct StalledGenerator;

#[async_trait]
impl TextGenerator for StalledGenerator {
    async fn generate(&self, _req: &GenerateRequest<'_>) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }

    fn provider_name(&self) -> &'static str {
        "stalled"
    }
}

pub fn fast_enrichment() -> EnrichmentSettings {
    EnrichmentSettings {
        retry_attempts: 3,
        retry_delay_ms: 0,
        request_timeout_secs: 1,
        content_char_limit: 3000,
        concurrency: 4,
    }
}

pub fn gateway(gen: DynGenerator) -> Arc<EnrichmentGateway> {
    gateway_with(gen, &fast_enrichment())
}

pub fn gateway_with(gen: DynGenerator, settings: &EnrichmentSettings) -> Arc<EnrichmentGateway> {
    Arc::new(EnrichmentGateway::new(gen, Arc::new(TopicTable::default_seed()), settings))
}

pub fn builder(store: DynStore, gen: DynGenerator) -> DigestBuilder {
    DigestBuilder::new(store, gateway(gen), BuilderSettings::default())
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, String, RenderedDigest)>>,
}

impl RecordingTransport {
    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(to, _, _)| to.clone()).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, recipient: &str, subject: &str, body: &RenderedDigest) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string(), body.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Records like `RecordingTransport`, but each send takes `delay`.
pub struct SlowTransport {
    pub inner: RecordingTransport,
    pub delay: Duration,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, recipient: &str, subject: &str, body: &RenderedDigest) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.send(recipient, subject, body).await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn send(&self, _recipient: &str, _subject: &str, _body: &RenderedDigest) -> Result<()> {
        Err(anyhow!("smtp connection refused"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

pub struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn send(&self, _recipient: &str, _subject: &str, _body: &RenderedDigest) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

pub fn dispatcher(store: DynStore, transport: DynTransport) -> DeliveryDispatcher {
    DeliveryDispatcher::new(
        store,
        Arc::new(HtmlTemplate::default()),
        transport,
        "Your Daily AI Digest",
        Duration::from_millis(200),
    )
}

pub fn raw(url: &str, title: &str, content: &str, published_at: DateTime<Utc>) -> RawItem {
    RawItem {
        title: title.to_string(),
        url: url.to_string(),
        content: content.to_string(),
        published_at,
        source_name: "Blog".to_string(),
    }
}

/// Insert an article (optionally already enriched with `topic`) and return its id.
pub async fn seed_article(
    store: &dyn Store,
    url: &str,
    title: &str,
    content: &str,
    published_at: DateTime<Utc>,
    topic: Option<Topic>,
) -> i64 {
    store
        .insert_raw_items(vec![raw(url, title, content, published_at)])
        .await
        .unwrap();
    let id = store
        .articles_published_since(DateTime::<Utc>::MIN_UTC)
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.url == url)
        .map(|a| a.id)
        .expect("seeded article present");
    if let Some(topic) = topic {
        let e = Enrichment {
            summary: format!("Summary of {title}."),
            takeaways: ["a".to_string(), "b".to_string(), "c".to_string()],
            topic,
        };
        store.save_enrichment(id, &e).await.unwrap();
    }
    id
}
