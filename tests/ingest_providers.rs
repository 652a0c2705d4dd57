use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use knowledge_digest::ingest::providers::rss::RssScraper;
use knowledge_digest::ingest::providers::youtube::YouTubeScraper;
use knowledge_digest::ingest::{run_ingestion, Feed, Scraper};
use knowledge_digest::models::{Article, Digest, Enrichment, NewDigest, PendingDelivery, RawItem, User};
use knowledge_digest::store::{MemoryStore, Store};

const BLOG_XML: &str = include_str!("fixtures/blog_rss.xml");
const YOUTUBE_XML: &str = include_str!("fixtures/youtube_feed.xml");

struct BrokenScraper;

#[async_trait]
impl Scraper for BrokenScraper {
    async fn scrape(&self) -> Result<Vec<RawItem>> {
        bail!("connection reset")
    }
    fn name(&self) -> &str {
        "Broken"
    }
}

fn blog() -> Arc<dyn Scraper> {
    Arc::new(RssScraper::new("Blog", vec![Feed::fixture("example blog", BLOG_XML)], 10))
}

fn youtube() -> Arc<dyn Scraper> {
    Arc::new(YouTubeScraper::new(vec![Feed::fixture("Fireship", YOUTUBE_XML)], 3))
}

#[tokio::test]
async fn rss_fixture_parses_items_with_clean_content() {
    let items = blog().scrape().await.expect("rss parse ok");
    assert_eq!(items.len(), 5);
    assert!(items.iter().all(|i| i.source_name == "Blog"));

    let first = &items[0];
    assert_eq!(first.url, "https://blog.example.com/llm-agents");
    assert_eq!(
        first.content,
        "How we run LLM agents at scale. Lessons on evals, latency and cost."
    );
    assert_eq!(first.published_at.to_rfc3339(), "2025-01-06T08:00:00+00:00");
    assert_eq!(items[2].content, "Tomatoes \u{2014} finally.");
}

#[tokio::test]
async fn youtube_fixture_respects_limit_and_falls_back_to_title() {
    let items = youtube().scrape().await.expect("atom parse ok");
    assert_eq!(items.len(), 3, "per-channel limit applies");
    assert_eq!(items[0].url, "https://www.youtube.com/watch?v=vid001");
    assert_eq!(items[0].content, "A fast tour of LLM agents and tool calling.");
    assert_eq!(items[1].content, "Startup pricing mistakes");
    assert_eq!(items[2].content, "Rust in 100 seconds");
    assert!(items.iter().all(|i| i.source_name == "YouTube"));
}

#[tokio::test]
async fn broken_feed_among_good_ones_is_skipped() {
    let s = RssScraper::new(
        "Newsletter",
        vec![
            Feed::fixture("broken", "<rss><channel><item></rss>"),
            Feed::fixture("good", BLOG_XML),
        ],
        2,
    );
    let items = s.scrape().await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.source_name == "Newsletter"));

    let all_broken = RssScraper::new("Newsletter", vec![Feed::fixture("broken", "not xml")], 2);
    assert!(all_broken.scrape().await.is_err());
}

#[tokio::test]
async fn ingestion_dedups_across_runs_and_isolates_failures() {
    let store = MemoryStore::new();
    let scrapers = vec![blog(), Arc::new(BrokenScraper) as Arc<dyn Scraper>, youtube()];

    let first = run_ingestion(&scrapers, &store, 2).await;
    let names: Vec<&str> = first.sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Blog", "Broken", "YouTube"]);

    assert_eq!(first.sources[0].fetched, 5);
    assert_eq!(first.sources[0].inserted, 3, "empty title and duplicate url dropped");
    assert!(first.sources[1].error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(first.sources[2].inserted, 3);
    assert_eq!(first.inserted(), 6);
    assert_eq!(first.failed_sources(), 1);

    let second = run_ingestion(&scrapers, &store, 2).await;
    assert_eq!(second.inserted(), 0);
    assert_eq!(store.articles().await.len(), 6);
    assert!(store
        .articles()
        .await
        .iter()
        .all(|a| a.summary.is_none() && a.topic.is_none()));
    // Existing rows are never overwritten.
    let before = store.articles_published_since(chrono::DateTime::<chrono::Utc>::MIN_UTC).await.unwrap();
    run_ingestion(&scrapers, &store, 2).await;
    let after = store.articles_published_since(chrono::DateTime::<chrono::Utc>::MIN_UTC).await.unwrap();
    assert_eq!(before, after);
}

/// Rejects the first batch it is asked to persist.
#[derive(Default)]
struct FirstInsertFails {
    inner: MemoryStore,
    tripped: AtomicBool,
}

#[async_trait]
impl Store for FirstInsertFails {
    async fn users(&self) -> Result<Vec<User>> {
        self.inner.users().await
    }
    async fn upsert_user(&self, email: &str, interests: &[String]) -> Result<User> {
        self.inner.upsert_user(email, interests).await
    }
    async fn set_user_interests(&self, user_id: i64, interests: &[String]) -> Result<()> {
        self.inner.set_user_interests(user_id, interests).await
    }
    async fn insert_raw_items(&self, items: Vec<RawItem>) -> Result<usize> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        self.inner.insert_raw_items(items).await
    }
    async fn articles_published_since(&self, since: DateTime<Utc>) -> Result<Vec<Article>> {
        self.inner.articles_published_since(since).await
    }
    async fn save_enrichment(&self, article_id: i64, enrichment: &Enrichment) -> Result<()> {
        self.inner.save_enrichment(article_id, enrichment).await
    }
    async fn articles_by_ids(&self, ids: &[i64]) -> Result<Vec<Article>> {
        self.inner.articles_by_ids(ids).await
    }
    async fn digest_for(&self, user_id: i64, date: NaiveDate) -> Result<Option<Digest>> {
        self.inner.digest_for(user_id, date).await
    }
    async fn insert_digest(&self, digest: NewDigest) -> Result<Option<Digest>> {
        self.inner.insert_digest(digest).await
    }
    async fn pending_digests(&self, date: NaiveDate) -> Result<Vec<PendingDelivery>> {
        self.inner.pending_digests(date).await
    }
    async fn claim_delivery(
        &self,
        digest_id: i64,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.claim_delivery(digest_id, now, stale_before).await
    }
    async fn release_delivery(&self, digest_id: i64) -> Result<()> {
        self.inner.release_delivery(digest_id).await
    }
    async fn mark_delivered(&self, digest_id: i64) -> Result<()> {
        self.inner.mark_delivered(digest_id).await
    }
}

#[tokio::test]
async fn store_failure_on_one_source_keeps_the_rest() {
    let store = FirstInsertFails::default();
    let scrapers = vec![blog(), youtube()];

    let report = run_ingestion(&scrapers, &store, 1).await;
    assert_eq!(report.sources.len(), 2);
    assert!(report.sources[0].error.as_deref().unwrap().contains("database is locked"));
    assert_eq!(report.sources[0].inserted, 0);
    assert_eq!(report.sources[1].error, None);
    assert_eq!(report.sources[1].inserted, 3);
    assert_eq!(report.failed_sources(), 1);
    assert_eq!(store.inner.articles().await.len(), 3);

    // The lost source is picked up on the next run.
    let retry = run_ingestion(&scrapers, &store, 1).await;
    assert_eq!(retry.inserted(), 3);
    assert_eq!(store.inner.articles().await.len(), 6);
}

#[test]
fn ingestion_future_is_send() {
    fn assert_send<T: Send>(_: T) {}
    let store = MemoryStore::new();
    let scrapers = vec![blog(), youtube()];
    assert_send(run_ingestion(&scrapers, &store, 2));
}
