//! Persistent store seam.
//!
//! Uniqueness is enforced here, not by callers: `url` for articles and
//! `(user_id, generated_date)` for digests.

pub mod memory;
pub mod schema;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{Article, Digest, Enrichment, NewDigest, PendingDelivery, RawItem, User};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn users(&self) -> Result<Vec<User>>;

    /// Insert a user or replace the interests of the existing one with the same email.
    async fn upsert_user(&self, email: &str, interests: &[String]) -> Result<User>;

    async fn set_user_interests(&self, user_id: i64, interests: &[String]) -> Result<()>;

    /// Insert raw items, skipping any whose url already exists. Returns how many were inserted.
    async fn insert_raw_items(&self, items: Vec<RawItem>) -> Result<usize>;

    /// Articles with `published_at >= since`, in insertion (id) order.
    async fn articles_published_since(&self, since: DateTime<Utc>) -> Result<Vec<Article>>;

    async fn save_enrichment(&self, article_id: i64, enrichment: &Enrichment) -> Result<()>;

    /// Articles for the given ids, in the order of `ids`. Missing ids are skipped.
    async fn articles_by_ids(&self, ids: &[i64]) -> Result<Vec<Article>>;

    async fn digest_for(&self, user_id: i64, date: NaiveDate) -> Result<Option<Digest>>;

    /// `Ok(None)` when a digest for `(user_id, generated_date)` already exists.
    async fn insert_digest(&self, digest: NewDigest) -> Result<Option<Digest>>;

    /// Undelivered digests generated on `date`, with recipient email.
    async fn pending_digests(&self, date: NaiveDate) -> Result<Vec<PendingDelivery>>;

    /// Take the delivery claim on an undelivered digest. Returns false when the
    /// digest is already delivered or another dispatcher holds a claim taken at or
    /// after `stale_before`; older claims count as abandoned and are taken over.
    async fn claim_delivery(
        &self,
        digest_id: i64,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool>;

    /// Drop the claim after a failed send so a later run can retry.
    async fn release_delivery(&self, digest_id: i64) -> Result<()>;

    /// Flip `delivered` to true. Idempotent.
    async fn mark_delivered(&self, digest_id: i64) -> Result<()>;
}

pub type DynStore = std::sync::Arc<dyn Store>;
