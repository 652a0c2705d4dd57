// src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::topics::Topic;

/// Raw item as produced by a scraper. `url` is the natural identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub url: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String, // e.g., "Blog", "YouTube", "Newsletter"
}

/// Persisted article: the raw item plus (optional) enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub summary: Option<String>,
    pub takeaways: Vec<String>,
    pub topic: Option<Topic>,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Missing summary or topic means the article still needs enrichment.
    pub fn needs_enrichment(&self) -> bool {
        self.topic.is_none() || self.summary.as_deref().map_or(true, |s| s.trim().is_empty())
    }

    pub fn apply(&mut self, e: &Enrichment) {
        self.summary = Some(e.summary.clone());
        self.takeaways = e.takeaways.to_vec();
        self.topic = Some(e.topic);
    }
}

/// Validated enrichment output. Always exactly three takeaways.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Enrichment {
    pub summary: String,
    pub takeaways: [String; 3],
    pub topic: Topic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Digest {
    pub id: i64,
    pub user_id: i64,
    pub generated_date: NaiveDate,
    pub overview: String,
    pub article_ids: Vec<i64>,
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDigest {
    pub user_id: i64,
    pub generated_date: NaiveDate,
    pub overview: String,
    pub article_ids: Vec<i64>,
}

/// Undelivered digest joined with its recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelivery {
    pub digest: Digest,
    pub email: String,
}
