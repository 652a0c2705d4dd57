// src/store/memory.rs
//! In-memory `Store` for tests and dry runs. Same uniqueness rules as SQLite.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use super::Store;
use crate::models::{Article, Digest, Enrichment, NewDigest, PendingDelivery, RawItem, User};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    articles: Vec<Article>,
    urls: HashSet<String>,
    digests: Vec<Digest>,
    claims: HashMap<i64, DateTime<Utc>>,
    next_user_id: i64,
    next_article_id: i64,
    next_digest_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all digests (test helper).
    pub async fn digests(&self) -> Vec<Digest> {
        self.inner.lock().await.digests.clone()
    }

    /// Snapshot of all articles (test helper).
    pub async fn articles(&self) -> Vec<Article> {
        self.inner.lock().await.articles.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn users(&self) -> Result<Vec<User>> {
        Ok(self.inner.lock().await.users.clone())
    }

    async fn upsert_user(&self, email: &str, interests: &[String]) -> Result<User> {
        let mut g = self.inner.lock().await;
        if let Some(u) = g.users.iter_mut().find(|u| u.email == email) {
            u.interests = interests.to_vec();
            return Ok(u.clone());
        }
        g.next_user_id += 1;
        let user = User {
            id: g.next_user_id,
            email: email.to_string(),
            interests: interests.to_vec(),
        };
        g.users.push(user.clone());
        Ok(user)
    }

    async fn set_user_interests(&self, user_id: i64, interests: &[String]) -> Result<()> {
        let mut g = self.inner.lock().await;
        let user = g
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| anyhow!("user {user_id} not found"))?;
        user.interests = interests.to_vec();
        Ok(())
    }

    async fn insert_raw_items(&self, items: Vec<RawItem>) -> Result<usize> {
        let mut g = self.inner.lock().await;
        let mut inserted = 0;
        for item in items {
            if !g.urls.insert(item.url.clone()) {
                continue;
            }
            g.next_article_id += 1;
            let article = Article {
                id: g.next_article_id,
                title: item.title,
                url: item.url,
                content: item.content,
                published_at: item.published_at,
                source_name: item.source_name,
                summary: None,
                takeaways: Vec::new(),
                topic: None,
                created_at: Utc::now(),
            };
            g.articles.push(article);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn articles_published_since(&self, since: DateTime<Utc>) -> Result<Vec<Article>> {
        let g = self.inner.lock().await;
        Ok(g.articles
            .iter()
            .filter(|a| a.published_at >= since)
            .cloned()
            .collect())
    }

    async fn save_enrichment(&self, article_id: i64, enrichment: &Enrichment) -> Result<()> {
        let mut g = self.inner.lock().await;
        let article = g
            .articles
            .iter_mut()
            .find(|a| a.id == article_id)
            .ok_or_else(|| anyhow!("article {article_id} not found"))?;
        article.apply(enrichment);
        Ok(())
    }

    async fn articles_by_ids(&self, ids: &[i64]) -> Result<Vec<Article>> {
        let g = self.inner.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| g.articles.iter().find(|a| a.id == *id).cloned())
            .collect())
    }

    async fn digest_for(&self, user_id: i64, date: NaiveDate) -> Result<Option<Digest>> {
        let g = self.inner.lock().await;
        Ok(g.digests
            .iter()
            .find(|d| d.user_id == user_id && d.generated_date == date)
            .cloned())
    }

    async fn insert_digest(&self, digest: NewDigest) -> Result<Option<Digest>> {
        let mut g = self.inner.lock().await;
        if g
            .digests
            .iter()
            .any(|d| d.user_id == digest.user_id && d.generated_date == digest.generated_date)
        {
            return Ok(None);
        }
        g.next_digest_id += 1;
        let stored = Digest {
            id: g.next_digest_id,
            user_id: digest.user_id,
            generated_date: digest.generated_date,
            overview: digest.overview,
            article_ids: digest.article_ids,
            delivered: false,
        };
        g.digests.push(stored.clone());
        Ok(Some(stored))
    }

    async fn pending_digests(&self, date: NaiveDate) -> Result<Vec<PendingDelivery>> {
        let g = self.inner.lock().await;
        let mut out = Vec::new();
        for d in g.digests.iter().filter(|d| d.generated_date == date && !d.delivered) {
            let user = g
                .users
                .iter()
                .find(|u| u.id == d.user_id)
                .ok_or_else(|| anyhow!("digest {} references missing user {}", d.id, d.user_id))?;
            out.push(PendingDelivery {
                digest: d.clone(),
                email: user.email.clone(),
            });
        }
        Ok(out)
    }

    async fn claim_delivery(
        &self,
        digest_id: i64,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let mut g = self.inner.lock().await;
        let delivered = g
            .digests
            .iter()
            .find(|d| d.id == digest_id)
            .map(|d| d.delivered)
            .ok_or_else(|| anyhow!("digest {digest_id} not found"))?;
        if delivered || g.claims.get(&digest_id).is_some_and(|at| *at >= stale_before) {
            return Ok(false);
        }
        g.claims.insert(digest_id, now);
        Ok(true)
    }

    async fn release_delivery(&self, digest_id: i64) -> Result<()> {
        self.inner.lock().await.claims.remove(&digest_id);
        Ok(())
    }

    async fn mark_delivered(&self, digest_id: i64) -> Result<()> {
        let mut g = self.inner.lock().await;
        let d = g
            .digests
            .iter_mut()
            .find(|d| d.id == digest_id)
            .ok_or_else(|| anyhow!("digest {digest_id} not found"))?;
        d.delivered = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(url: &str) -> RawItem {
        RawItem {
            title: "t".into(),
            url: url.into(),
            content: "c".into(),
            published_at: Utc::now(),
            source_name: "Blog".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_urls_are_skipped() {
        let s = MemoryStore::new();
        assert_eq!(s.insert_raw_items(vec![raw("a"), raw("b")]).await.unwrap(), 2);
        assert_eq!(s.insert_raw_items(vec![raw("b"), raw("c")]).await.unwrap(), 1);
        assert_eq!(s.articles().await.len(), 3);
    }

    #[tokio::test]
    async fn second_digest_for_same_day_is_rejected() {
        let s = MemoryStore::new();
        let u = s.upsert_user("a@b.c", &[]).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let nd = NewDigest {
            user_id: u.id,
            generated_date: day,
            overview: "o".into(),
            article_ids: vec![],
        };
        assert!(s.insert_digest(nd.clone()).await.unwrap().is_some());
        assert!(s.insert_digest(nd).await.unwrap().is_none());
        assert_eq!(s.digests().await.len(), 1);
    }

    #[tokio::test]
    async fn upsert_matches_by_email() {
        let s = MemoryStore::new();
        let a = s.upsert_user("x@y.z", &["ai".into()]).await.unwrap();
        let b = s.upsert_user("x@y.z", &["vc".into()]).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(s.users().await.unwrap()[0].interests, vec!["vc".to_string()]);
    }
}
