// src/digest/mod.rs
//! Per-user digest pipeline: idempotency gate, enrichment on demand, soft
//! filter, ranking, overview, commit.

pub mod filter;
pub mod locks;

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use metrics::counter;
use tracing::{error, info, warn};

use crate::ai::EnrichmentGateway;
use crate::config::Settings;
use crate::models::{Article, Digest, NewDigest, User};
use crate::rank;
use crate::store::DynStore;
use filter::soft_filter;
use locks::UserLocks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderSettings {
    pub max_articles: usize,
    pub article_age_limit_days: i64,
    pub fallback_candidates: usize,
    pub enrich_concurrency: usize,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            max_articles: 5,
            article_age_limit_days: 7,
            fallback_candidates: 10,
            enrich_concurrency: 4,
        }
    }
}

impl From<&Settings> for BuilderSettings {
    fn from(s: &Settings) -> Self {
        Self {
            max_articles: s.max_articles_per_digest,
            article_age_limit_days: s.article_age_limit_days,
            fallback_candidates: s.fallback_candidates,
            enrich_concurrency: s.enrichment.concurrency,
        }
    }
}

/// Oldest publish time still eligible; saturates for out-of-range limits.
fn candidate_cutoff(now: DateTime<Utc>, age_limit_days: i64) -> DateTime<Utc> {
    Duration::try_days(age_limit_days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Created(Digest),
    AlreadyExists,
    NoCandidates,
    NothingSelected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub created: usize,
    pub already_existed: usize,
    pub skipped_empty: usize,
    pub failed: usize,
}

pub struct DigestBuilder {
    store: DynStore,
    gateway: Arc<EnrichmentGateway>,
    locks: UserLocks,
    cfg: BuilderSettings,
}

impl DigestBuilder {
    pub fn new(store: DynStore, gateway: Arc<EnrichmentGateway>, cfg: BuilderSettings) -> Self {
        Self {
            store,
            gateway,
            locks: UserLocks::new(),
            cfg,
        }
    }

    pub async fn build_for_user(&self, user: &User, now: DateTime<Utc>) -> Result<BuildOutcome> {
        let _guard = self.locks.lock(user.id).await;
        let today = now.date_naive();

        if self.store.digest_for(user.id, today).await?.is_some() {
            info!(target: "digest", user_id = user.id, %today, "digest already exists");
            return Ok(BuildOutcome::AlreadyExists);
        }

        let interests = self.gateway.topics().expand_interests(&user.interests);

        let since = candidate_cutoff(now, self.cfg.article_age_limit_days);
        let candidates = self
            .store
            .articles_published_since(since)
            .await
            .context("fetching candidate articles")?;
        if candidates.is_empty() {
            warn!(target: "digest", user_id = user.id, %since, "no candidate articles");
            return Ok(BuildOutcome::NoCandidates);
        }

        let enriched = self.enrich_missing(candidates).await;
        let filtered = soft_filter(enriched, &interests, self.cfg.fallback_candidates);
        // Ranking matches the subscriber's own words, not canonical ids.
        let raw_interests: BTreeSet<String> = user
            .interests
            .iter()
            .map(|i| i.trim().to_lowercase())
            .filter(|i| !i.is_empty())
            .collect();
        let selection: Vec<Article> = rank::rank(filtered, &raw_interests)
            .into_iter()
            .take(self.cfg.max_articles)
            .collect();
        if selection.is_empty() {
            warn!(target: "digest", user_id = user.id, "nothing selected");
            return Ok(BuildOutcome::NothingSelected);
        }

        let overview = self.gateway.overview(&selection, &user.interests).await;

        let new = NewDigest {
            user_id: user.id,
            generated_date: today,
            overview,
            article_ids: selection.iter().map(|a| a.id).collect(),
        };
        match self.store.insert_digest(new).await? {
            Some(digest) => {
                counter!("digests_created_total").increment(1);
                info!(
                    target: "digest",
                    user_id = user.id,
                    digest_id = digest.id,
                    articles = digest.article_ids.len(),
                    "digest created"
                );
                Ok(BuildOutcome::Created(digest))
            }
            None => {
                info!(target: "digest", user_id = user.id, %today, "digest committed concurrently elsewhere");
                Ok(BuildOutcome::AlreadyExists)
            }
        }
    }

    /// Enrich articles that lack summary or topic; order is preserved.
    async fn enrich_missing(&self, candidates: Vec<Article>) -> Vec<Article> {
        stream::iter(candidates)
            .map(|mut article| async move {
                if article.needs_enrichment() {
                    let text = if article.content.trim().is_empty() {
                        article.title.as_str()
                    } else {
                        article.content.as_str()
                    };
                    let enrichment = self.gateway.enrich(text).await;
                    if let Err(e) = self.store.save_enrichment(article.id, &enrichment).await {
                        warn!(target: "digest", article_id = article.id, error = ?e, "failed to persist enrichment");
                    }
                    article.apply(&enrichment);
                }
                article
            })
            .buffered(self.cfg.enrich_concurrency.max(1))
            .collect()
            .await
    }

    pub async fn build_for_all(&self, now: DateTime<Utc>) -> Result<BuildReport> {
        let users = self.store.users().await.context("listing users")?;
        let mut report = BuildReport::default();
        for user in &users {
            match self.build_for_user(user, now).await {
                Ok(BuildOutcome::Created(_)) => report.created += 1,
                Ok(BuildOutcome::AlreadyExists) => report.already_existed += 1,
                Ok(BuildOutcome::NoCandidates | BuildOutcome::NothingSelected) => report.skipped_empty += 1,
                Err(e) => {
                    report.failed += 1;
                    counter!("digest_build_errors_total").increment(1);
                    error!(target: "digest", user_id = user.id, error = ?e, "digest build failed");
                }
            }
        }
        info!(
            target: "digest",
            users = users.len(),
            created = report.created,
            already_existed = report.already_existed,
            skipped_empty = report.skipped_empty,
            failed = report.failed,
            "digest stage finished"
        );
        Ok(report)
    }
}
