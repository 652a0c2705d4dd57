use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::schema::SCHEMA;
use super::Store;
use crate::models::{Article, Digest, Enrichment, NewDigest, PendingDelivery, RawItem, User};
use crate::topics::Topic;

const ARTICLE_COLUMNS: &str =
    "id, title, url, content, published_at, source_name, summary, takeaways, topic, created_at";
const DIGEST_COLUMNS: &str = "id, user_id, generated_date, overview, article_ids, delivered";
const DATE_FMT: &str = "%Y-%m-%d";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub async fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating database dir {}", parent.display()))?;
            }
        }
        let conn = Connection::open(db_path)
            .await
            .with_context(|| format!("opening sqlite database {db_path}"))?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .context("opening in-memory sqlite")?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .context("applying schema")?;
        Ok(Self { conn })
    }
}

// Raw column values; JSON/date decoding happens outside the connection thread.
struct ArticleRow {
    id: i64,
    title: String,
    url: String,
    content: String,
    published_at: String,
    source_name: String,
    summary: Option<String>,
    takeaways: String,
    topic: Option<String>,
    created_at: String,
}

fn article_row(row: &Row) -> rusqlite::Result<ArticleRow> {
    Ok(ArticleRow {
        id: row.get(0)?,
        title: row.get(1)?,
        url: row.get(2)?,
        content: row.get(3)?,
        published_at: row.get(4)?,
        source_name: row.get(5)?,
        summary: row.get(6)?,
        takeaways: row.get(7)?,
        topic: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl TryFrom<ArticleRow> for Article {
    type Error = anyhow::Error;

    fn try_from(r: ArticleRow) -> Result<Self> {
        Ok(Article {
            id: r.id,
            published_at: parse_datetime(&r.published_at)
                .with_context(|| format!("article {} published_at {:?}", r.id, r.published_at))?,
            takeaways: serde_json::from_str(&r.takeaways)
                .with_context(|| format!("article {} takeaways", r.id))?,
            // Unknown stored labels read as "not enriched" and get re-enriched.
            topic: r.topic.as_deref().and_then(|t| t.parse::<Topic>().ok()),
            created_at: parse_datetime(&r.created_at).unwrap_or_else(Utc::now),
            title: r.title,
            url: r.url,
            content: r.content,
            source_name: r.source_name,
            summary: r.summary,
        })
    }
}

struct DigestRow {
    id: i64,
    user_id: i64,
    generated_date: String,
    overview: String,
    article_ids: String,
    delivered: bool,
}

fn digest_row(row: &Row) -> rusqlite::Result<DigestRow> {
    Ok(DigestRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        generated_date: row.get(2)?,
        overview: row.get(3)?,
        article_ids: row.get(4)?,
        delivered: row.get::<_, i64>(5)? != 0,
    })
}

impl TryFrom<DigestRow> for Digest {
    type Error = anyhow::Error;

    fn try_from(r: DigestRow) -> Result<Self> {
        Ok(Digest {
            id: r.id,
            user_id: r.user_id,
            generated_date: NaiveDate::parse_from_str(&r.generated_date, DATE_FMT)
                .with_context(|| format!("digest {} generated_date", r.id))?,
            overview: r.overview,
            article_ids: serde_json::from_str(&r.article_ids)
                .with_context(|| format!("digest {} article_ids", r.id))?,
            delivered: r.delivered,
        })
    }
}

fn user_from_parts(id: i64, email: String, interests: &str) -> Result<User> {
    Ok(User {
        id,
        email,
        interests: serde_json::from_str(interests)
            .with_context(|| format!("user {id} interests"))?,
    })
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339 first (e.g., "2026-01-11T12:34:56Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format (e.g., "2026-01-11 12:34:56")
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn fmt_datetime(dt: DateTime<Utc>) -> String {
    // Fixed-width UTC form so text comparison matches time order.
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl Store for SqliteStore {
    async fn users(&self) -> Result<Vec<User>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id, email, interests FROM users ORDER BY id")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .context("listing users")?;
        rows.into_iter()
            .map(|(id, email, interests)| user_from_parts(id, email, &interests))
            .collect()
    }

    async fn upsert_user(&self, email: &str, interests: &[String]) -> Result<User> {
        let email = email.to_string();
        let interests_json = serde_json::to_string(interests)?;
        let (id, email, interests) = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO users (email, interests) VALUES (?1, ?2)
                       ON CONFLICT(email) DO UPDATE SET interests = excluded.interests"#,
                    params![email, interests_json],
                )?;
                let row = conn.query_row(
                    "SELECT id, email, interests FROM users WHERE email = ?1",
                    params![email],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
                )?;
                Ok(row)
            })
            .await
            .context("upserting user")?;
        user_from_parts(id, email, &interests)
    }

    async fn set_user_interests(&self, user_id: i64, interests: &[String]) -> Result<()> {
        let interests_json = serde_json::to_string(interests)?;
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE users SET interests = ?1 WHERE id = ?2",
                    params![interests_json, user_id],
                )?;
                Ok(n)
            })
            .await
            .context("updating user interests")?;
        anyhow::ensure!(changed == 1, "user {user_id} not found");
        Ok(())
    }

    async fn insert_raw_items(&self, items: Vec<RawItem>) -> Result<usize> {
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0usize;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT INTO articles (title, url, content, published_at, source_name)
                           VALUES (?1, ?2, ?3, ?4, ?5)
                           ON CONFLICT(url) DO NOTHING"#,
                    )?;
                    for it in items {
                        inserted += stmt.execute(params![
                            it.title,
                            it.url,
                            it.content,
                            fmt_datetime(it.published_at),
                            it.source_name,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await
            .context("inserting raw items")?;
        Ok(inserted)
    }

    async fn articles_published_since(&self, since: DateTime<Utc>) -> Result<Vec<Article>> {
        let since = fmt_datetime(since);
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE published_at >= ?1 ORDER BY id"
                ))?;
                let rows = stmt
                    .query_map(params![since], article_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .context("fetching recent articles")?;
        rows.into_iter().map(Article::try_from).collect()
    }

    async fn save_enrichment(&self, article_id: i64, enrichment: &Enrichment) -> Result<()> {
        let summary = enrichment.summary.clone();
        let takeaways = serde_json::to_string(&enrichment.takeaways)?;
        let topic = enrichment.topic.as_str();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET summary = ?1, takeaways = ?2, topic = ?3 WHERE id = ?4",
                    params![summary, takeaways, topic, article_id],
                )?;
                Ok(())
            })
            .await
            .with_context(|| format!("saving enrichment for article {article_id}"))?;
        Ok(())
    }

    async fn articles_by_ids(&self, ids: &[i64]) -> Result<Vec<Article>> {
        let ids = ids.to_vec();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"))?;
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(r) = stmt.query_row(params![id], article_row).optional()? {
                        out.push(r);
                    }
                }
                Ok(out)
            })
            .await
            .context("loading articles by id")?;
        rows.into_iter().map(Article::try_from).collect()
    }

    async fn digest_for(&self, user_id: i64, date: NaiveDate) -> Result<Option<Digest>> {
        let date = date.format(DATE_FMT).to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!(
                            "SELECT {DIGEST_COLUMNS} FROM digests WHERE user_id = ?1 AND generated_date = ?2"
                        ),
                        params![user_id, date],
                        digest_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .context("looking up digest")?;
        row.map(Digest::try_from).transpose()
    }

    async fn insert_digest(&self, digest: NewDigest) -> Result<Option<Digest>> {
        let date = digest.generated_date.format(DATE_FMT).to_string();
        let ids_json = serde_json::to_string(&digest.article_ids)?;
        let overview = digest.overview.clone();
        let user_id = digest.user_id;
        let id = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    r#"INSERT INTO digests (user_id, generated_date, overview, article_ids, delivered)
                       VALUES (?1, ?2, ?3, ?4, 0)
                       ON CONFLICT(user_id, generated_date) DO NOTHING"#,
                    params![user_id, date, overview, ids_json],
                )?;
                Ok((n == 1).then(|| conn.last_insert_rowid()))
            })
            .await
            .context("inserting digest")?;
        Ok(id.map(|id| Digest {
            id,
            user_id: digest.user_id,
            generated_date: digest.generated_date,
            overview: digest.overview,
            article_ids: digest.article_ids,
            delivered: false,
        }))
    }

    async fn pending_digests(&self, date: NaiveDate) -> Result<Vec<PendingDelivery>> {
        let date = date.format(DATE_FMT).to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT d.id, d.user_id, d.generated_date, d.overview, d.article_ids, d.delivered,
                              u.email
                       FROM digests d
                       JOIN users u ON u.id = d.user_id
                       WHERE d.generated_date = ?1 AND d.delivered = 0
                       ORDER BY d.id"#,
                )?;
                let rows = stmt
                    .query_map(params![date], |row| Ok((digest_row(row)?, row.get::<_, String>(6)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .context("listing pending digests")?;
        rows.into_iter()
            .map(|(d, email)| {
                Ok(PendingDelivery {
                    digest: Digest::try_from(d)?,
                    email,
                })
            })
            .collect()
    }

    async fn claim_delivery(
        &self,
        digest_id: i64,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let now = fmt_datetime(now);
        let stale_before = fmt_datetime(stale_before);
        let claimed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    r#"UPDATE digests SET claimed_at = ?1
                       WHERE id = ?2 AND delivered = 0
                         AND (claimed_at IS NULL OR claimed_at < ?3)"#,
                    params![now, digest_id, stale_before],
                )?;
                Ok(n == 1)
            })
            .await
            .with_context(|| format!("claiming digest {digest_id}"))?;
        Ok(claimed)
    }

    async fn release_delivery(&self, digest_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE digests SET claimed_at = NULL WHERE id = ?1 AND delivered = 0",
                    params![digest_id],
                )?;
                Ok(())
            })
            .await
            .with_context(|| format!("releasing digest {digest_id}"))?;
        Ok(())
    }

    async fn mark_delivered(&self, digest_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE digests SET delivered = 1 WHERE id = ?1 AND delivered = 0",
                    params![digest_id],
                )?;
                Ok(())
            })
            .await
            .with_context(|| format!("marking digest {digest_id} delivered"))?;
        Ok(())
    }
}
