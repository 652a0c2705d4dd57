// src/maintenance.rs
//! Admin tasks behind the `seed-users` and `canonicalize-interests` binaries.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::Store;
use crate::topics::TopicTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub email: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    users: Vec<SeedUser>,
}

/// Parse `[[users]]` TOML, or a JSON array / `{"users": [...]}` object.
pub fn parse_seed_users(s: &str, hint_ext: &str) -> Result<Vec<SeedUser>> {
    let users = match hint_ext {
        "json" => parse_json(s)?,
        "toml" => toml::from_str::<SeedFile>(s).context("parsing users toml")?.users,
        _ => toml::from_str::<SeedFile>(s)
            .map(|f| f.users)
            .or_else(|_| parse_json(s))
            .map_err(|_| anyhow!("unsupported users format"))?,
    };
    for u in &users {
        if !u.email.contains('@') {
            bail!("invalid email {:?}", u.email);
        }
    }
    Ok(users)
}

fn parse_json(s: &str) -> Result<Vec<SeedUser>> {
    if let Ok(list) = serde_json::from_str::<Vec<SeedUser>>(s) {
        return Ok(list);
    }
    Ok(serde_json::from_str::<SeedFile>(s).context("parsing users json")?.users)
}

pub fn load_seed_users(path: &Path) -> Result<Vec<SeedUser>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading users from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_seed_users(&content, ext.as_str())
}

/// Upsert each user by email. Returns how many were written.
pub async fn seed_users(store: &dyn Store, users: &[SeedUser]) -> Result<usize> {
    for u in users {
        let email = u.email.trim().to_ascii_lowercase();
        let interests: Vec<String> = u
            .interests
            .iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        let user = store
            .upsert_user(&email, &interests)
            .await
            .with_context(|| format!("upserting {email}"))?;
        info!(user_id = user.id, email = %user.email, interests = ?user.interests, "user seeded");
    }
    Ok(users.len())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalizeReport {
    pub updated: usize,
    pub unchanged: usize,
}

/// Rewrite interests to canonical topic ids when at least one interest maps
/// and the resulting set differs from the stored one.
pub async fn canonicalize_interests(store: &dyn Store, topics: &TopicTable) -> Result<CanonicalizeReport> {
    let mut report = CanonicalizeReport::default();
    for user in store.users().await.context("listing users")? {
        let canonical = topics.canonicalize_interests(&user.interests);
        let current: BTreeSet<&str> = user.interests.iter().map(String::as_str).collect();
        let next: BTreeSet<&str> = canonical.iter().map(String::as_str).collect();
        if canonical.is_empty() || current == next {
            report.unchanged += 1;
            continue;
        }
        info!(user_id = user.id, from = ?user.interests, to = ?canonical, "canonicalizing interests");
        store.set_user_interests(user.id, &canonical).await?;
        report.updated += 1;
    }
    info!(updated = report.updated, unchanged = report.unchanged, "interest canonicalization finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn parses_toml_and_json_forms() {
        let toml = r#"
[[users]]
email = "a@example.com"
interests = ["LLMs", "MLOps"]
"#;
        let u = parse_seed_users(toml, "toml").unwrap();
        assert_eq!(u[0].interests, vec!["LLMs", "MLOps"]);

        let json = r#"[{"email": "b@example.com", "interests": ["VC"]}]"#;
        assert_eq!(parse_seed_users(json, "json").unwrap()[0].email, "b@example.com");
        let wrapped = r#"{"users": [{"email": "c@example.com"}]}"#;
        assert!(parse_seed_users(wrapped, "").unwrap()[0].interests.is_empty());

        assert!(parse_seed_users(r#"[{"email": "nope"}]"#, "json").is_err());
    }

    #[tokio::test]
    async fn seeding_twice_updates_in_place() {
        let store = MemoryStore::new();
        let users = vec![SeedUser {
            email: " A@Example.com ".into(),
            interests: vec!["LLMs".into(), " ".into()],
        }];
        seed_users(&store, &users).await.unwrap();
        seed_users(&store, &users).await.unwrap();
        let all = store.users().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].email, "a@example.com");
        assert_eq!(all[0].interests, vec!["LLMs"]);
    }

    #[tokio::test]
    async fn canonicalize_rewrites_only_when_needed() {
        let store = MemoryStore::new();
        let topics = TopicTable::default_seed();
        store.upsert_user("a@x.io", &["LLMs".into(), "ChatGPT".into(), "MLOps".into()]).await.unwrap();
        store.upsert_user("b@x.io", &["ai".into()]).await.unwrap();
        store.upsert_user("c@x.io", &["gardening".into()]).await.unwrap();

        let r = canonicalize_interests(&store, &topics).await.unwrap();
        assert_eq!(r, CanonicalizeReport { updated: 1, unchanged: 2 });
        let users = store.users().await.unwrap();
        assert_eq!(users[0].interests, vec!["ai", "mlops"]);
        assert_eq!(users[2].interests, vec!["gardening"]);
    }
}
