pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- users table
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    interests TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- articles table (raw item + enrichment columns)
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL DEFAULT '',
    published_at TEXT NOT NULL,
    source_name TEXT NOT NULL,
    summary TEXT,
    takeaways TEXT NOT NULL DEFAULT '[]',
    topic TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at);
CREATE INDEX IF NOT EXISTS idx_articles_topic ON articles(topic);

-- digests table: one per user per day
CREATE TABLE IF NOT EXISTS digests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    generated_date TEXT NOT NULL,
    overview TEXT NOT NULL,
    article_ids TEXT NOT NULL DEFAULT '[]',
    delivered INTEGER NOT NULL DEFAULT 0,
    claimed_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, generated_date)
);

CREATE INDEX IF NOT EXISTS idx_digests_pending ON digests(generated_date, delivered);
"#;
