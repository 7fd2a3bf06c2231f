pub const SCHEMA: &str = r#"
-- subscriptions table
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- articles table, keyed by the article link
CREATE TABLE IF NOT EXISTS articles (
    link TEXT PRIMARY KEY NOT NULL,
    feed_url TEXT NOT NULL,
    feed_id INTEGER,
    feed_name TEXT NOT NULL,
    title TEXT NOT NULL,
    pub_date TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    summary TEXT,
    sent_to_gemini INTEGER NOT NULL DEFAULT 0,
    extraction_failed INTEGER NOT NULL DEFAULT 0,
    summary_attempts INTEGER NOT NULL DEFAULT 0,
    processed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_feed_id ON articles(feed_id);
CREATE INDEX IF NOT EXISTS idx_articles_feed_url ON articles(feed_url);
CREATE INDEX IF NOT EXISTS idx_articles_pub_date ON articles(pub_date DESC);
CREATE INDEX IF NOT EXISTS idx_articles_unsummarized ON articles(processed_at) WHERE summary IS NULL;
"#;
