use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, Subscription};

use super::schema::SCHEMA;
use super::{ArticleStore, FeedKey, SubscriptionStore};

const ARTICLE_COLUMNS: &str = "link, feed_url, feed_id, feed_name, title, pub_date, content, summary, \
     sent_to_gemini, extraction_failed, summary_attempts, processed_at";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Points articles at the subscription whose URL matches their `feed_url`,
    /// refreshing `feed_id` and `feed_name`. Returns `(updated, skipped)`.
    pub async fn backfill_feed_refs(&self) -> Result<(usize, usize)> {
        let counts = self
            .conn
            .call(|conn| {
                let total: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                let updated = conn.execute(
                    r#"UPDATE articles SET
                           feed_id = (SELECT s.id FROM subscriptions s WHERE s.url = articles.feed_url),
                           feed_name = (SELECT s.name FROM subscriptions s WHERE s.url = articles.feed_url)
                       WHERE feed_url IN (SELECT url FROM subscriptions)"#,
                    [],
                )?;
                Ok((updated, (total as usize).saturating_sub(updated)))
            })
            .await?;
        Ok(counts)
    }
}

#[async_trait]
impl SubscriptionStore for Repository {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let subs = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT id, url, name FROM subscriptions ORDER BY name")?;
                let subs = stmt
                    .query_map([], subscription_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(subs)
            })
            .await?;
        Ok(subs)
    }

    async fn upsert_subscription(&self, url: &str, name: &str) -> Result<i64> {
        let url = url.to_string();
        let name = name.to_string();
        let id = self
            .conn
            .call(move |conn| {
                let id = conn.query_row(
                    r#"INSERT INTO subscriptions (url, name) VALUES (?1, ?2)
                       ON CONFLICT(url) DO UPDATE SET name = excluded.name
                       RETURNING id"#,
                    params![url, name],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    async fn find_subscription_by_url(&self, url: &str) -> Result<Option<Subscription>> {
        let url = url.to_string();
        let sub = self
            .conn
            .call(move |conn| {
                let sub = conn
                    .query_row(
                        "SELECT id, url, name FROM subscriptions WHERE url = ?1",
                        params![url],
                        subscription_from_row,
                    )
                    .optional()?;
                Ok(sub)
            })
            .await?;
        Ok(sub)
    }

    async fn delete_subscription(&self, id: i64) -> Result<Option<usize>> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let url: Option<String> = tx
                    .query_row(
                        "SELECT url FROM subscriptions WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(url) = url else {
                    return Ok(None);
                };

                let articles = tx.execute(
                    "DELETE FROM articles WHERE feed_id = ?1 OR feed_url = ?2",
                    params![id, url],
                )?;
                tx.execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(Some(articles))
            })
            .await?;
        Ok(deleted)
    }

    async fn rename_subscription(&self, id: i64, name: &str) -> Result<bool> {
        let name = name.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE subscriptions SET name = ?1 WHERE id = ?2",
                    params![name, id],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(changed)
    }
}

#[async_trait]
impl ArticleStore for Repository {
    async fn upsert_article(&self, article: &Article) -> Result<()> {
        let article = article.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO articles (link, feed_url, feed_id, feed_name, title, pub_date, content,
                                            summary, sent_to_gemini, extraction_failed, summary_attempts, processed_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                       ON CONFLICT(link) DO UPDATE SET
                           feed_url = excluded.feed_url,
                           feed_id = excluded.feed_id,
                           feed_name = excluded.feed_name,
                           title = excluded.title,
                           pub_date = excluded.pub_date,
                           content = excluded.content,
                           summary = COALESCE(excluded.summary, articles.summary),
                           sent_to_gemini = COALESCE(excluded.summary, articles.summary) IS NOT NULL,
                           extraction_failed = excluded.extraction_failed,
                           summary_attempts = excluded.summary_attempts,
                           processed_at = excluded.processed_at"#,
                    params![
                        article.link,
                        article.feed_url,
                        article.feed_id,
                        article.feed_name,
                        article.title,
                        article.pub_date.to_rfc3339(),
                        article.content,
                        article.summary,
                        article.sent_to_gemini,
                        article.extraction_failed,
                        article.summary_attempts,
                        article.processed_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn find_article_by_link(&self, link: &str) -> Result<Option<Article>> {
        let link = link.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE link = ?1");
                let article = conn
                    .query_row(&sql, params![link], article_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    async fn contains_link(&self, link: &str) -> Result<bool> {
        let link = link.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM articles WHERE link = ?1)",
                    params![link],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(|conn| {
                let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY pub_date DESC");
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map([], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    async fn list_articles_by_feed(&self, feed: &FeedKey) -> Result<Vec<Article>> {
        let feed = feed.clone();
        let articles = self
            .conn
            .call(move |conn| {
                let (filter, key) = match feed {
                    FeedKey::Id(id) => ("feed_id = ?1", rusqlite::types::Value::Integer(id)),
                    FeedKey::Url(url) => ("feed_url = ?1", rusqlite::types::Value::Text(url)),
                };
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {filter} ORDER BY pub_date DESC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params![key], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    async fn store_summary(&self, link: &str, summary: &str) -> Result<bool> {
        let link = link.to_string();
        let summary = summary.to_string();
        let now = Utc::now().to_rfc3339();
        let updated = self
            .conn
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE articles SET summary = ?1, sent_to_gemini = 1, processed_at = ?2 WHERE link = ?3",
                    params![summary, now, link],
                )?;
                Ok(updated > 0)
            })
            .await?;
        Ok(updated)
    }

    async fn record_summary_failure(&self, link: &str) -> Result<()> {
        let link = link.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET summary_attempts = summary_attempts + 1, processed_at = ?1 WHERE link = ?2",
                    params![now, link],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn subscription_from_row(row: &Row) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        link: row.get(0)?,
        feed_url: row.get(1)?,
        feed_id: row.get(2)?,
        feed_name: row.get(3)?,
        title: row.get(4)?,
        pub_date: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        content: row.get(6)?,
        summary: row.get(7)?,
        sent_to_gemini: row.get(8)?,
        extraction_failed: row.get(9)?,
        summary_attempts: row.get(10)?,
        processed_at: row
            .get::<_, String>(11)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}
