//! Persistence for subscriptions and articles.
//!
//! The pipeline only sees the [`SubscriptionStore`] and [`ArticleStore`]
//! traits; [`Repository`] implements both on top of SQLite.

mod repository;
mod schema;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Article, Subscription};

pub use repository::Repository;

/// Selects the articles of one feed, by subscription id or by feed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKey {
    Id(i64),
    Url(String),
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>>;

    /// Inserts the subscription or renames the existing one with this URL.
    async fn upsert_subscription(&self, url: &str, name: &str) -> Result<i64>;

    async fn find_subscription_by_url(&self, url: &str) -> Result<Option<Subscription>>;

    /// Deletes the subscription and its articles. Returns the number of
    /// articles removed, or `None` if no such subscription exists.
    async fn delete_subscription(&self, id: i64) -> Result<Option<usize>>;

    async fn rename_subscription(&self, id: i64, name: &str) -> Result<bool>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Inserts or replaces the article with the same link. A stored summary is
    /// never cleared by an upsert that carries none.
    async fn upsert_article(&self, article: &Article) -> Result<()>;

    async fn find_article_by_link(&self, link: &str) -> Result<Option<Article>>;

    async fn contains_link(&self, link: &str) -> Result<bool> {
        Ok(self.find_article_by_link(link).await?.is_some())
    }

    async fn list_articles(&self) -> Result<Vec<Article>>;

    async fn list_articles_by_feed(&self, feed: &FeedKey) -> Result<Vec<Article>>;

    /// Sets the summary of an already stored article and refreshes
    /// `processed_at`. Only the summary columns are written, so rows removed or
    /// relinked since they were read are left alone. Returns `false` when no
    /// article has this link.
    async fn store_summary(&self, link: &str, summary: &str) -> Result<bool>;

    /// Counts a failed summarization attempt and refreshes `processed_at`.
    async fn record_summary_failure(&self, link: &str) -> Result<()>;
}
