use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FeedItem, Subscription};

/// The source an article was ingested from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRef {
    pub url: String,
    pub id: Option<i64>,
    pub name: String,
}

impl From<&Subscription> for FeedRef {
    fn from(sub: &Subscription) -> Self {
        Self {
            url: sub.url.clone(),
            id: Some(sub.id),
            name: sub.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub link: String,
    pub feed_url: String,
    pub feed_id: Option<i64>,
    pub feed_name: String,
    pub title: String,
    pub pub_date: DateTime<Utc>,
    pub content: String,
    pub summary: Option<String>,
    pub sent_to_gemini: bool,
    pub extraction_failed: bool,
    pub summary_attempts: u32,
    pub processed_at: DateTime<Utc>,
}

impl Article {
    /// A freshly ingested article awaiting its summary.
    pub fn ingested(feed: &FeedRef, item: &FeedItem, link: &str, content: String) -> Self {
        let now = Utc::now();
        Self {
            link: link.to_string(),
            feed_url: feed.url.clone(),
            feed_id: feed.id,
            feed_name: feed.name.clone(),
            title: item.title.clone(),
            pub_date: item.pub_date.unwrap_or(now),
            content,
            summary: None,
            sent_to_gemini: false,
            extraction_failed: false,
            summary_attempts: 0,
            processed_at: now,
        }
    }

    /// An article whose page could not be extracted; keeps the feed's own text.
    pub fn fallback(feed: &FeedRef, item: &FeedItem, link: &str) -> Self {
        Self {
            extraction_failed: true,
            ..Self::ingested(feed, item, link, item.fallback_text())
        }
    }

    /// Whether the summarize sweep should pick this article up.
    ///
    /// `max_attempts == 0` disables the attempt cap.
    pub fn needs_summary(&self, max_attempts: u32) -> bool {
        self.summary.is_none()
            && !self.content.trim().is_empty()
            && (max_attempts == 0 || self.summary_attempts < max_attempts)
    }
}
