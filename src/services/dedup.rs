use std::sync::Arc;

use crate::db::ArticleStore;
use crate::error::Result;

/// Existence check that keeps known articles away from extraction and
/// summarization.
#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn ArticleStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    pub async fn is_known(&self, link: &str) -> Result<bool> {
        let known = self.store.contains_link(link).await?;
        if known {
            tracing::debug!("Article already stored, skipping: {}", link);
        }
        Ok(known)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Repository;
    use crate::models::{Article, FeedItem, FeedRef};

    #[tokio::test]
    async fn reports_stored_links_only() {
        let repo = Arc::new(Repository::in_memory().await.unwrap());
        let feed = FeedRef {
            url: "https://example.com/feed".into(),
            id: None,
            name: "Example".into(),
        };
        let article = Article::ingested(&feed, &FeedItem::default(), "https://example.com/a", "x".into());
        repo.upsert_article(&article).await.unwrap();

        let gate = DedupGate::new(repo);
        tokio_test::assert_ok!(gate.is_known("https://example.com/a").await);
        assert!(gate.is_known("https://example.com/a").await.unwrap());
        assert!(!gate.is_known("https://example.com/b").await.unwrap());
    }
}
