use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;

use crate::db::{ArticleStore, SubscriptionStore};
use crate::error::Result;
use crate::feed::FeedSource;
use crate::models::{Article, FeedItem, FeedRef};
use crate::services::{ContentExtractor, DedupGate};

/// Concurrency ceilings and timeouts for one fetch sweep.
#[derive(Debug, Clone, Copy)]
pub struct FanOutLimits {
    pub feed_concurrency: usize,
    pub article_concurrency: usize,
    pub fetch_timeout: Duration,
    pub extraction_timeout: Duration,
}

impl Default for FanOutLimits {
    fn default() -> Self {
        Self {
            feed_concurrency: 5,
            article_concurrency: 5,
            fetch_timeout: Duration::from_secs(30),
            extraction_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchStats {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub new_articles: usize,
    /// New articles stored with feed text because extraction failed.
    pub fallbacks: usize,
    pub duplicates: usize,
    pub without_link: usize,
    pub item_errors: usize,
}

impl FetchStats {
    fn merge(&mut self, other: &FetchStats) {
        self.sources_ok += other.sources_ok;
        self.sources_failed += other.sources_failed;
        self.new_articles += other.new_articles;
        self.fallbacks += other.fallbacks;
        self.duplicates += other.duplicates;
        self.without_link += other.without_link;
        self.item_errors += other.item_errors;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Stored,
    Fallback,
    Duplicate,
    NoLink,
}

/// Fetches every subscribed feed and stores articles it has not seen before.
///
/// Sources are processed in groups of `feed_concurrency`, and each group
/// finishes before the next one starts. Items inside a feed are grouped the
/// same way by `article_concurrency`. Failures stay inside the source or item
/// they happened in.
pub struct Ingestor {
    subscriptions: Arc<dyn SubscriptionStore>,
    articles: Arc<dyn ArticleStore>,
    dedup: DedupGate,
    source: Arc<dyn FeedSource>,
    extractor: Arc<dyn ContentExtractor>,
    limits: FanOutLimits,
}

impl Ingestor {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        articles: Arc<dyn ArticleStore>,
        source: Arc<dyn FeedSource>,
        extractor: Arc<dyn ContentExtractor>,
        limits: FanOutLimits,
    ) -> Self {
        Self {
            subscriptions,
            dedup: DedupGate::new(Arc::clone(&articles)),
            articles,
            source,
            extractor,
            limits,
        }
    }

    /// Process all subscriptions once. Only a failure to list the
    /// subscriptions is returned; everything else is logged and counted.
    pub async fn run_fetch_sweep(&self) -> Result<FetchStats> {
        let subscriptions = self.subscriptions.list_subscriptions().await?;
        if subscriptions.is_empty() {
            tracing::debug!("No subscriptions to fetch");
            return Ok(FetchStats::default());
        }

        tracing::info!("Fetching {} subscribed feeds", subscriptions.len());

        let mut stats = FetchStats::default();
        for group in subscriptions.chunks(self.limits.feed_concurrency.max(1)) {
            let results = join_all(group.iter().map(|sub| self.process_source(FeedRef::from(sub)))).await;
            for result in &results {
                stats.merge(result);
            }
        }

        tracing::info!(
            "Fetch sweep completed: {} feeds ok, {} failed, {} new articles ({} from feed text), {} already known",
            stats.sources_ok,
            stats.sources_failed,
            stats.new_articles,
            stats.fallbacks,
            stats.duplicates
        );
        Ok(stats)
    }

    /// Process one source on demand, e.g. right after subscribing.
    pub async fn run_single_source_fetch(&self, url: &str, name: &str) -> Result<FetchStats> {
        let feed = match self.subscriptions.find_subscription_by_url(url).await? {
            Some(sub) => FeedRef {
                name: name.to_string(),
                ..FeedRef::from(&sub)
            },
            None => FeedRef {
                url: url.to_string(),
                id: None,
                name: name.to_string(),
            },
        };

        Ok(self.process_source(feed).await)
    }

    async fn process_source(&self, feed: FeedRef) -> FetchStats {
        let parsed = match timeout(self.limits.fetch_timeout, self.source.fetch(&feed.url)).await {
            Ok(Ok(parsed)) => parsed,
            Ok(Err(e)) => {
                tracing::warn!("{}", e);
                return FetchStats {
                    sources_failed: 1,
                    ..Default::default()
                };
            }
            Err(_) => {
                tracing::warn!(
                    "Timed out fetching {} after {:?}",
                    feed.url,
                    self.limits.fetch_timeout
                );
                return FetchStats {
                    sources_failed: 1,
                    ..Default::default()
                };
            }
        };

        tracing::info!(
            "Fetched feed: {} ({}, {} items)",
            parsed.title.as_deref().unwrap_or(&feed.name),
            feed.url,
            parsed.items.len()
        );

        // A link listed twice in one feed is processed once.
        let mut seen = HashSet::new();
        let items: Vec<&FeedItem> = parsed
            .items
            .iter()
            .filter(|item| item.link.as_deref().map_or(true, |link| seen.insert(link)))
            .collect();

        let mut stats = FetchStats {
            sources_ok: 1,
            duplicates: parsed.items.len() - items.len(),
            ..Default::default()
        };

        for group in items.chunks(self.limits.article_concurrency.max(1)) {
            let outcomes = join_all(group.iter().map(|item| self.process_item(&feed, item))).await;

            for (item, outcome) in group.iter().zip(outcomes) {
                match outcome {
                    Ok(ItemOutcome::Stored) => stats.new_articles += 1,
                    Ok(ItemOutcome::Fallback) => {
                        stats.new_articles += 1;
                        stats.fallbacks += 1;
                    }
                    Ok(ItemOutcome::Duplicate) => stats.duplicates += 1,
                    Ok(ItemOutcome::NoLink) => stats.without_link += 1,
                    Err(e) => {
                        tracing::warn!(
                            "Failed to process item {} from {}: {}",
                            item.link.as_deref().unwrap_or(&item.title),
                            feed.url,
                            e
                        );
                        stats.item_errors += 1;
                    }
                }
            }
        }

        stats
    }

    async fn process_item(&self, feed: &FeedRef, item: &FeedItem) -> Result<ItemOutcome> {
        let Some(link) = item.link.as_deref() else {
            tracing::debug!("Skipping item without link: {}", item.title);
            return Ok(ItemOutcome::NoLink);
        };

        if self.dedup.is_known(link).await? {
            return Ok(ItemOutcome::Duplicate);
        }

        let article = match timeout(self.limits.extraction_timeout, self.extractor.extract(link)).await {
            Ok(Ok(content)) => Article::ingested(feed, item, link, content),
            Ok(Err(e)) => {
                tracing::debug!("{}; keeping feed text", e);
                Article::fallback(feed, item, link)
            }
            Err(_) => {
                tracing::debug!("Extraction of {} timed out; keeping feed text", link);
                Article::fallback(feed, item, link)
            }
        };

        self.articles.upsert_article(&article).await?;
        tracing::debug!("Stored article: {} - {}", article.title, link);

        Ok(if article.extraction_failed {
            ItemOutcome::Fallback
        } else {
            ItemOutcome::Stored
        })
    }
}
