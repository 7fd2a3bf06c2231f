use std::path::Path;
use std::sync::Arc;

use crate::ai::{GeminiSummarizer, RateLimiter, SummaryProvider};
use crate::config::Config;
use crate::db::{ArticleStore, FeedKey, Repository, SubscriptionStore};
use crate::error::Result;
use crate::feed::{parse_opml_file, FeedFetcher};
use crate::models::{Article, Subscription};
use crate::pipeline::{
    FetchJob, FetchStats, Ingestor, Scheduler, SchedulerJob, SummarizeJob, SummarizeSweep,
    SweepStats,
};
use crate::services::ContentFetcher;

/// Wires the stores, fetchers and summarizer together and exposes the
/// operations the outside world calls.
pub struct App {
    config: Config,
    repository: Arc<Repository>,
    fetcher: Arc<FeedFetcher>,
    ingestor: Arc<Ingestor>,
    sweep: Arc<SummarizeSweep>,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);
        let fetcher = Arc::new(FeedFetcher::new(std::time::Duration::from_secs(
            config.fetch_timeout_secs,
        ))?);
        let extractor = Arc::new(ContentFetcher::new(std::time::Duration::from_secs(
            config.extraction_timeout_secs,
        ))?);

        let provider: Option<Arc<dyn SummaryProvider>> = match &config.gemini_api_key {
            Some(key) => {
                let summarizer =
                    GeminiSummarizer::new(key.clone(), &config.gemini_api_url, &config.gemini_model)?;
                tracing::info!("Summaries enabled with {}", summarizer.model_version());
                Some(Arc::new(summarizer) as Arc<dyn SummaryProvider>)
            }
            None => None,
        };
        let limiter = Arc::new(RateLimiter::new(provider, config.rate_limit_per_minute));

        let ingestor = Arc::new(Ingestor::new(
            repository.clone(),
            repository.clone(),
            fetcher.clone(),
            extractor,
            config.fan_out_limits(),
        ));
        let sweep = Arc::new(SummarizeSweep::new(
            repository.clone(),
            limiter,
            config.max_summary_attempts,
        ));

        Ok(Self {
            config: config.clone(),
            repository,
            fetcher,
            ingestor,
            sweep,
        })
    }

    pub async fn run_fetch_sweep(&self) -> Result<FetchStats> {
        self.ingestor.run_fetch_sweep().await
    }

    pub async fn run_single_source_fetch(&self, url: &str, name: &str) -> Result<FetchStats> {
        self.ingestor.run_single_source_fetch(url, name).await
    }

    /// Returns `None` when another sweep is already running.
    pub async fn run_summarize_sweep(&self) -> Result<Option<SweepStats>> {
        self.sweep.run().await
    }

    /// Subscribe to a feed and ingest it right away. Without a name the feed
    /// is discovered first and its own title used.
    pub async fn subscribe(&self, url: &str, name: Option<&str>) -> Result<Subscription> {
        let (url, name) = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => (url.to_string(), name.to_string()),
            None => {
                let discovered = self.fetcher.discover_feed(url).await?;
                (discovered.url, discovered.name)
            }
        };

        let id = self.repository.upsert_subscription(&url, &name).await?;
        tracing::info!("Subscribed to {} ({})", name, url);

        self.run_single_source_fetch(&url, &name).await?;

        Ok(Subscription { id, url, name })
    }

    /// Returns the number of deleted articles, or `None` for an unknown id.
    pub async fn unsubscribe(&self, id: i64) -> Result<Option<usize>> {
        let deleted = self.repository.delete_subscription(id).await?;
        if let Some(count) = deleted {
            tracing::info!("Deleted subscription {} and {} articles", id, count);
        }
        Ok(deleted)
    }

    pub async fn rename_subscription(&self, id: i64, name: &str) -> Result<bool> {
        self.repository.rename_subscription(id, name).await
    }

    pub async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        self.repository.list_subscriptions().await
    }

    pub async fn articles(&self, feed: Option<FeedKey>) -> Result<Vec<Article>> {
        match feed {
            Some(feed) => self.repository.list_articles_by_feed(&feed).await,
            None => self.repository.list_articles().await,
        }
    }

    pub async fn import_opml(&self, path: &Path) -> Result<usize> {
        let feeds = parse_opml_file(path)?;
        let mut imported = 0;

        for feed in feeds {
            match self.repository.upsert_subscription(&feed.url, &feed.name).await {
                Ok(_) => imported += 1,
                Err(e) => {
                    tracing::warn!("Failed to insert feed {}: {}", feed.url, e);
                }
            }
        }

        // Fetch the newly imported feeds
        self.run_fetch_sweep().await?;

        Ok(imported)
    }

    pub async fn backfill_feed_refs(&self) -> Result<(usize, usize)> {
        self.repository.backfill_feed_refs().await
    }

    /// Run both periodic jobs until Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        let jobs: Vec<Arc<dyn SchedulerJob>> = vec![
            Arc::new(FetchJob::new(self.ingestor.clone(), self.config.fetch_interval())),
            Arc::new(SummarizeJob::new(self.sweep.clone(), self.config.summarize_interval())),
        ];
        let scheduler = Scheduler::start(jobs);

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");
        scheduler.shutdown();

        Ok(())
    }
}
