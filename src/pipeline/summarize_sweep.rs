use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ai::RateLimiter;
use crate::db::ArticleStore;
use crate::error::Result;
use crate::models::Article;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub pending: usize,
    pub summarized: usize,
    /// Provider answered but produced no text.
    pub empty: usize,
    pub failed: usize,
}

/// Holds the sweep-in-progress flag for as long as it lives.
struct SweepGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drains the backlog of unsummarized articles through the rate limiter.
///
/// Only one sweep runs at a time; a sweep started while another is in
/// progress returns `Ok(None)` without reading the store.
pub struct SummarizeSweep {
    articles: Arc<dyn ArticleStore>,
    limiter: Arc<RateLimiter>,
    max_attempts: u32,
    running: AtomicBool,
}

impl SummarizeSweep {
    pub fn new(articles: Arc<dyn ArticleStore>, limiter: Arc<RateLimiter>, max_attempts: u32) -> Self {
        Self {
            articles,
            limiter,
            max_attempts,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn run(&self) -> Result<Option<SweepStats>> {
        let Some(_guard) = SweepGuard::acquire(&self.running) else {
            tracing::info!("Previous summarize sweep still running, skipping this run");
            return Ok(None);
        };

        if !self.limiter.is_enabled() {
            tracing::debug!("Summaries disabled, nothing to sweep");
            return Ok(Some(SweepStats::default()));
        }

        let pending: Vec<Article> = self
            .articles
            .list_articles()
            .await?
            .into_iter()
            .filter(|a| a.needs_summary(self.max_attempts))
            .collect();

        let mut stats = SweepStats {
            pending: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            tracing::debug!("No articles waiting for a summary");
            return Ok(Some(stats));
        }

        tracing::info!("{} articles to summarize", pending.len());

        for article in pending {
            let link = article.link;
            match self.limiter.summarize(&article.content).await {
                Ok(Some(summary)) => match self.articles.store_summary(&link, &summary).await {
                    Ok(true) => {
                        tracing::debug!("Stored summary for {}", link);
                        stats.summarized += 1;
                    }
                    Ok(false) => {
                        tracing::debug!("Article {} was removed during the sweep", link);
                    }
                    Err(e) => {
                        tracing::error!("Failed to store summary for {}: {}", link, e);
                        stats.failed += 1;
                    }
                },
                Ok(None) => {
                    tracing::warn!("Empty summary for {}", link);
                    stats.empty += 1;
                    self.record_attempt(&link).await;
                }
                Err(e) => {
                    tracing::warn!("Error summarizing {}: {}", link, e);
                    stats.failed += 1;
                    self.record_attempt(&link).await;
                }
            }
        }

        tracing::info!(
            "Summarize sweep completed: {} summarized, {} empty, {} failed",
            stats.summarized,
            stats.empty,
            stats.failed
        );
        Ok(Some(stats))
    }

    /// Counts an attempt that produced no summary toward the cap.
    async fn record_attempt(&self, link: &str) {
        if let Err(e) = self.articles.record_summary_failure(link).await {
            tracing::error!("Failed to record summary failure for {}: {}", link, e);
        }
    }
}
