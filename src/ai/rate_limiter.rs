//! Strictly paced access to the summarization provider.
//!
//! Callers enqueue requests on an unbounded FIFO channel. A single consumer
//! task owns the receiving end, so at most one provider call is ever in
//! flight. After each call completes the consumer waits one interval
//! (`60s / requests_per_minute`) before taking the next request.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, Result};

use super::summarizer::SummaryProvider;

struct Job {
    text: String,
    reply: oneshot::Sender<Result<Option<String>>>,
}

pub struct RateLimiter {
    sender: Option<mpsc::UnboundedSender<Job>>,
    interval: Duration,
}

impl RateLimiter {
    /// Starts the consumer task. Without a provider no task is started and
    /// every request resolves to `None` immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(provider: Option<Arc<dyn SummaryProvider>>, requests_per_minute: u32) -> Self {
        let interval = Self::interval_for(requests_per_minute);

        let Some(provider) = provider else {
            tracing::warn!("No Gemini API key configured; summaries are disabled");
            return Self {
                sender: None,
                interval,
            };
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(provider, receiver, interval));

        Self {
            sender: Some(sender),
            interval,
        }
    }

    pub fn interval_for(requests_per_minute: u32) -> Duration {
        Duration::from_millis(60_000 / u64::from(requests_per_minute.max(1)))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queues `text` for summarization and waits for its turn.
    ///
    /// Resolves to `Ok(None)` when summaries are disabled or the provider
    /// returned nothing usable.
    pub async fn summarize(&self, text: &str) -> Result<Option<String>> {
        let Some(sender) = &self.sender else {
            return Ok(None);
        };

        let (reply, response) = oneshot::channel();
        sender
            .send(Job {
                text: text.to_string(),
                reply,
            })
            .map_err(|_| AppError::Summarization("summarizer queue has shut down".to_string()))?;

        response
            .await
            .map_err(|_| AppError::Summarization("summarizer dropped the request".to_string()))?
    }
}

async fn run_queue(
    provider: Arc<dyn SummaryProvider>,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    interval: Duration,
) {
    tracing::debug!("Summarizer queue started ({:?} between requests)", interval);

    while let Some(job) = receiver.recv().await {
        // The caller gave up while queued; don't spend quota on it.
        if job.reply.is_closed() {
            tracing::debug!("Dropping abandoned summarization request");
            continue;
        }

        let result = provider
            .summarize(&job.text)
            .await
            .map(|summary| Some(summary.trim().to_string()).filter(|s| !s.is_empty()));

        if let Err(e) = &result {
            tracing::warn!("Summarization request failed: {}", e);
        }
        let _ = job.reply.send(result);

        tokio::time::sleep(interval).await;
    }

    tracing::debug!("Summarizer queue stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::future::join_all;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records when each call started and finished.
    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<(String, Instant)>>,
        call_time: Duration,
    }

    #[async_trait]
    impl SummaryProvider for RecordingProvider {
        async fn summarize(&self, text: &str) -> Result<String> {
            self.calls.lock().unwrap().push((text.to_string(), Instant::now()));
            tokio::time::sleep(self.call_time).await;
            if text.contains("fail") {
                return Err(AppError::Summarization("rejected".into()));
            }
            Ok(format!("summary of {text}"))
        }
    }

    #[test]
    fn interval_matches_budget() {
        assert_eq!(RateLimiter::interval_for(15), Duration::from_secs(4));
        assert_eq!(RateLimiter::interval_for(60), Duration::from_secs(1));
        assert_eq!(RateLimiter::interval_for(0), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn paces_calls_in_fifo_order() {
        let provider = Arc::new(RecordingProvider {
            call_time: Duration::from_millis(500),
            ..Default::default()
        });
        let limiter = RateLimiter::new(Some(provider.clone() as Arc<dyn SummaryProvider>), 15);

        let texts: Vec<String> = (0..5).map(|i| format!("article {i}")).collect();
        let completions = join_all(texts.iter().map(|text| {
            let limiter = &limiter;
            async move {
                let summary = limiter.summarize(text).await.unwrap();
                (summary, Instant::now())
            }
        }))
        .await;

        let calls = provider.calls.lock().unwrap().clone();
        let order: Vec<&str> = calls.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(order, texts.iter().map(String::as_str).collect::<Vec<_>>());

        for pair in calls.windows(2) {
            // previous call takes 500ms, then the 4s interval
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(4500));
        }

        for (i, pair) in completions.windows(2).enumerate() {
            assert_eq!(pair[0].0.as_deref(), Some(format!("summary of article {i}").as_str()));
            assert!(pair[1].1 - pair[0].1 >= Duration::from_secs(4));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failures_settle_independently() {
        let provider = Arc::new(RecordingProvider::default());
        let limiter = RateLimiter::new(Some(provider.clone() as Arc<dyn SummaryProvider>), 60);

        let results = join_all(["one", "fail two", "three"].map(|t| limiter.summarize(t))).await;

        assert_eq!(results[0].as_ref().unwrap().as_deref(), Some("summary of one"));
        assert!(matches!(results[1], Err(AppError::Summarization(_))));
        assert_eq!(results[2].as_ref().unwrap().as_deref(), Some("summary of three"));
        assert_eq!(provider.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_requests_are_not_sent() {
        let provider = Arc::new(RecordingProvider::default());
        let limiter = RateLimiter::new(Some(provider.clone() as Arc<dyn SummaryProvider>), 15);

        // occupies the provider and starts the interval
        limiter.summarize("first").await.unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(10), limiter.summarize("gone")).await;
        assert!(abandoned.is_err());

        limiter.summarize("last").await.unwrap();

        let calls = provider.calls.lock().unwrap();
        let texts: Vec<&str> = calls.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["first", "last"]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credential_resolves_to_none_immediately() {
        let limiter = RateLimiter::new(None, 15);
        assert!(!limiter.is_enabled());

        let start = Instant::now();
        let results = join_all((0..10).map(|_| limiter.summarize("anything"))).await;

        assert!(results.iter().all(|r| matches!(r, Ok(None))));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
