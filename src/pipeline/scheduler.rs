use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{Ingestor, SummarizeSweep};
use crate::error::Result;

/// A task that runs on a fixed period.
#[async_trait]
pub trait SchedulerJob: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    async fn execute(&self) -> Result<()>;
}

/// Fetches all subscribed feeds.
pub struct FetchJob {
    ingestor: Arc<Ingestor>,
    interval: Duration,
}

impl FetchJob {
    pub fn new(ingestor: Arc<Ingestor>, interval: Duration) -> Self {
        Self { ingestor, interval }
    }
}

#[async_trait]
impl SchedulerJob for FetchJob {
    fn name(&self) -> &'static str {
        "FeedFetch"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<()> {
        self.ingestor.run_fetch_sweep().await?;
        Ok(())
    }
}

/// Summarizes articles that are still missing a summary.
pub struct SummarizeJob {
    sweep: Arc<SummarizeSweep>,
    interval: Duration,
}

impl SummarizeJob {
    pub fn new(sweep: Arc<SummarizeSweep>, interval: Duration) -> Self {
        Self { sweep, interval }
    }
}

#[async_trait]
impl SchedulerJob for SummarizeJob {
    fn name(&self) -> &'static str {
        "Summarize"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<()> {
        self.sweep.run().await?;
        Ok(())
    }
}

/// Runs each job on its own timer. The first run happens immediately; ticks
/// missed while a run is in progress are skipped rather than queued.
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(jobs: Vec<Arc<dyn SchedulerJob>>) -> Self {
        let handles = jobs
            .into_iter()
            .map(|job| {
                tracing::info!("Scheduling job '{}' every {:?}", job.name(), job.interval());
                tokio::spawn(run_job(job))
            })
            .collect();

        Self { handles }
    }

    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

async fn run_job(job: Arc<dyn SchedulerJob>) {
    let mut timer = tokio::time::interval(job.interval());
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        timer.tick().await;
        match job.execute().await {
            Ok(()) => tracing::debug!("Job '{}' completed", job.name()),
            Err(e) => tracing::error!("Job '{}' failed: {}", job.name(), e),
        }
    }
}
