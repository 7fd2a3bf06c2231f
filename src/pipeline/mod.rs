//! The ingestion and summarization pipeline.
//!
//! [`Ingestor`] turns subscriptions into stored articles, [`SummarizeSweep`]
//! fills in their summaries, and [`Scheduler`] runs both periodically.

mod ingest;
mod scheduler;
mod summarize_sweep;

pub use ingest::{FanOutLimits, FetchStats, Ingestor};
pub use scheduler::{FetchJob, Scheduler, SchedulerJob, SummarizeJob};
pub use summarize_sweep::{SummarizeSweep, SweepStats};
