//! Feed ingestion with full-article extraction and rate-limited Gemini
//! summaries.

pub mod ai;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod services;

pub use app::App;
pub use config::Config;
pub use error::{AppError, Result};
