use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("OPML error: {0}")]
    Opml(#[from] opml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A feed source could not be fetched or parsed.
    #[error("Failed to fetch feed {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The article page could not be turned into readable text.
    #[error("Failed to extract {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("Summarization error: {0}")]
    Summarization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn extraction(url: &str, reason: impl ToString) -> Self {
        Self::Extraction {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Persistence failures are the only errors a sweep reports to its caller.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Sqlite(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
