mod content_fetcher;
mod dedup;

pub use content_fetcher::{extract_readable_text, ContentExtractor, ContentFetcher};
pub use dedup::DedupGate;
