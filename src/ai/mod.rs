mod rate_limiter;
mod summarizer;

pub use rate_limiter::RateLimiter;
pub use summarizer::{GeminiSummarizer, SummaryProvider, DEFAULT_GEMINI_API_URL, DEFAULT_GEMINI_MODEL};
