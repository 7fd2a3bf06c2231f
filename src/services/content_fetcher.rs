use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;

use crate::error::{AppError, Result};

const USER_AGENT_STRING: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Pages that yield less readable text than this are treated as failures.
const MIN_CONTENT_CHARS: usize = 200;

/// Turns an article link into its readable body text.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, link: &str) -> Result<String>;
}

pub struct ContentFetcher {
    client: Client,
}

impl ContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_page(&self, article_url: &str) -> Result<String> {
        url::Url::parse(article_url).map_err(|e| AppError::extraction(article_url, e))?;

        let response = self.client.get(article_url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::extraction(
                article_url,
                format!("HTTP {}", response.status()),
            ));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl ContentExtractor for ContentFetcher {
    async fn extract(&self, link: &str) -> Result<String> {
        let html = self.fetch_page(link).await.map_err(|e| match e {
            AppError::Extraction { .. } => e,
            other => AppError::extraction(link, other),
        })?;

        extract_readable_text(&html).map_err(|reason| AppError::extraction(link, reason))
    }
}

fn article_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<article\b[^>]*>(.*?)</article>").ok())
        .as_ref()
}

/// Convert an article page to plain text, preferring the longest `<article>`
/// element when the page has any.
pub fn extract_readable_text(html: &str) -> std::result::Result<String, String> {
    let body = article_re()
        .and_then(|re| {
            re.captures_iter(html)
                .filter_map(|cap| cap.get(1))
                .max_by_key(|m| m.len())
        })
        .map(|m| m.as_str())
        .unwrap_or(html);

    let text = html2text::from_read(body.as_bytes(), 80)
        .map_err(|e| format!("failed to convert HTML to text: {e}"))?;

    // Clean up the text - remove excessive whitespace
    let cleaned: String = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let chars = cleaned.chars().count();
    if chars > MIN_CONTENT_CHARS {
        Ok(cleaned)
    } else {
        Err(format!("extracted content too short ({chars} chars)"))
    }
}
