use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use regex::Regex;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{FeedItem, NewSubscription, ParsedFeed};

/// Anything that can turn a feed URL into its list of items.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed>;
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .user_agent(concat!("airss/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    async fn fetch_document(&self, url: &str) -> Result<ParsedFeed> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        parse_feed(&bytes)
    }

    /// Discover a feed from a URL.
    /// If the URL is a direct RSS/Atom feed, parse it directly.
    /// If it's an HTML page, look for feed links in <link> tags.
    pub async fn discover_feed(&self, url: &str) -> Result<NewSubscription> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch URL: HTTP {}", response.status()).into());
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = response.bytes().await?;

        if let Ok(feed) = parse_feed(&bytes) {
            return Ok(NewSubscription {
                name: feed.title.unwrap_or_else(|| final_url.clone()),
                url: final_url,
            });
        }

        if content_type.contains("html") || bytes.starts_with(b"<!") || bytes.starts_with(b"<html") {
            let html = String::from_utf8_lossy(&bytes);
            if let Some(feed_url) = find_feed_link(&html, &final_url) {
                let feed = self.fetch_document(&feed_url).await?;
                return Ok(NewSubscription {
                    name: feed.title.unwrap_or_else(|| feed_url.clone()),
                    url: feed_url,
                });
            }
        }

        Err(anyhow::anyhow!("Could not find RSS/Atom feed at {}", url).into())
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        self.fetch_document(url)
            .await
            .map_err(|e| AppError::fetch(url, e))
    }
}

/// Parse RSS, Atom or JSON Feed bytes into feed items.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let content = entry.content.and_then(|c| c.body);
            let description = entry.summary.map(|s| s.content);

            let content_snippet = content
                .as_ref()
                .or(description.as_ref())
                .and_then(|html| html2text::from_read(html.as_bytes(), 80).ok())
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());

            FeedItem {
                title: entry
                    .title
                    .map(|t| t.content)
                    .unwrap_or_else(|| "Untitled".to_string()),
                link: entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .filter(|href| !href.is_empty()),
                pub_date: entry.published.or(entry.updated),
                content,
                content_snippet,
                description,
            }
        })
        .collect();

    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content),
        items,
    })
}

/// Search HTML for RSS/Atom feed links
fn find_feed_link(html: &str, base_url: &str) -> Option<String> {
    // <link rel="alternate" type="application/rss+xml" href="...">
    let link_re = Regex::new(
        r#"<link[^>]*rel=["']alternate["'][^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#,
    )
    .ok()?;

    // type before rel, or no rel at all
    let link_re2 =
        Regex::new(r#"<link[^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#)
            .ok()?;

    let href = link_re
        .captures(html)
        .or_else(|| link_re2.captures(html))
        .and_then(|cap| cap.get(2))
        .map(|m| m.as_str().to_string())?;

    Some(resolve_url(&href, base_url))
}

/// Resolve a potentially relative URL against a base URL
fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    url::Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example News</title>
    <link>https://example.com/</link>
    <description>Latest</description>
    <item>
      <title>First story</title>
      <link>https://example.com/first</link>
      <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
      <description>&lt;p&gt;A short &lt;b&gt;teaser&lt;/b&gt;&lt;/p&gt;</description>
    </item>
    <item>
      <title>No link here</title>
      <description>Orphan</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_items() {
        let feed = parse_feed(RSS.as_bytes()).unwrap();

        assert_eq!(feed.title.as_deref(), Some("Example News"));
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title, "First story");
        assert_eq!(first.link.as_deref(), Some("https://example.com/first"));
        assert!(first.pub_date.is_some());
        assert!(first.content.is_none());
        assert!(first.description.as_deref().unwrap().contains("teaser"));
        assert!(first.content_snippet.as_deref().unwrap().contains("teaser"));

        assert!(feed.items[1].link.is_none());
    }

    #[test]
    fn finds_and_resolves_feed_link() {
        let html = r#"<html><head>
            <link rel="alternate" type="application/rss+xml" href="/feed.xml">
            </head></html>"#;
        assert_eq!(
            find_feed_link(html, "https://example.com/blog/").as_deref(),
            Some("https://example.com/feed.xml")
        );
        assert_eq!(find_feed_link("<html></html>", "https://example.com"), None);
    }

    #[tokio::test]
    async fn fetch_reports_failures_with_source_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(Duration::from_secs(5)).unwrap();

        let ok = fetcher.fetch(&format!("{}/feed.xml", server.uri())).await.unwrap();
        assert_eq!(ok.items.len(), 2);

        let missing_url = format!("{}/missing.xml", server.uri());
        match fetcher.fetch(&missing_url).await {
            Err(AppError::Fetch { url, reason }) => {
                assert_eq!(url, missing_url);
                assert!(reason.contains("404"));
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn discovers_feed_from_html_page() {
        let server = MockServer::start().await;
        let page = r#"<!DOCTYPE html><html><head>
            <link rel="alternate" type="application/rss+xml" href="/feed.xml">
            </head><body>blog</body></html>"#;
        Mock::given(method("GET"))
            .and(path("/blog"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(page),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(Duration::from_secs(5)).unwrap();
        let found = fetcher.discover_feed(&format!("{}/blog", server.uri())).await.unwrap();

        assert_eq!(found.name, "Example News");
        assert_eq!(found.url, format!("{}/feed.xml", server.uri()));
    }
}
