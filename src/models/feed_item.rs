use chrono::{DateTime, Utc};

/// A feed document as returned by a feed source.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    pub title: String,
    pub link: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    /// Full body as published in the feed (often HTML).
    pub content: Option<String>,
    /// Plain-text rendering of the body.
    pub content_snippet: Option<String>,
    pub description: Option<String>,
}

impl FeedItem {
    /// Text stored when the article page cannot be extracted.
    ///
    /// Empty strings count as missing so a blank `content` does not hide a
    /// usable snippet.
    pub fn fallback_text(&self) -> String {
        [&self.content, &self.content_snippet, &self.description]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_prefers_content_then_snippet_then_description() {
        let mut item = FeedItem {
            content: Some("C".into()),
            content_snippet: Some("S".into()),
            description: Some("D".into()),
            ..Default::default()
        };
        assert_eq!(item.fallback_text(), "C");

        item.content = None;
        assert_eq!(item.fallback_text(), "S");

        item.content_snippet = Some("  ".into());
        assert_eq!(item.fallback_text(), "D");

        item.description = None;
        assert_eq!(item.fallback_text(), "");
    }
}
