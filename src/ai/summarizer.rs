use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Longest article text sent in one request, in characters.
const MAX_INPUT_CHARS: usize = 30_000;

const PROMPT: &str = "Summarize the following article in a clear, readable way. \
Use bullet points for lists or key information when appropriate. \
Focus on clarity and conciseness.";

/// An external service that turns article text into a summary.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiSummarizer {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GeminiSummarizer {
    pub fn new(api_key: String, api_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            api_url.trim_end_matches('/'),
            model
        );
        Ok(Self {
            client,
            api_key,
            endpoint,
            model: model.to_string(),
        })
    }

    pub fn model_version(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl SummaryProvider for GeminiSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: format!("{}\n\n{}", PROMPT, truncate_chars(text, MAX_INPUT_CHARS)),
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(AppError::Summarization(format!("API error ({status}): {message}")));
        }

        let reply: GenerateResponse = response.json().await?;

        let summary = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .ok_or_else(|| AppError::Summarization("no summary returned".to_string()))?;

        Ok(summary)
    }
}

/// Cut `text` to at most `max` characters without splitting a code point.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn joins_candidate_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "secret"))
            .and(body_string_contains("city council"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "- Council met." }, { "text": "- Plan passed." }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let summarizer =
            GeminiSummarizer::new("secret".into(), &server.uri(), DEFAULT_GEMINI_MODEL).unwrap();
        let summary = summarizer.summarize("The city council met today.").await.unwrap();

        assert_eq!(summary, "- Council met. - Plan passed.");
    }

    #[tokio::test]
    async fn api_errors_and_empty_replies_are_summarization_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("quota"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("blocked"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let summarizer =
            GeminiSummarizer::new("secret".into(), &server.uri(), DEFAULT_GEMINI_MODEL).unwrap();

        match summarizer.summarize("quota").await {
            Err(AppError::Summarization(msg)) => assert!(msg.contains("Resource has been exhausted")),
            other => panic!("expected summarization error, got {other:?}"),
        }
        assert!(matches!(
            summarizer.summarize("blocked").await,
            Err(AppError::Summarization(_))
        ));
    }
}
