//! OpenAI-compatible embedding client.
//!
//! Implements [`coursematch_core::Embedder`] over `POST {base_url}/embeddings`
//! with a per-request timeout and bounded retries with exponential backoff.

use coursematch_core::{EmbedError, Embedder};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::thread::sleep;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl OpenAiConfig {
    /// Defaults, with the key taken from `OPENAI_API_KEY` when set.
    pub fn from_env() -> Self {
        Self { api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()), ..Self::default() }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .user_agent(concat!("coursematch/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbedError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String { format!("{}/embeddings", self.config.base_url.trim_end_matches('/')) }

    fn send_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut req = self.client.post(self.endpoint()).json(&EmbeddingRequest { model: &self.config.model, input: texts });
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().map_err(|e| EmbedError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(EmbedError::Status { status: status.as_u16(), body });
        }
        let bytes = resp.bytes().map_err(|e| EmbedError::Request(e.to_string()))?;
        parse_response(&bytes, texts.len())
    }
}

impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str { &self.config.model }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let mut attempt = 0;
        loop {
            match self.send_once(texts) {
                Ok(vectors) => return Ok(vectors),
                Err(err) if attempt < self.config.max_retries && is_retryable(&err) => {
                    let delay = backoff(self.config.initial_backoff, attempt);
                    tracing::warn!(attempt = attempt + 1, max_retries = self.config.max_retries, delay_ms = delay.as_millis() as u64, error = %err, "embedding request failed, retrying");
                    sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Vectors in input order; the provider may answer out of order.
fn parse_response(bytes: &[u8], expected: usize) -> Result<Vec<Vec<f32>>, EmbedError> {
    let mut parsed: EmbeddingResponse = serde_json::from_slice(bytes).map_err(|e| EmbedError::Decode(e.to_string()))?;
    if parsed.data.len() != expected {
        return Err(EmbedError::Shape { expected, actual: parsed.data.len() });
    }
    parsed.data.sort_by_key(|item| item.index);
    Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
}

fn is_retryable(err: &EmbedError) -> bool {
    match err {
        EmbedError::Request(_) => true,
        EmbedError::Status { status, .. } => {
            StatusCode::from_u16(*status).is_ok_and(|s| s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error())
        }
        EmbedError::Decode(_) | EmbedError::Shape { .. } => false,
    }
}

fn backoff(initial: Duration, attempt: u32) -> Duration { initial.saturating_mul(1u32 << attempt.min(6)) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorders_by_index() {
        let body = br#"{"data": [{"embedding": [2.0], "index": 1}, {"embedding": [1.0], "index": 0}], "model": "m"}"#;
        assert_eq!(parse_response(body, 2).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn wrong_count_is_a_shape_error() {
        let body = br#"{"data": [{"embedding": [1.0], "index": 0}]}"#;
        assert!(matches!(parse_response(body, 2), Err(EmbedError::Shape { expected: 2, actual: 1 })));
        assert!(matches!(parse_response(b"not json", 1), Err(EmbedError::Decode(_))));
    }

    #[test]
    fn retries_only_transient_failures() {
        assert!(is_retryable(&EmbedError::Request("timeout".into())));
        assert!(is_retryable(&EmbedError::Status { status: 429, body: String::new() }));
        assert!(is_retryable(&EmbedError::Status { status: 503, body: String::new() }));
        assert!(!is_retryable(&EmbedError::Status { status: 401, body: String::new() }));
        assert!(!is_retryable(&EmbedError::Decode("bad".into())));
    }

    #[test]
    fn backoff_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff(base, 0), Duration::from_millis(100));
        assert_eq!(backoff(base, 2), Duration::from_millis(400));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let e = OpenAiEmbedder::new(OpenAiConfig { base_url: "http://localhost:9/v1/".into(), ..Default::default() }).unwrap();
        assert_eq!(e.endpoint(), "http://localhost:9/v1/embeddings");
        assert_eq!(e.model_id(), DEFAULT_MODEL);
    }

    #[test]
    fn unreachable_provider_fails_after_retries() {
        let config = OpenAiConfig {
            base_url: "http://127.0.0.1:9/v1".into(),
            timeout: Duration::from_millis(200),
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let e = OpenAiEmbedder::new(config).unwrap();
        assert!(matches!(e.embed("hello"), Err(EmbedError::Request(_))));
    }
}
