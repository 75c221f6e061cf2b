use crate::config::{Number, Settings};
use crate::error::{Result, StoreError};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Turns text into a fixed-length vector. One call, one vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<Number>>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<Number>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Transport failures (timeouts included), `429` and `5xx` answers are retried
/// up to `max_retries` times with doubling backoff. Any other non-success
/// status or a body without `data[0].embedding` fails immediately.
pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OpenAiEmbedder {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Service(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
        })
    }

    pub fn from_settings(settings: &Settings, api_key: &str) -> Result<Self> {
        Ok(Self::new(&settings.api_url, api_key, &settings.model, settings.timeout)?
            .with_retries(settings.max_retries, settings.retry_backoff))
    }

    pub fn with_retries(mut self, max_retries: u32, retry_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_once(&self, text: &str) -> std::result::Result<Vec<Number>, Attempt> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: text,
                model: &self.model,
            })
            .send()
            .map_err(|e| Attempt::Retry(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = format!("status {status}: {}", body.trim());
            return Err(if is_retryable(status) {
                Attempt::Retry(message)
            } else {
                Attempt::Fatal(message)
            });
        }

        let body = response
            .text()
            .map_err(|e| Attempt::Retry(format!("failed to read response: {e}")))?;
        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| Attempt::Fatal(format!("malformed response: {e}")))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Attempt::Fatal("response contained no embedding".to_string()))
    }
}

enum Attempt {
    Retry(String),
    Fatal(String),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<Number>> {
        let mut attempt = 0;
        loop {
            match self.request_once(text) {
                Ok(vector) => {
                    debug!(model = %self.model, dimensions = vector.len(), "embedding received");
                    return Ok(vector);
                }
                Err(Attempt::Retry(message)) if attempt < self.max_retries => {
                    let delay = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(attempt, ?delay, error = %message, "embedding request failed, retrying");
                    thread::sleep(delay);
                }
                Err(Attempt::Retry(message)) | Err(Attempt::Fatal(message)) => {
                    return Err(StoreError::Service(message));
                }
            }
        }
    }
}
