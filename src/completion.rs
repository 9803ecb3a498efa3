/// Completion port and its HTTP client.
///
/// The client posts `{prompt, temperature, n_predict}` and reads the
/// generated text from the `content` field of the response
/// (llama.cpp `/completion` style).
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::CompletionConfig;

/// Errors that can occur while requesting a completion.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(String),

    #[error("completion service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("completion request timed out after {0}s")]
    Timeout(u64),

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

/// Generates text from a prompt.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    temperature: f64,
    n_predict: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

/// Completer backed by an HTTP inference server.
pub struct HttpCompleter {
    client: reqwest::Client,
    url: String,
    temperature: f64,
    n_predict: u32,
    timeout: Duration,
}

impl HttpCompleter {
    pub fn new(
        url: impl Into<String>,
        temperature: f64,
        n_predict: u32,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("topicrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CompletionError::Request(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            temperature,
            n_predict,
            timeout,
        })
    }

    /// Build a completer when the config names an endpoint; `None` otherwise.
    pub fn from_config(config: &CompletionConfig) -> Result<Option<Self>, CompletionError> {
        match config.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Self::new(
                url,
                config.temperature,
                config.n_predict,
                Duration::from_secs(config.timeout_secs),
            )
            .map(Some),
            _ => Ok(None),
        }
    }

    fn request_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.timeout.as_secs())
        } else {
            CompletionError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Completer for HttpCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(url = %self.url, chars = prompt.len(), "requesting completion");

        let resp = self
            .client
            .post(&self.url)
            .json(&CompletionRequest {
                prompt,
                temperature: self.temperature,
                n_predict: self.n_predict,
            })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                message: body.trim().chars().take(200).collect(),
            });
        }

        let body: CompletionResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(self.timeout.as_secs())
            } else {
                CompletionError::MalformedResponse(e.to_string())
            }
        })?;

        Ok(body.content)
    }
}
