/// HTTP client for an external embedding server.
///
/// Sends `{"input": text}` and expects an array of result objects, each with
/// an `embedding` field (llama.cpp `/embedding` style). The embedding may be
/// a flat array or an array of rows, in which case the first row is used.
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{Embedder, EmbedderError};
use crate::config::EmbeddingConfig;

/// Embedder backed by an HTTP inference server.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpEmbedder {
    /// Create a client for `url`; every request is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EmbedderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("topicrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EmbedderError::Request(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbedderError> {
        Self::new(&config.url, Duration::from_secs(config.timeout_secs))
    }

    fn request_error(&self, e: reqwest::Error) -> EmbedderError {
        if e.is_timeout() {
            EmbedderError::Timeout(self.timeout.as_secs())
        } else {
            EmbedderError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedderError> {
        debug!(url = %self.url, chars = text.len(), "requesting embedding");

        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "input": text }))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedderError::Status {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        let body: Value = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                EmbedderError::Timeout(self.timeout.as_secs())
            } else {
                EmbedderError::MalformedResponse(format!("invalid JSON: {e}"))
            }
        })?;

        parse_embedding_response(&body)
    }
}

/// Extract the embedding vector from a response body.
pub fn parse_embedding_response(body: &Value) -> Result<Vec<f64>, EmbedderError> {
    let result = match body {
        Value::Array(results) => results
            .first()
            .ok_or_else(|| EmbedderError::MalformedResponse("empty result array".into()))?,
        Value::Object(_) => body,
        _ => {
            return Err(EmbedderError::MalformedResponse(
                "expected an array of results".into(),
            ));
        }
    };

    let mut embedding = result
        .get("embedding")
        .ok_or_else(|| EmbedderError::MalformedResponse("missing embedding field".into()))?;

    // Pooled-per-token servers return a list of rows.
    if let Some(Value::Array(_)) = embedding.get(0) {
        embedding = &embedding[0];
    }

    let values = embedding
        .as_array()
        .ok_or_else(|| EmbedderError::MalformedResponse("embedding is not an array".into()))?;
    if values.is_empty() {
        return Err(EmbedderError::MalformedResponse("embedding is empty".into()));
    }

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| EmbedderError::MalformedResponse(format!("non-numeric value {v}")))
        })
        .collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array_of_results() {
        let body = json!([{ "index": 0, "embedding": [0.5, -0.25, 1.0] }]);
        assert_eq!(parse_embedding_response(&body).unwrap(), vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn test_parse_nested_rows() {
        let body = json!([{ "index": 0, "embedding": [[0.1, 0.2], [0.3, 0.4]] }]);
        assert_eq!(parse_embedding_response(&body).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_parse_bare_object() {
        let body = json!({ "embedding": [1, 2] });
        assert_eq!(parse_embedding_response(&body).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_parse_missing_field() {
        let body = json!([{ "index": 0 }]);
        let err = parse_embedding_response(&body).unwrap_err();
        assert!(matches!(err, EmbedderError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_empty_and_non_numeric() {
        assert!(parse_embedding_response(&json!([])).is_err());
        assert!(parse_embedding_response(&json!([{ "embedding": [] }])).is_err());
        assert!(parse_embedding_response(&json!([{ "embedding": ["x"] }])).is_err());
        assert!(parse_embedding_response(&json!("nope")).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
