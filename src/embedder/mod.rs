/// Embedding port.
///
/// Core code depends only on the [`Embedder`] trait. [`http::HttpEmbedder`]
/// calls an external inference server; [`mock::MockEmbedder`] and
/// [`mock::FixtureEmbedder`] run locally for tests and offline demos.
pub mod http;
pub mod mock;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("embedding request timed out after {0}s")]
    Timeout(u64),

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedderError>;

    /// Embed multiple text strings, one request at a time.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Embed `texts` with at most `concurrency` requests in flight.
///
/// The returned vectors are in input order regardless of completion order.
pub async fn embed_ordered(
    embedder: &dyn Embedder,
    texts: &[&str],
    concurrency: usize,
) -> Result<Vec<Vec<f64>>, EmbedderError> {
    if concurrency <= 1 {
        return embedder.embed_batch(texts).await;
    }
    let requests: Vec<_> = texts.iter().map(|text| embedder.embed(text)).collect();
    stream::iter(requests)
        .buffered(concurrency)
        .try_collect()
        .await
}
