/// Local embedders for tests and offline demos.
///
/// [`MockEmbedder`] hashes words into a fixed number of buckets, so texts that
/// share words point in similar directions and identical texts produce
/// identical vectors. [`FixtureEmbedder`] returns hand-picked vectors for
/// known texts.
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use super::{Embedder, EmbedderError};

/// A mock embedder that produces deterministic bag-of-words vectors.
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Synchronous core of [`Embedder::embed`].
    #[must_use]
    pub fn vector(&self, text: &str) -> Vec<f64> {
        let mut embedding = vec![0.0f64; self.dimensions];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();

            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        // L2 normalize; text without words stays the zero vector
        let norm_sq: f64 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        embedding
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedderError> {
        Ok(self.vector(text))
    }
}

/// Returns a fixed vector for each known text and fails for anything else.
#[derive(Default)]
pub struct FixtureEmbedder {
    vectors: HashMap<String, Vec<f64>>,
}

impl FixtureEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the vector returned for `text`.
    #[must_use]
    pub fn with(mut self, text: impl Into<String>, vector: Vec<f64>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }
}

#[async_trait]
impl Embedder for FixtureEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedderError> {
        self.vectors.get(text).cloned().ok_or_else(|| EmbedderError::Status {
            status: 404,
            message: format!("no fixture for {text:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_mock_embed_dimensions() {
        let embedder = MockEmbedder::new(384);
        let result = embedder.embed("hello world").await.unwrap();
        assert_eq!(result.len(), 384);
    }

    #[tokio::test]
    async fn test_mock_embed_deterministic() {
        let embedder = MockEmbedder::new(384);
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[tokio::test]
    async fn test_mock_embed_different_inputs() {
        let embedder = MockEmbedder::new(384);
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("world").await.unwrap();
        assert_ne!(a, b, "different inputs should produce different outputs");
    }

    #[test]
    fn test_mock_embed_normalized() {
        let embedder = MockEmbedder::new(384);
        let vec = embedder.vector("test normalization");
        let norm: f64 = vec.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!(
            (norm - 1.0).abs() < 1e-9,
            "vector should be unit length, got {norm}"
        );
    }

    #[test]
    fn test_mock_shared_words_are_closer() {
        let embedder = MockEmbedder::new(256);
        let query = embedder.vector("travel widget");
        let near = embedder.vector("a compact travel widget for trips");
        let far = embedder.vector("quarterly tax filing deadline");
        assert!(cosine(&query, &near) > cosine(&query, &far));
    }

    #[test]
    fn test_mock_no_words_is_zero_vector() {
        let embedder = MockEmbedder::new(8);
        assert!(embedder.vector("  ... ").iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_mock_embed_batch() {
        let embedder = MockEmbedder::new(128);
        let results = embedder.embed_batch(&["a", "b", "c"]).await.unwrap();
        assert_eq!(results.len(), 3);
        for vec in &results {
            assert_eq!(vec.len(), 128);
        }
    }

    #[tokio::test]
    async fn test_fixture_embedder() {
        let embedder = FixtureEmbedder::new().with("known", vec![1.0, 0.0]);
        assert_eq!(embedder.embed("known").await.unwrap(), vec![1.0, 0.0]);
        assert!(embedder.embed("unknown").await.is_err());
    }
}
