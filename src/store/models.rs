use serde::{Deserialize, Serialize};

use crate::frontmatter::Metadata;

/// One stored record: chunk text, its embedding, and the document metadata.
///
/// Serialized as `{"text": .., "embedding": [..], "meta": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub embedding: Vec<f64>,
    #[serde(rename = "meta", default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, embedding: Vec<f64>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            embedding,
            metadata,
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}
