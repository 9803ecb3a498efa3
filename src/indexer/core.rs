use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::embedder::{Embedder, EmbedderError, embed_ordered};
use crate::frontmatter::{self, FrontmatterError};
use crate::indexer::chunker;
use crate::store::{Chunk, StoreError, VectorStore};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: FrontmatterError,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot determine topic for {}", .0.display())]
    NoTopic(PathBuf),

    #[error(transparent)]
    Embedding(#[from] EmbedderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Per-document failures that leave the rest of a batch runnable.
    ///
    /// A rejected topic or log name belongs to the document whose path or
    /// stem produced it.
    pub fn is_document_local(&self) -> bool {
        matches!(
            self,
            IngestError::Parse { .. }
                | IngestError::Read { .. }
                | IngestError::NoTopic(_)
                | IngestError::Store(StoreError::InvalidName { .. })
        )
    }
}

/// Where one document's chunks went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub path: PathBuf,
    pub topic: String,
    pub log: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub ingested: Vec<IngestReport>,
    pub failed: Vec<DocumentFailure>,
}

impl IngestSummary {
    pub fn chunks(&self) -> usize {
        self.ingested.iter().map(|r| r.chunks).sum()
    }
}

/// Runs documents through frontmatter extraction, chunking, embedding and
/// the store, in that order. Nothing is written until every chunk of a
/// document has its embedding.
pub struct Indexer<'a> {
    store: &'a VectorStore,
    embedder: &'a dyn Embedder,
    chunk_lines: usize,
    concurrency: usize,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a VectorStore, embedder: &'a dyn Embedder, chunk_lines: usize) -> Self {
        Self {
            store,
            embedder,
            chunk_lines,
            concurrency: 1,
        }
    }

    /// Embedding requests in flight per document; 1 means sequential.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Ingest raw document text into `topic`'s `log` record log.
    ///
    /// Returns the number of chunks appended.
    pub async fn ingest_text(
        &self,
        topic: &str,
        log: &str,
        content: &str,
    ) -> Result<usize, IngestError> {
        let (metadata, body) =
            frontmatter::parse(content).map_err(|source| IngestError::Parse {
                path: PathBuf::from(log),
                source,
            })?;
        self.ingest_parsed(topic, log, metadata, &body).await
    }

    async fn ingest_parsed(
        &self,
        topic: &str,
        log: &str,
        metadata: frontmatter::Metadata,
        body: &str,
    ) -> Result<usize, IngestError> {
        // Validate names before spending embedding calls
        self.store.log_path(topic, log)?;

        let texts = chunker::split_into_chunks(body, self.chunk_lines);
        if texts.is_empty() {
            warn!(topic, log, "Document has no content to index");
            return Ok(0);
        }

        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = embed_ordered(self.embedder, &refs, self.concurrency).await?;

        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(vectors)
            .map(|(text, embedding)| Chunk::new(text, embedding, metadata.clone()))
            .collect();

        Ok(self.store.append(topic, log, &chunks)?)
    }

    /// Ingest one file. The log name is the file stem; the topic is
    /// `topic` when given, otherwise inferred from the path.
    pub async fn ingest_file(
        &self,
        path: &Path,
        topic: Option<&str>,
    ) -> Result<IngestReport, IngestError> {
        let topic = match topic {
            Some(t) => t.to_string(),
            None => infer_topic(path, self.store.root())
                .ok_or_else(|| IngestError::NoTopic(path.to_path_buf()))?,
        };
        let log = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| IngestError::NoTopic(path.to_path_buf()))?
            .to_string();

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| IngestError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let (metadata, body) =
            frontmatter::parse(&content).map_err(|source| IngestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let chunks = self.ingest_parsed(&topic, &log, metadata, &body).await?;
        info!("Ingested {} ({chunks} chunks) into {topic}/{log}", path.display());

        Ok(IngestReport {
            path: path.to_path_buf(),
            topic,
            log,
            chunks,
        })
    }

    /// Ingest several files. Document-local failures are collected and the
    /// batch continues; embedding and store failures stop it.
    pub async fn ingest_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        topic: Option<&str>,
    ) -> Result<IngestSummary, IngestError> {
        let mut summary = IngestSummary::default();

        for path in paths {
            let path = path.as_ref();
            match self.ingest_file(path, topic).await {
                Ok(report) => summary.ingested.push(report),
                Err(e) if e.is_document_local() => {
                    warn!("Skipping document: {e}");
                    summary.failed.push(DocumentFailure {
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }
}

/// Topic for a document path: the first directory under `topics_root`, or
/// else the document's parent directory name.
pub fn infer_topic(path: &Path, topics_root: &Path) -> Option<String> {
    let path = normalize(path);
    let root = normalize(topics_root);

    if let Ok(rest) = path.strip_prefix(&root) {
        let mut components = rest.components();
        if let (Some(Component::Normal(first)), Some(_)) = (components.next(), components.next()) {
            return first.to_str().map(str::to_string);
        }
    }

    path.parent()
        .and_then(Path::file_name)
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
