//! Flat-file vector store.
//!
//! Layout: `<root>/<topic>/memory/<name>.jsonl`, one self-contained chunk
//! record per line. Records are only ever appended; a topic is every record
//! log in its `memory/` directory, read in file-name order.
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod lock;
pub mod models;
pub mod records;
pub mod scan;

pub use models::Chunk;
pub use scan::{RecordError, ScanError, ScanReport, TopicScan};

/// Directory under each topic that holds the record logs.
pub const MEMORY_DIR: &str = "memory";
/// Record log file extension.
pub const LOG_EXTENSION: &str = "jsonl";

/// Errors surfaced by store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid {kind} name: {name:?}")]
    InvalidName { kind: &'static str, name: String },

    #[error(
        "topic is locked by another writer{}; remove {} if no ingest is running",
        owner_note(.owner),
        .path.display()
    )]
    Locked { path: PathBuf, owner: Option<u32> },

    #[error("embedding dimension mismatch in topic {topic}: expected {expected}, found {found}")]
    DimensionMismatch {
        topic: String,
        expected: usize,
        found: usize,
    },

    #[error("chunk has an empty embedding")]
    EmptyEmbedding,

    #[error("failed to serialize chunk: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("topic {topic} has {count} corrupt record(s); first: {first}")]
    Corrupt {
        topic: String,
        count: usize,
        first: RecordError,
    },
}

fn owner_note(owner: &Option<u32>) -> String {
    owner.map(|pid| format!(" (pid {pid})")).unwrap_or_default()
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Check a topic or log name: ASCII alphanumerics, `_`, `-` and `.`,
/// not starting with `.`.
pub fn validate_name(kind: &'static str, name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Handle on a topics directory. Opening does no I/O; topics are created on
/// first append.
#[derive(Debug, Clone)]
pub struct VectorStore {
    root: PathBuf,
}

impl VectorStore {
    pub fn open<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<topic>/memory`.
    pub fn memory_dir(&self, topic: &str) -> Result<PathBuf, StoreError> {
        validate_name("topic", topic)?;
        Ok(self.root.join(topic).join(MEMORY_DIR))
    }

    /// `<root>/<topic>/memory/<name>.jsonl`.
    pub fn log_path(&self, topic: &str, name: &str) -> Result<PathBuf, StoreError> {
        validate_name("log", name)?;
        Ok(self
            .memory_dir(topic)?
            .join(format!("{name}.{LOG_EXTENSION}")))
    }

    /// Whether the topic has a memory directory.
    pub fn topic_exists(&self, topic: &str) -> Result<bool, StoreError> {
        Ok(self.memory_dir(topic)?.is_dir())
    }

    /// Names of all topics with a memory directory, sorted.
    pub fn topics(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut topics = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_name("topic", &name).is_ok() && entry.path().join(MEMORY_DIR).is_dir() {
                topics.push(name);
            }
        }
        topics.sort();
        Ok(topics)
    }

    /// Record logs of a topic in file-name order. A missing topic has none.
    pub fn logs(&self, topic: &str) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.memory_dir(topic)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let mut logs = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(LOG_EXTENSION) {
                logs.push(path);
            }
        }
        logs.sort();
        Ok(logs)
    }
}
