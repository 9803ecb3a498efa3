use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::info;

use super::lock::WriteLock;
use super::{Chunk, StoreError, VectorStore};

impl VectorStore {
    /// Append chunks, in order, to the `name` log of `topic`.
    ///
    /// The topic is created if needed. Every chunk must have the topic's
    /// embedding dimension (the first chunk sets it for a new topic). The
    /// topic's write lock is held from the dimension check through the
    /// write, which goes out in one call followed by `fsync`.
    pub fn append(&self, topic: &str, name: &str, chunks: &[Chunk]) -> Result<usize, StoreError> {
        let path = self.log_path(topic, name)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let dir = self.memory_dir(topic)?;
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let _lock = WriteLock::acquire(&dir)?;

        let expected = match self.topic_dimension(topic)? {
            Some(dim) => dim,
            None => chunks[0].dimension(),
        };
        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(StoreError::EmptyEmbedding);
            }
            if chunk.dimension() != expected {
                return Err(StoreError::DimensionMismatch {
                    topic: topic.to_string(),
                    expected,
                    found: chunk.dimension(),
                });
            }
        }

        let mut buf = String::new();
        if ends_mid_line(&path)? {
            // Finish a torn last line so the first new record stands alone.
            buf.push('\n');
        }
        for chunk in chunks {
            buf.push_str(&serde_json::to_string(chunk)?);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(buf.as_bytes())
            .map_err(|e| StoreError::io(&path, e))?;
        file.sync_data().map_err(|e| StoreError::io(&path, e))?;

        info!(topic, log = name, count = chunks.len(), "Appended chunks");
        Ok(chunks.len())
    }

    /// Append a single chunk.
    pub fn append_one(&self, topic: &str, name: &str, chunk: &Chunk) -> Result<(), StoreError> {
        self.append(topic, name, std::slice::from_ref(chunk))
            .map(|_| ())
    }

    /// Embedding dimension of the first readable record in `topic`.
    pub fn topic_dimension(&self, topic: &str) -> Result<Option<usize>, StoreError> {
        for item in self.scan(topic)? {
            match item {
                Ok(chunk) => return Ok(Some(chunk.dimension())),
                Err(super::ScanError::Record(_)) => continue,
                Err(super::ScanError::Store(e)) => return Err(e),
            }
        }
        Ok(None)
    }
}

fn ends_mid_line(path: &Path) -> Result<bool, StoreError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    let len = file
        .metadata()
        .map_err(|e| StoreError::io(path, e))?
        .len();
    if len == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .and_then(|_| file.read_exact(&mut last))
        .map_err(|e| StoreError::io(path, e))?;
    Ok(last[0] != b'\n')
}
