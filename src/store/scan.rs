//! Streaming reads over a topic's record logs.
//!
//! A corrupt line is reported as a [`RecordError`] for that line only; the
//! scan keeps going with the next line. Only failing to open or read a log
//! file ends the scan.
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::{Chunk, StoreError, VectorStore};

/// A record line that could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{}:{}: {}", .path.display(), .line, .message)]
pub struct RecordError {
    pub path: PathBuf,
    /// 1-based line number within the log.
    pub line: usize,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Lazy iterator over every record of a topic, in log-name then line order.
pub struct TopicScan {
    pending: VecDeque<PathBuf>,
    current: Option<OpenLog>,
    failed: bool,
}

struct OpenLog {
    path: PathBuf,
    reader: BufReader<File>,
    line: usize,
    buf: Vec<u8>,
}

impl TopicScan {
    fn new(logs: Vec<PathBuf>) -> Self {
        Self {
            pending: logs.into(),
            current: None,
            failed: false,
        }
    }
}

impl Iterator for TopicScan {
    type Item = Result<Chunk, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if self.current.is_none() {
                let path = self.pending.pop_front()?;
                match File::open(&path) {
                    Ok(file) => {
                        self.current = Some(OpenLog {
                            path,
                            reader: BufReader::new(file),
                            line: 0,
                            buf: Vec::new(),
                        });
                    }
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(StoreError::io(&path, e).into()));
                    }
                }
            }
            let Some(log) = self.current.as_mut() else {
                continue;
            };

            log.buf.clear();
            match log.reader.read_until(b'\n', &mut log.buf) {
                Ok(0) => {
                    self.current = None;
                    continue;
                }
                Ok(_) => log.line += 1,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(StoreError::io(&log.path, e).into()));
                }
            }

            let record_error = |message: String| RecordError {
                path: log.path.clone(),
                line: log.line,
                message,
            };

            let text = match std::str::from_utf8(&log.buf) {
                Ok(text) => text.trim(),
                Err(e) => return Some(Err(record_error(format!("invalid UTF-8: {e}")).into())),
            };
            if text.is_empty() {
                continue;
            }

            return Some(match serde_json::from_str::<Chunk>(text) {
                Ok(chunk) if chunk.embedding.is_empty() => {
                    Err(record_error("empty embedding".to_string()).into())
                }
                Ok(chunk) => Ok(chunk),
                Err(e) => Err(record_error(e.to_string()).into()),
            });
        }
    }
}

/// Everything a scan produced: readable chunks plus the lines that were not.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub chunks: Vec<Chunk>,
    pub failures: Vec<RecordError>,
}

impl ScanReport {
    /// The chunks, or [`StoreError::Corrupt`] if any line failed.
    pub fn into_clean(self, topic: &str) -> Result<Vec<Chunk>, StoreError> {
        match self.failures.first() {
            None => Ok(self.chunks),
            Some(first) => Err(StoreError::Corrupt {
                topic: topic.to_string(),
                count: self.failures.len(),
                first: first.clone(),
            }),
        }
    }
}

impl VectorStore {
    /// Stream the records of `topic`. A topic with no logs yields nothing.
    pub fn scan(&self, topic: &str) -> Result<TopicScan, StoreError> {
        Ok(TopicScan::new(self.logs(topic)?))
    }

    /// Read a whole topic, collecting per-line failures instead of stopping.
    pub fn scan_all(&self, topic: &str) -> Result<ScanReport, StoreError> {
        let mut report = ScanReport::default();
        for item in self.scan(topic)? {
            match item {
                Ok(chunk) => report.chunks.push(chunk),
                Err(ScanError::Record(e)) => report.failures.push(e),
                Err(ScanError::Store(e)) => return Err(e),
            }
        }
        Ok(report)
    }
}
