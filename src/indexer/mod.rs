//! Document ingestion: chunking and the ingest pipeline.
pub mod chunker;
pub mod core;

pub use self::core::{
    DocumentFailure, IngestError, IngestReport, IngestSummary, Indexer, infer_topic,
};
