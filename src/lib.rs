//! # topicrag: topic-scoped retrieval for local RAG
//!
//! Ingests frontmatter markdown into per-topic, append-only JSONL vector
//! logs and answers questions by filtering, scoring and thresholding those
//! records before handing a prompt to a local completion endpoint.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON configuration loading, validation and defaults
//! - **[`frontmatter`]**: YAML frontmatter split and generation
//! - **[`indexer`]**: Line-group chunking and the ingest pipeline
//! - **[`embedder`]**: Embedding port, HTTP client and local stand-ins
//! - **[`store`]**: Flat-file vector store (append, lock, streaming scan)
//! - **[`filter`]**: Metadata filter language
//! - **[`ranker`]**: Similarity metrics and stable top-K ranking
//! - **[`retrieval`]**: Query orchestration, threshold gate, prompt assembly
//! - **[`completion`]**: Completion port and HTTP client
//! - **[`template`]**: `{{name}}` substitution
//! - **[`tokens`]**: Heuristic token estimation
//! - **[`importer`]**: CSV to markdown conversion
//! - **[`mcp`]**: MCP server exposing the engine as tools (stdio via rmcp)

pub mod completion;
pub mod config;
pub mod embedder;
pub mod filter;
pub mod frontmatter;
pub mod importer;
pub mod indexer;
pub mod mcp;
pub mod ranker;
pub mod retrieval;
pub mod store;
pub mod template;
pub mod tokens;
