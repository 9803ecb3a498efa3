/// Configuration module for topicrag.
///
/// Handles loading, validating, and providing default configuration values.
/// Everything the retrieval engine needs at runtime is carried in
/// [`RetrievalConfig`] and handed to the orchestrator at construction.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::retrieval::context::DEFAULT_PROMPT_TEMPLATE;
use crate::template;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

// ── Default value functions ──────────────────────────────────────────

fn default_topics_dir() -> String {
    "./topics".to_string()
}

fn default_chunk_lines() -> usize {
    3
}

fn default_top_k() -> usize {
    3
}

fn default_threshold() -> f64 {
    0.42
}

fn default_concurrency() -> usize {
    1
}

fn default_prompt_template() -> String {
    DEFAULT_PROMPT_TEMPLATE.to_string()
}

fn default_embedding_url() -> String {
    "http://127.0.0.1:8080/embedding".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_temperature() -> f64 {
    0.7
}

fn default_n_predict() -> u32 {
    512
}

fn default_completion_timeout() -> u64 {
    120
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_topics_dir")]
    pub topics_dir: String,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub completion: CompletionConfig,
}

/// Settings the ingest and query pipelines read.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Lines per chunk.
    #[serde(default = "default_chunk_lines")]
    pub chunk_lines: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum top score for a query to count as answerable.
    #[serde(default = "default_threshold")]
    pub min_similarity_threshold: f64,

    #[serde(default)]
    pub debug: bool,

    /// Fail a query on the first corrupt record instead of skipping it.
    #[serde(default)]
    pub strict_scan: bool,

    /// Embedding requests in flight during ingest.
    #[serde(default = "default_concurrency")]
    pub embed_concurrency: usize,

    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompletionConfig {
    /// No URL means queries return the assembled prompt.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_n_predict")]
    pub n_predict: u32,

    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            topics_dir: default_topics_dir(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_lines: default_chunk_lines(),
            top_k: default_top_k(),
            min_similarity_threshold: default_threshold(),
            debug: false,
            strict_scan: false,
            embed_concurrency: default_concurrency(),
            prompt_template: default_prompt_template(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: None,
            temperature: default_temperature(),
            n_predict: default_n_predict(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.topics_dir.trim().is_empty(),
            "topics_dir must not be empty"
        );
        anyhow::ensure!(
            !self.embedding.url.trim().is_empty(),
            "embedding.url must not be empty"
        );
        anyhow::ensure!(
            self.embedding.timeout_secs > 0,
            "embedding.timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.completion.timeout_secs > 0,
            "completion.timeout_secs must be positive"
        );
        self.retrieval.validate()
    }

    /// Directory holding one sub-directory per topic.
    #[must_use]
    pub fn topics_path(&self) -> PathBuf {
        PathBuf::from(&self.topics_dir)
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_lines > 0, "chunk_lines must be positive");
        anyhow::ensure!(self.top_k > 0, "top_k must be positive");
        anyhow::ensure!(
            self.embed_concurrency > 0,
            "embed_concurrency must be positive"
        );
        anyhow::ensure!(
            (-1.0..=1.0).contains(&self.min_similarity_threshold),
            "min_similarity_threshold must be within [-1, 1], got {}",
            self.min_similarity_threshold
        );

        let names = template::placeholders(&self.prompt_template);
        for required in ["context", "question"] {
            anyhow::ensure!(
                names.iter().any(|n| n == required),
                "prompt_template must contain {{{{{required}}}}}"
            );
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
