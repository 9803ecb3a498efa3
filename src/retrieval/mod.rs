//! Retrieval orchestration.
//!
//! [`Retriever`] owns the collaborators a query needs (store, embedder,
//! optional completer, scoring metric) and the [`RetrievalConfig`] it was
//! built with. Every call re-reads the topic; nothing is cached between
//! calls.
pub mod context;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::completion::{Completer, CompletionError};
use crate::config::RetrievalConfig;
use crate::embedder::{Embedder, EmbedderError};
use crate::filter::{FilterSyntaxError, parse_filters};
use crate::indexer::{IngestError, IngestReport, IngestSummary, Indexer};
use crate::ranker::{Cosine, ScoredChunk, SimilarityMetric, euclidean_distance, rank};
use crate::store::{RecordError, StoreError, VectorStore};

/// Corrupt-record warnings logged per query before summarizing.
const MAX_LOGGED_FAILURES: usize = 5;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbedderError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("query vector has {query} dimensions but every record in {topic} has {stored}")]
    DimensionMismatch {
        topic: String,
        query: usize,
        stored: usize,
    },
}

/// Why a query had nothing to score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The topic has no readable records.
    EmptyTopic,
    /// Records exist but none passed the filters.
    FilteredOut,
}

/// Terminal state of a query. Only `Answer` carries matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    NoCandidates {
        reason: EmptyReason,
    },
    NoConfidentMatch {
        /// Best finite score, if any candidate scored at all.
        top_score: Option<f64>,
        threshold: f64,
    },
    Answer {
        matches: Vec<ScoredChunk>,
        prompt: String,
        /// Generated text, when a completion endpoint is configured.
        completion: Option<String>,
    },
}

impl QueryOutcome {
    /// What a caller prints: the completion if there is one, else the prompt.
    pub fn text(&self) -> Option<&str> {
        match self {
            QueryOutcome::Answer {
                completion: Some(text),
                ..
            } => Some(text),
            QueryOutcome::Answer { prompt, .. } => Some(prompt),
            _ => None,
        }
    }
}

/// One candidate's scores, reported in debug mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreLine {
    pub score: f64,
    pub distance: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryDiagnostics {
    pub threshold: f64,
    pub records: usize,
    pub candidates: usize,
    /// Candidates with a zero-magnitude or otherwise unscorable vector.
    pub degenerate: usize,
    /// Candidates whose dimension differs from the query vector.
    pub mismatched: usize,
    pub rejected_filters: Vec<FilterSyntaxError>,
    pub scan_failures: Vec<RecordError>,
    /// Every scored candidate, best first. Empty unless debug is on.
    pub scores: Vec<ScoreLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub outcome: QueryOutcome,
    pub diagnostics: QueryDiagnostics,
}

pub struct Retriever {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    completer: Option<Arc<dyn Completer>>,
    metric: Box<dyn SimilarityMetric>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self {
            store,
            embedder,
            completer: None,
            metric: Box::new(Cosine),
            config,
        }
    }

    #[must_use]
    pub fn with_completer(mut self, completer: Arc<dyn Completer>) -> Self {
        self.completer = Some(completer);
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: Box<dyn SimilarityMetric>) -> Self {
        self.metric = metric;
        self
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn indexer(&self) -> Indexer<'_> {
        Indexer::new(&self.store, self.embedder.as_ref(), self.config.chunk_lines)
            .with_concurrency(self.config.embed_concurrency)
    }

    /// Ingest raw document text into `topic`/`log`.
    pub async fn ingest(
        &self,
        topic: &str,
        log: &str,
        content: &str,
    ) -> Result<usize, IngestError> {
        self.indexer().ingest_text(topic, log, content).await
    }

    pub async fn ingest_file(
        &self,
        path: &Path,
        topic: Option<&str>,
    ) -> Result<IngestReport, IngestError> {
        self.indexer().ingest_file(path, topic).await
    }

    pub async fn ingest_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        topic: Option<&str>,
    ) -> Result<IngestSummary, IngestError> {
        self.indexer().ingest_paths(paths, topic).await
    }

    /// Answer `question` from `topic`, keeping only records that satisfy
    /// every filter expression. Malformed expressions are dropped.
    pub async fn query<S: AsRef<str>>(
        &self,
        topic: &str,
        question: &str,
        filters: &[S],
    ) -> Result<QueryResponse, RetrievalError> {
        let filter_set = parse_filters(filters);
        let mut diagnostics = QueryDiagnostics {
            threshold: self.config.min_similarity_threshold,
            rejected_filters: filter_set.rejected.clone(),
            ..QueryDiagnostics::default()
        };

        let query_vector = self.embedder.embed(question).await?;

        let report = self.store.scan_all(topic)?;
        let chunks = if self.config.strict_scan {
            report.into_clean(topic)?
        } else {
            for failure in report.failures.iter().take(MAX_LOGGED_FAILURES) {
                warn!("Skipping corrupt record: {failure}");
            }
            if report.failures.len() > MAX_LOGGED_FAILURES {
                warn!(
                    "{} more corrupt record(s) in {topic}",
                    report.failures.len() - MAX_LOGGED_FAILURES
                );
            }
            diagnostics.scan_failures = report.failures;
            report.chunks
        };
        diagnostics.records = chunks.len();

        if chunks.is_empty() {
            let outcome = QueryOutcome::NoCandidates {
                reason: EmptyReason::EmptyTopic,
            };
            return Ok(self.respond(outcome, diagnostics));
        }

        let candidates: Vec<_> = if filter_set.is_empty() {
            chunks
        } else {
            chunks
                .into_iter()
                .filter(|c| filter_set.matches(&c.metadata))
                .collect()
        };
        diagnostics.candidates = candidates.len();

        if candidates.is_empty() {
            let outcome = QueryOutcome::NoCandidates {
                reason: EmptyReason::FilteredOut,
            };
            return Ok(self.respond(outcome, diagnostics));
        }

        let stored_dim = candidates
            .iter()
            .map(|c| c.dimension())
            .find(|&d| d != query_vector.len());

        let ranking = rank(self.metric.as_ref(), &query_vector, candidates);
        diagnostics.degenerate = ranking.degenerate;
        diagnostics.mismatched = ranking.mismatched;

        if ranking.mismatched > 0 {
            warn!(
                "Skipped {} record(s) in {topic} with a dimension other than {}",
                ranking.mismatched,
                query_vector.len()
            );
            if ranking.mismatched == diagnostics.candidates {
                return Err(RetrievalError::DimensionMismatch {
                    topic: topic.to_string(),
                    query: query_vector.len(),
                    stored: stored_dim.unwrap_or_default(),
                });
            }
        }

        if self.config.debug {
            diagnostics.scores = ranking
                .scored
                .iter()
                .map(|s| ScoreLine {
                    score: s.score,
                    distance: euclidean_distance(&query_vector, &s.chunk.embedding)
                        .unwrap_or(f64::NAN),
                    text: s.chunk.text.clone(),
                })
                .collect();
        }

        let threshold = self.config.min_similarity_threshold;
        let top_score = ranking.best_score();
        if top_score.is_none_or(|score| score < threshold) {
            let outcome = QueryOutcome::NoConfidentMatch {
                top_score,
                threshold,
            };
            return Ok(self.respond(outcome, diagnostics));
        }

        let matches = ranking.into_top(self.config.top_k);
        let context_block = context::assemble_context(&matches);
        let prompt = context::build_prompt(&self.config.prompt_template, &context_block, question);

        let completion = match &self.completer {
            Some(completer) => Some(completer.complete(&prompt).await?),
            None => None,
        };

        Ok(self.respond(
            QueryOutcome::Answer {
                matches,
                prompt,
                completion,
            },
            diagnostics,
        ))
    }

    fn respond(&self, outcome: QueryOutcome, diagnostics: QueryDiagnostics) -> QueryResponse {
        if self.config.debug {
            info!(
                threshold = diagnostics.threshold,
                records = diagnostics.records,
                candidates = diagnostics.candidates,
                metric = self.metric.name(),
                "Query diagnostics"
            );
            for (i, line) in diagnostics.scores.iter().enumerate() {
                info!(
                    "#{:<3} score={:.4} distance={:.4} {}",
                    i + 1,
                    line.score,
                    line.distance,
                    preview(&line.text, 60)
                );
            }
        }

        match &outcome {
            QueryOutcome::NoCandidates { reason } => info!("No candidates: {reason:?}"),
            QueryOutcome::NoConfidentMatch { top_score, threshold } => info!(
                "No confident match: top score {} below threshold {threshold}",
                top_score.map_or_else(|| "none".to_string(), |s| format!("{s:.4}"))
            ),
            QueryOutcome::Answer { matches, .. } => {
                info!("Answering from {} chunk(s)", matches.len())
            }
        }

        QueryResponse {
            outcome,
            diagnostics,
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}
