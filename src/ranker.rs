/// Similarity scoring and top-K ranking.
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::store::Chunk;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("vector dimension mismatch: {left} vs {right}")]
pub struct DimensionMismatch {
    pub left: usize,
    pub right: usize,
}

/// Pluggable vector scoring; higher is more similar.
pub trait SimilarityMetric: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score two vectors of equal length. A non-finite score excludes the
    /// candidate from ranking.
    fn score(&self, a: &[f64], b: &[f64]) -> Result<f64, DimensionMismatch>;
}

/// Cosine similarity. A zero-magnitude vector scores `-inf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl SimilarityMetric for Cosine {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn score(&self, a: &[f64], b: &[f64]) -> Result<f64, DimensionMismatch> {
        cosine_similarity(a, b)
    }
}

fn check_dims(a: &[f64], b: &[f64]) -> Result<(), DimensionMismatch> {
    if a.len() == b.len() {
        Ok(())
    } else {
        Err(DimensionMismatch {
            left: a.len(),
            right: b.len(),
        })
    }
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, DimensionMismatch> {
    check_dims(a, b)?;
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(f64::NEG_INFINITY);
    }
    Ok(dot / denom)
}

/// Euclidean distance. Reported in debug output only, never used to rank.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Result<f64, DimensionMismatch> {
    check_dims(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub score: f64,
    pub chunk: Chunk,
}

/// Candidates ordered by descending score.
#[derive(Debug, Default)]
pub struct Ranking {
    /// Every finite-scored candidate, best first; ties keep scan order.
    pub scored: Vec<ScoredChunk>,
    /// Candidates dropped for a non-finite score (zero-magnitude vectors).
    pub degenerate: usize,
    /// Candidates dropped for a dimension different from the query.
    pub mismatched: usize,
}

impl Ranking {
    pub fn top(&self, k: usize) -> &[ScoredChunk] {
        &self.scored[..k.min(self.scored.len())]
    }

    pub fn best_score(&self) -> Option<f64> {
        self.scored.first().map(|s| s.score)
    }

    pub fn into_top(mut self, k: usize) -> Vec<ScoredChunk> {
        self.scored.truncate(k);
        self.scored
    }
}

/// Score every candidate against `query` and sort, best first.
pub fn rank(metric: &dyn SimilarityMetric, query: &[f64], candidates: Vec<Chunk>) -> Ranking {
    let mut ranking = Ranking::default();

    for chunk in candidates {
        match metric.score(query, &chunk.embedding) {
            Ok(score) if score.is_finite() => ranking.scored.push(ScoredChunk { score, chunk }),
            Ok(_) => ranking.degenerate += 1,
            Err(e) => {
                debug!(metric = metric.name(), "Skipping candidate: {e}");
                ranking.mismatched += 1;
            }
        }
    }

    // sort_by is stable, so equal scores stay in scan order
    ranking.scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranking
}
