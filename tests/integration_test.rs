/// End-to-end integration tests for the topicrag pipeline.
///
/// Tests the complete flow:
///   Config → Store → Embedder → Indexer → Filter → Ranker → Threshold → Prompt
use std::fs;
use std::sync::Arc;

use tempfile::tempdir;
use topicrag::config::{Config, RetrievalConfig};
use topicrag::embedder::Embedder;
use topicrag::embedder::mock::{FixtureEmbedder, MockEmbedder};
use topicrag::frontmatter::MetaValue;
use topicrag::retrieval::{EmptyReason, QueryOutcome, Retriever};
use topicrag::store::{StoreError, VectorStore};

const NO_FILTERS: &[&str] = &[];

/// Unit vector whose cosine with the first axis is `cos`, bent toward `axis`.
fn at_angle(cos: f64, axis: usize, dims: usize) -> Vec<f64> {
    let mut v = vec![0.0; dims];
    v[0] = cos;
    v[axis] = (1.0 - cos * cos).sqrt();
    v
}

fn config_with(threshold: f64) -> RetrievalConfig {
    RetrievalConfig {
        min_similarity_threshold: threshold,
        ..RetrievalConfig::default()
    }
}

/// Full pipeline: write docs → ingest batch → topics → ask
#[tokio::test]
async fn test_full_pipeline() {
    // 1. Topics directory with two documents in one topic
    let temp_dir = tempdir().unwrap();
    let topics = temp_dir.path().join("topics");
    let docs = topics.join("gear");
    fs::create_dir_all(&docs).unwrap();

    fs::write(
        docs.join("kettles.md"),
        "---\ncategory: kitchen\nrating: 4\n---\nA compact travel kettle\nBoils water in three minutes\nFolds flat for packing\n",
    )
    .unwrap();
    fs::write(
        docs.join("tents.md"),
        "---\ncategory: camping\nrating: 2\n---\nA two person dome tent\nWeighs under two kilograms\n",
    )
    .unwrap();

    // 2. Config file drives the retriever
    let config_path = temp_dir.path().join("topicrag.json");
    fs::write(
        &config_path,
        format!(
            r#"{{"topics_dir": {:?}, "retrieval": {{"chunk_lines": 3, "min_similarity_threshold": 0.1}}}}"#,
            topics.to_str().unwrap()
        ),
    )
    .unwrap();
    let config = Config::load(config_path.to_str().unwrap()).unwrap();
    config.validate().unwrap();

    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::default());
    let retriever = Retriever::new(
        VectorStore::open(config.topics_path()),
        embedder,
        config.retrieval.clone(),
    );

    // 3. Ingest the batch; topic inferred from the directory layout
    let paths = vec![docs.join("kettles.md"), docs.join("tents.md")];
    let summary = retriever.ingest_paths(&paths, None).await.unwrap();
    assert!(summary.failed.is_empty(), "{:?}", summary.failed);
    assert_eq!(summary.chunks(), 2);
    assert_eq!(retriever.store().topics().unwrap(), vec!["gear"]);
    assert!(topics.join("gear/memory/kettles.jsonl").is_file());

    // 4. Ask with a filter
    let response = retriever
        .query("gear", "travel kettle boils water", &["category=kitchen", "rating>=3"])
        .await
        .unwrap();
    match &response.outcome {
        QueryOutcome::Answer { matches, prompt, completion } => {
            assert_eq!(matches.len(), 1);
            assert!(matches[0].chunk.text.starts_with("A compact travel kettle"));
            assert_eq!(matches[0].chunk.metadata["category"], MetaValue::Text("kitchen".into()));
            assert!(prompt.contains("Question: travel kettle boils water"));
            assert!(completion.is_none());
        }
        other => panic!("expected an answer, got {other:?}"),
    }
    assert_eq!(response.diagnostics.records, 2);
    assert_eq!(response.diagnostics.candidates, 1);
}

/// Worked example: price frontmatter, 3-line chunks, known scores.
#[tokio::test]
async fn test_round_trip_scores() {
    let temp_dir = tempdir().unwrap();
    let body_lines: Vec<String> = (1..=12).map(|i| format!("widget line {i}")).collect();
    let chunk_text = |n: usize| body_lines[n * 3..n * 3 + 3].join("\n");

    let embedder = FixtureEmbedder::new()
        .with("A travel widget 19.95", at_angle(1.0, 1, 5))
        .with(chunk_text(0), at_angle(0.563, 1, 5))
        .with(chunk_text(1), at_angle(0.784, 2, 5))
        .with(chunk_text(2), at_angle(0.2, 3, 5))
        .with(chunk_text(3), at_angle(0.573, 4, 5));

    let retriever = Retriever::new(
        VectorStore::open(temp_dir.path()),
        Arc::new(embedder),
        RetrievalConfig::default(),
    );
    let doc = format!("---\nprice: \"$19.95\"\n---\n{}\n", body_lines.join("\n"));
    assert_eq!(retriever.ingest("travel", "widgets", &doc).await.unwrap(), 4);

    let response = retriever
        .query("travel", "A travel widget 19.95", NO_FILTERS)
        .await
        .unwrap();
    let QueryOutcome::Answer { matches, .. } = response.outcome else {
        panic!("expected an answer");
    };

    let scores: Vec<f64> = matches.iter().map(|m| m.score).collect();
    let expected = [0.784, 0.573, 0.563];
    assert_eq!(scores.len(), 3);
    for (got, want) in scores.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9, "got {scores:?}");
    }
    assert_eq!(matches[0].chunk.text, chunk_text(1));
    assert_eq!(matches[1].chunk.text, chunk_text(3));
    assert_eq!(matches[0].chunk.metadata["price"].to_string(), "$19.95");
}

/// Same corpus and query, outcome decided only by the threshold.
#[tokio::test]
async fn test_threshold_gate_scenario() {
    let temp_dir = tempdir().unwrap();
    let make = || {
        FixtureEmbedder::new()
            .with("stored", at_angle(1.0, 1, 2))
            .with("question", at_angle(0.338, 1, 2))
    };

    let strict = Retriever::new(
        VectorStore::open(temp_dir.path()),
        Arc::new(make()),
        config_with(0.42),
    );
    strict.ingest("t", "doc", "stored").await.unwrap();

    match strict.query("t", "question", NO_FILTERS).await.unwrap().outcome {
        QueryOutcome::NoConfidentMatch { top_score, threshold } => {
            assert!((top_score.unwrap() - 0.338).abs() < 1e-9);
            assert!((threshold - 0.42).abs() < f64::EPSILON);
        }
        other => panic!("expected no confident match, got {other:?}"),
    }

    let lenient = Retriever::new(
        VectorStore::open(temp_dir.path()),
        Arc::new(make()),
        config_with(0.32),
    );
    match lenient.query("t", "question", NO_FILTERS).await.unwrap().outcome {
        QueryOutcome::Answer { matches, .. } => {
            assert!((matches[0].score - 0.338).abs() < 1e-9);
        }
        other => panic!("expected an answer, got {other:?}"),
    }
}

/// No data, everything filtered out, and below-threshold are distinct.
#[tokio::test]
async fn test_three_empty_outcomes() {
    let temp_dir = tempdir().unwrap();
    let retriever = Retriever::new(
        VectorStore::open(temp_dir.path()),
        Arc::new(MockEmbedder::new(64)),
        config_with(0.99),
    );

    let empty = retriever.query("books", "anything", NO_FILTERS).await.unwrap();
    assert_eq!(
        empty.outcome,
        QueryOutcome::NoCandidates {
            reason: EmptyReason::EmptyTopic,
        }
    );

    retriever
        .ingest(
            "books",
            "novels",
            "---\nstatus: current\nrating: 5\n---\nA quiet novel about lighthouses",
        )
        .await
        .unwrap();

    let filtered = retriever
        .query("books", "lighthouses", &["status=archived"])
        .await
        .unwrap();
    assert_eq!(
        filtered.outcome,
        QueryOutcome::NoCandidates {
            reason: EmptyReason::FilteredOut,
        }
    );

    let weak = retriever
        .query("books", "spaceships and lasers", &["status=current", "???bad???", "rating>=3"])
        .await
        .unwrap();
    assert!(matches!(weak.outcome, QueryOutcome::NoConfidentMatch { .. }));
    assert_eq!(weak.diagnostics.rejected_filters.len(), 1);
    assert_eq!(weak.diagnostics.candidates, 1);
}

/// A torn line in the middle of a log costs only that record.
#[tokio::test]
async fn test_corrupt_line_recovery() {
    let temp_dir = tempdir().unwrap();
    let retriever = Retriever::new(
        VectorStore::open(temp_dir.path()),
        Arc::new(MockEmbedder::new(32)),
        config_with(0.0),
    );
    retriever.ingest("t", "a", "first record").await.unwrap();

    let log = retriever.store().log_path("t", "a").unwrap();
    let mut content = fs::read_to_string(&log).unwrap();
    content.push_str("{\"text\":\"torn\",\"embedding\":[0.1,\n");
    fs::write(&log, content).unwrap();

    // Appends after the corrupt line still land on their own lines
    retriever.ingest("t", "a", "second record").await.unwrap();

    let report = retriever.store().scan_all("t").unwrap();
    let texts: Vec<&str> = report.chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first record", "second record"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].line, 2);

    let response = retriever.query("t", "second record", NO_FILTERS).await.unwrap();
    let QueryOutcome::Answer { matches, .. } = response.outcome else {
        panic!("expected an answer");
    };
    assert_eq!(matches[0].chunk.text, "second record");
    assert_eq!(response.diagnostics.scan_failures.len(), 1);
}

/// Records of another dimension cannot join an existing topic.
#[tokio::test]
async fn test_dimension_is_fixed_per_topic() {
    let temp_dir = tempdir().unwrap();
    let small = Retriever::new(
        VectorStore::open(temp_dir.path()),
        Arc::new(MockEmbedder::new(8)),
        RetrievalConfig::default(),
    );
    small.ingest("t", "a", "eight dims").await.unwrap();

    let large = Retriever::new(
        VectorStore::open(temp_dir.path()),
        Arc::new(MockEmbedder::new(16)),
        RetrievalConfig::default(),
    );
    let err = large.ingest("t", "b", "sixteen dims").await.unwrap_err();
    assert!(err.to_string().contains("dimension mismatch"), "{err}");
    assert!(matches!(
        err,
        topicrag::indexer::IngestError::Store(StoreError::DimensionMismatch {
            expected: 8,
            found: 16,
            ..
        })
    ));
}
