//! # topicrag CLI
//!
//! - `topicrag ingest <PATH>...` - chunk, embed and store documents
//! - `topicrag ask <TOPIC> <QUESTION> [--filter EXPR]...` - query a topic
//! - `topicrag topics` - list topics
//! - `topicrag tokens [TEXT]` - estimate token counts
//! - `topicrag import-csv <CSV> <OUT_DIR>` - convert CSV rows to markdown
//! - `topicrag serve` - run the MCP server on stdio

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use topicrag::completion::HttpCompleter;
use topicrag::config::{Config, DEFAULT_CONFIG_PATH};
use topicrag::embedder::Embedder;
use topicrag::embedder::http::HttpEmbedder;
use topicrag::embedder::mock::MockEmbedder;
use topicrag::importer::{self, ImportOptions};
use topicrag::mcp::server::{McpContext, McpServer};
use topicrag::mcp::tools::response_json;
use topicrag::retrieval::{EmptyReason, QueryOutcome, Retriever};
use topicrag::store::VectorStore;
use topicrag::tokens;

#[derive(Parser)]
#[command(name = "topicrag")]
#[command(about = "Topic-scoped retrieval over flat-file vector stores")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override the topics directory
    #[arg(long, global = true)]
    topics_dir: Option<String>,

    /// Use the built-in hashing embedder instead of the HTTP service
    #[arg(long, global = true)]
    mock_embeddings: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents (files, directories or glob patterns)
    Ingest {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Target topic (inferred from each path if omitted)
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Ask a question against a topic
    Ask {
        topic: String,

        question: String,

        /// Metadata filter `key OP value`; may repeat
        #[arg(long = "filter", value_name = "EXPR")]
        filters: Vec<String>,

        /// Maximum chunks in the context
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum top score to answer
        #[arg(long)]
        threshold: Option<f64>,

        /// Log every candidate's score
        #[arg(long)]
        debug: bool,
    },

    /// List topics
    Topics,

    /// Estimate the token count of TEXT (stdin when omitted)
    Tokens { text: Option<String> },

    /// Convert CSV rows into frontmatter markdown documents
    ImportCsv {
        csv: PathBuf,

        out_dir: PathBuf,

        /// Column holding the document body (default: last)
        #[arg(long)]
        body_column: Option<String>,

        /// Column used for file names (default: row number)
        #[arg(long)]
        name_column: Option<String>,
    },

    /// Run the MCP server on stdio
    Serve,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Tokens { text } => cmd_tokens(text.as_deref(), cli.format),
        Commands::ImportCsv {
            csv,
            out_dir,
            body_column,
            name_column,
        } => {
            let options = ImportOptions {
                body_column,
                name_column,
            };
            let summary = importer::import_csv(&csv, &out_dir, &options)
                .with_context(|| format!("failed to import {}", csv.display()))?;
            println!(
                "Wrote {} document(s) to {}, skipped {} row(s)",
                summary.written.len(),
                out_dir.display(),
                summary.skipped
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ingest { paths, topic } => {
            let config = load_config(&cli.config, cli.topics_dir.as_deref(), |_| {})?;
            let retriever = build_retriever(&config, cli.mock_embeddings)?;
            cmd_ingest(&retriever, &paths, topic.as_deref(), cli.format).await
        }
        Commands::Ask {
            topic,
            question,
            filters,
            top_k,
            threshold,
            debug,
        } => {
            let config = load_config(&cli.config, cli.topics_dir.as_deref(), |config| {
                if let Some(k) = top_k {
                    config.retrieval.top_k = k;
                }
                if let Some(t) = threshold {
                    config.retrieval.min_similarity_threshold = t;
                }
                config.retrieval.debug |= debug;
            })?;
            let retriever = build_retriever(&config, cli.mock_embeddings)?;
            cmd_ask(&retriever, &topic, &question, &filters, cli.format).await
        }
        Commands::Topics => {
            let config = load_config(&cli.config, cli.topics_dir.as_deref(), |_| {})?;
            cmd_topics(&VectorStore::open(config.topics_path()), cli.format)
        }
        Commands::Serve => {
            let config = load_config(&cli.config, cli.topics_dir.as_deref(), |_| {})?;
            let retriever = build_retriever(&config, cli.mock_embeddings)?;
            let ctx = McpContext {
                retriever: Arc::new(retriever),
                config: Arc::new(config),
            };
            McpServer::new(ctx).start().await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load the config file, apply command-line overrides, then validate.
fn load_config(
    path: &str,
    topics_dir: Option<&str>,
    overrides: impl FnOnce(&mut Config),
) -> Result<Config> {
    let mut config = Config::load(path)?;
    if let Some(dir) = topics_dir {
        config.topics_dir = dir.to_string();
    }
    overrides(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_retriever(config: &Config, mock_embeddings: bool) -> Result<Retriever> {
    let embedder: Arc<dyn Embedder> = if mock_embeddings {
        info!("Using the built-in hashing embedder");
        Arc::new(MockEmbedder::default())
    } else {
        Arc::new(
            HttpEmbedder::from_config(&config.embedding)
                .context("failed to create embedding client")?,
        )
    };

    let store = VectorStore::open(config.topics_path());
    let mut retriever = Retriever::new(store, embedder, config.retrieval.clone());
    if let Some(completer) = HttpCompleter::from_config(&config.completion)
        .context("failed to create completion client")?
    {
        retriever = retriever.with_completer(Arc::new(completer));
    }
    Ok(retriever)
}

/// Expand directories to their markdown files and glob patterns to matches.
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        let pattern = if Path::new(input).is_dir() {
            format!("{}/**/*.md", input.trim_end_matches('/'))
        } else if input.contains(['*', '?', '[']) {
            input.clone()
        } else {
            paths.push(PathBuf::from(input));
            continue;
        };

        let mut matched: Vec<PathBuf> = glob::glob(&pattern)
            .with_context(|| format!("invalid pattern: {pattern}"))?
            .filter_map(|entry| match entry {
                Ok(path) if path.is_file() => Some(path),
                Ok(_) => None,
                Err(e) => {
                    warn!("Skipping unreadable path: {e}");
                    None
                }
            })
            .collect();
        if matched.is_empty() {
            warn!("No documents match {input}");
        }
        matched.sort();
        paths.append(&mut matched);
    }
    Ok(paths)
}

async fn cmd_ingest(
    retriever: &Retriever,
    inputs: &[String],
    topic: Option<&str>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let paths = expand_inputs(inputs)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Ingesting {} document(s)", paths.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = retriever.ingest_paths(&paths, topic).await;
    spinner.finish_and_clear();
    let summary = result.context("ingest failed")?;

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "ingested": summary.ingested.iter().map(|r| serde_json::json!({
                "path": r.path,
                "topic": r.topic,
                "log": r.log,
                "chunks": r.chunks,
            })).collect::<Vec<_>>(),
            "failed": summary.failed.iter().map(|f| serde_json::json!({
                "path": f.path,
                "error": f.error,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for report in &summary.ingested {
            println!(
                "{} -> {}/{} ({} chunks)",
                report.path.display(),
                report.topic,
                report.log,
                report.chunks
            );
        }
        for failure in &summary.failed {
            println!("FAILED {}: {}", failure.path.display(), failure.error);
        }
        println!(
            "Ingested {} document(s), {} chunk(s), {} failure(s)",
            summary.ingested.len(),
            summary.chunks(),
            summary.failed.len()
        );
    }

    Ok(if summary.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn cmd_ask(
    retriever: &Retriever,
    topic: &str,
    question: &str,
    filters: &[String],
    format: OutputFormat,
) -> Result<ExitCode> {
    let response = retriever
        .query(topic, question, filters)
        .await
        .with_context(|| format!("query against {topic} failed"))?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&response_json(&response))?);
    } else {
        match &response.outcome {
            QueryOutcome::Answer { .. } => {
                println!("{}", response.outcome.text().unwrap_or_default());
            }
            QueryOutcome::NoCandidates {
                reason: EmptyReason::EmptyTopic,
            } => println!("Topic {topic} has no data."),
            QueryOutcome::NoCandidates {
                reason: EmptyReason::FilteredOut,
            } => println!("No chunks in {topic} match the filters."),
            QueryOutcome::NoConfidentMatch {
                top_score,
                threshold,
            } => match top_score {
                Some(score) => println!(
                    "No confident match: best score {score:.4} is below {threshold}."
                ),
                None => println!("No confident match: no chunk could be scored."),
            },
        }
    }

    Ok(match response.outcome {
        QueryOutcome::Answer { .. } => ExitCode::SUCCESS,
        QueryOutcome::NoCandidates { .. } => ExitCode::from(2),
        QueryOutcome::NoConfidentMatch { .. } => ExitCode::from(3),
    })
}

fn cmd_topics(store: &VectorStore, format: OutputFormat) -> Result<ExitCode> {
    let topics = store.topics().context("failed to list topics")?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&topics)?);
    } else if topics.is_empty() {
        println!("No topics under {}", store.root().display());
    } else {
        for topic in topics {
            let logs = store.logs(&topic)?.len();
            println!("{topic} ({logs} log(s))");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_tokens(text: Option<&str>, format: OutputFormat) -> Result<ExitCode> {
    let text = match text {
        Some(t) => t.to_string(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let stats = tokens::estimate(&text);
    let advanced = tokens::estimate_advanced(&text);
    let quick = tokens::quick_estimate(&text);

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "tokens": stats.tokens,
            "advanced": advanced,
            "quick": quick,
            "words": stats.words,
            "chars": stats.chars,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Characters:        {}", stats.chars);
        println!("Words:             {}", stats.words);
        println!("Tokens (basic):    {}", stats.tokens);
        println!("Tokens (advanced): {advanced}");
        println!("Tokens (quick):    {quick}");
        println!("Chars per token:   {:.2}", stats.chars_per_token());
    }
    Ok(ExitCode::SUCCESS)
}
