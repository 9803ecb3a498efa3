/// MCP tool handlers.
///
/// 1. ask             – query a topic, returning the prompt or generated answer
/// 2. ingest          – ingest a document file or inline text
/// 3. list_topics     – list topics and their record logs
/// 4. estimate_tokens – heuristic token count for a text
use crate::mcp::server::McpContext;
use crate::retrieval::{QueryOutcome, QueryResponse};
use crate::tokens;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::Path;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct AskParams {
    /// Topic to search (directory name under the topics root)
    topic: String,
    /// Question (natural language)
    question: String,
    /// Metadata filters, each `key OP value` with OP one of =, >=, <=, >, <, in
    filters: Option<Vec<String>>,
}

#[derive(Deserialize, JsonSchema)]
struct IngestParams {
    /// Markdown file to ingest
    filepath: Option<String>,
    /// Target topic (inferred from the file path if omitted)
    topic: Option<String>,
    /// Inline document text (requires topic and name)
    content: Option<String>,
    /// Record log name for inline content
    name: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct TextParam {
    /// Text to measure
    text: String,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

/// Tool-facing JSON for a query; embeddings are left out.
pub fn response_json(response: &QueryResponse) -> serde_json::Value {
    let diagnostics = &response.diagnostics;
    let mut value = match &response.outcome {
        QueryOutcome::Answer {
            matches,
            prompt,
            completion,
        } => serde_json::json!({
            "status": "answer",
            "answer": completion,
            "prompt": prompt,
            "matches": matches
                .iter()
                .map(|m| serde_json::json!({
                    "score": m.score,
                    "text": m.chunk.text,
                    "meta": m.chunk.metadata,
                }))
                .collect::<Vec<_>>(),
        }),
        other => serde_json::to_value(other).unwrap_or_default(),
    };

    value["threshold"] = serde_json::json!(diagnostics.threshold);
    value["records"] = serde_json::json!(diagnostics.records);
    value["candidates"] = serde_json::json!(diagnostics.candidates);
    if !diagnostics.rejected_filters.is_empty() {
        value["rejected_filters"] = serde_json::json!(
            diagnostics
                .rejected_filters
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        );
    }
    if !diagnostics.scan_failures.is_empty() {
        value["corrupt_records"] = serde_json::json!(diagnostics.scan_failures.len());
    }
    if !diagnostics.scores.is_empty() {
        value["scores"] = serde_json::json!(diagnostics.scores);
    }
    value
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    // ── Tool 1: ask ─────────────────────────────────────────────────

    #[tool(
        description = "Retrieve the chunks of a topic most similar to a question. Returns the generated answer when a completion endpoint is configured, otherwise the assembled prompt. status is answer, no_candidates or no_confident_match."
    )]
    async fn ask(&self, params: Parameters<AskParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.topic.is_empty() || p.question.is_empty() {
            return error_result("topic and question are required");
        }

        let filters = p.filters.unwrap_or_default();
        let response = self
            .ctx
            .retriever
            .query(&p.topic, &p.question, &filters)
            .await
            .map_err(|e| McpError::internal_error(format!("query failed: {e}"), None))?;

        json_result(response_json(&response))
    }

    // ── Tool 2: ingest ──────────────────────────────────────────────

    #[tool(description = "Ingest a markdown document (file path or inline content) into a topic")]
    async fn ingest(&self, params: Parameters<IngestParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let retriever = &self.ctx.retriever;

        if let Some(content) = &p.content {
            let (Some(topic), Some(name)) = (&p.topic, &p.name) else {
                return error_result("inline content requires topic and name");
            };
            let chunks = match retriever.ingest(topic, name, content).await {
                Ok(n) => n,
                Err(e) if e.is_document_local() => return error_result(&e.to_string()),
                Err(e) => {
                    return Err(McpError::internal_error(format!("ingest failed: {e}"), None));
                }
            };
            return json_result(serde_json::json!({
                "success": true,
                "topic": topic,
                "log": name,
                "chunks": chunks,
            }));
        }

        let Some(filepath) = &p.filepath else {
            return error_result("filepath or content is required");
        };
        let path = Path::new(filepath);
        if !path.exists() {
            return error_result(&format!("file not found: {filepath}"));
        }

        match retriever.ingest_file(path, p.topic.as_deref()).await {
            Ok(report) => json_result(serde_json::json!({
                "success": true,
                "topic": report.topic,
                "log": report.log,
                "chunks": report.chunks,
            })),
            Err(e) if e.is_document_local() => error_result(&e.to_string()),
            Err(e) => Err(McpError::internal_error(format!("ingest failed: {e}"), None)),
        }
    }

    // ── Tool 3: list_topics ─────────────────────────────────────────

    #[tool(description = "List topics and their record logs")]
    async fn list_topics(&self) -> Result<CallToolResult, McpError> {
        let store = self.ctx.retriever.store();
        let topics = store
            .topics()
            .map_err(|e| McpError::internal_error(format!("list failed: {e}"), None))?;

        let mut entries = Vec::with_capacity(topics.len());
        for topic in topics {
            let logs: Vec<String> = store
                .logs(&topic)
                .map_err(|e| McpError::internal_error(format!("list failed: {e}"), None))?
                .iter()
                .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
                .collect();
            entries.push(serde_json::json!({ "topic": topic, "logs": logs }));
        }

        json_result(serde_json::json!({
            "root": self.ctx.config.topics_dir,
            "topics": entries,
        }))
    }

    // ── Tool 4: estimate_tokens ─────────────────────────────────────

    #[tool(description = "Estimate how many LLM tokens a text will use")]
    async fn estimate_tokens(
        &self,
        params: Parameters<TextParam>,
    ) -> Result<CallToolResult, McpError> {
        let text = &params.0.text;
        let stats = tokens::estimate(text);
        json_result(serde_json::json!({
            "tokens": stats.tokens,
            "advanced": tokens::estimate_advanced(text),
            "quick": tokens::quick_estimate(text),
            "words": stats.words,
            "chars": stats.chars,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RetrievalConfig};
    use crate::embedder::mock::MockEmbedder;
    use crate::retrieval::Retriever;
    use crate::store::VectorStore;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn tools(root: &Path) -> AppTools {
        tools_with(root, RetrievalConfig::default())
    }

    fn tools_with(root: &Path, config: RetrievalConfig) -> AppTools {
        let retriever = Retriever::new(
            VectorStore::open(root),
            Arc::new(MockEmbedder::new(32)),
            config,
        );
        AppTools::new(McpContext {
            retriever: Arc::new(retriever),
            config: Arc::new(Config::default()),
        })
    }

    fn text_of(result: &CallToolResult) -> serde_json::Value {
        let raw = serde_json::to_value(result).unwrap();
        serde_json::from_str(raw["content"][0]["text"].as_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_then_ask() {
        let temp = tempdir().unwrap();
        let tools = tools(temp.path());

        let result = tools
            .ingest(Parameters(IngestParams {
                filepath: None,
                topic: Some("travel".into()),
                content: Some("---\nstatus: current\n---\nfolding travel kettle".into()),
                name: Some("kettles".into()),
            }))
            .await
            .unwrap();
        assert_eq!(text_of(&result)["chunks"], 1);

        let result = tools
            .ask(Parameters(AskParams {
                topic: "travel".into(),
                question: "folding travel kettle".into(),
                filters: Some(vec!["status=current".into(), "???".into()]),
            }))
            .await
            .unwrap();
        let value = text_of(&result);
        assert_eq!(value["status"], "answer");
        assert_eq!(value["matches"][0]["meta"]["status"], "current");
        assert_eq!(value["rejected_filters"].as_array().unwrap().len(), 1);

        let result = tools.list_topics().await.unwrap();
        let value = text_of(&result);
        assert_eq!(
            value["topics"],
            serde_json::json!([{ "topic": "travel", "logs": ["kettles"] }])
        );
        assert_eq!(value["root"], "./topics");
    }

    #[tokio::test]
    async fn test_ingest_file_with_concurrent_embedding() {
        let temp = tempdir().unwrap();
        let topics = temp.path().join("topics");
        let doc = topics.join("travel").join("kettles.md");
        std::fs::create_dir_all(doc.parent().unwrap()).unwrap();
        let body: String = (1..=7).map(|i| format!("kettle line {i}\n")).collect();
        std::fs::write(&doc, format!("---\nstatus: current\n---\n{body}")).unwrap();

        let config = RetrievalConfig {
            chunk_lines: 2,
            embed_concurrency: 4,
            ..RetrievalConfig::default()
        };
        let tools = tools_with(&topics, config);

        // Spawning needs the handler future to be Send, as the tool router does
        let handle = {
            let tools = tools.clone();
            let filepath = doc.to_str().unwrap().to_string();
            tokio::spawn(async move {
                tools
                    .ingest(Parameters(IngestParams {
                        filepath: Some(filepath),
                        topic: None,
                        content: None,
                        name: None,
                    }))
                    .await
            })
        };
        let result = handle.await.unwrap().unwrap();
        let value = text_of(&result);
        assert_eq!(value["topic"], "travel");
        assert_eq!(value["log"], "kettles");
        assert_eq!(value["chunks"], 4);

        let report = tools.ctx.retriever.store().scan_all("travel").unwrap();
        let texts: Vec<&str> = report.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "kettle line 1\nkettle line 2",
                "kettle line 3\nkettle line 4",
                "kettle line 5\nkettle line 6",
                "kettle line 7",
            ]
        );
    }

    #[tokio::test]
    async fn test_ask_empty_topic_is_not_an_error() {
        let temp = tempdir().unwrap();
        let result = tools(temp.path())
            .ask(Parameters(AskParams {
                topic: "nothing".into(),
                question: "anything".into(),
                filters: None,
            }))
            .await
            .unwrap();
        assert_ne!(serde_json::to_value(&result).unwrap()["isError"], true);
        let value = text_of(&result);
        assert_eq!(value["status"], "no_candidates");
        assert_eq!(value["reason"], "empty_topic");
    }

    #[tokio::test]
    async fn test_estimate_tokens() {
        let temp = tempdir().unwrap();
        let result = tools(temp.path())
            .estimate_tokens(Parameters(TextParam {
                text: "Hello world! This is a simple test sentence.".into(),
            }))
            .await
            .unwrap();
        let value = text_of(&result);
        assert_eq!(value["tokens"], 14);
        assert_eq!(value["words"], 8);
    }
}
