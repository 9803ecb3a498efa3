/// Context assembly and prompt rendering.
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::ranker::ScoredChunk;
use crate::template;
use crate::tokens;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are a helpful assistant. Answer the question using only the context below.
If the context does not contain the answer, say that you do not know.

Context:
{{context}}

Question: {{question}}
Answer:";

/// Chunk texts, best match first, separated by a blank line.
pub fn assemble_context(matches: &[ScoredChunk]) -> String {
    matches
        .iter()
        .map(|m| m.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render `prompt_template` with the context block and the question.
pub fn build_prompt(prompt_template: &str, context: &str, question: &str) -> String {
    let vars = HashMap::from([("context", context), ("question", question)]);
    let rendered = template::render(prompt_template, &vars);
    if !rendered.missing.is_empty() {
        warn!("Prompt template has unfilled placeholders: {:?}", rendered.missing);
    }

    debug!(
        tokens = tokens::estimate_advanced(&rendered.text),
        "Assembled prompt"
    );
    rendered.text
}
