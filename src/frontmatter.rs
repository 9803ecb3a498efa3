/// YAML frontmatter parsing and generation for markdown documents.
///
/// A frontmatter block is a YAML mapping fenced by `---` lines at the very
/// top of a document. Values are flattened to scalars or lists of scalars so
/// they can travel with every chunk and be matched by query filters.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

/// Errors raised while reading or writing a frontmatter block.
#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("frontmatter not closed")]
    Unclosed,

    #[error("malformed frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("frontmatter must be a mapping, found {0}")]
    NotAMapping(&'static str),

    #[error("unsupported frontmatter key: {0}")]
    InvalidKey(String),
}

/// A single metadata value attached to a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<MetaValue>),
}

/// Metadata mapping. Ordered so records serialize deterministically.
pub type Metadata = BTreeMap<String, MetaValue>;

impl fmt::Display for MetaValue {
    /// Textual form used by filters; lists join their items with commas.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{b}"),
            MetaValue::Number(n) => write!(f, "{n}"),
            MetaValue::Text(s) => f.write_str(s),
            MetaValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

/// Parse frontmatter from document content. Returns `(metadata, body)`.
///
/// A document without a leading `---` line has no frontmatter: the metadata
/// is empty and the body is the full text.
pub fn parse(content: &str) -> Result<(Metadata, String), FrontmatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let lines: Vec<&str> = content.lines().collect();

    if lines.first().map(|l| l.trim()) != Some("---") {
        return Ok((Metadata::new(), content.to_string()));
    }

    // Find closing delimiter
    let end_idx = lines[1..]
        .iter()
        .position(|l| matches!(l.trim(), "---" | "..."))
        .map(|i| i + 1)
        .ok_or(FrontmatterError::Unclosed)?;

    let block = lines[1..end_idx].join("\n");
    let body = lines[end_idx + 1..].join("\n");

    Ok((parse_block(&block)?, body))
}

fn parse_block(block: &str) -> Result<Metadata, FrontmatterError> {
    if block.trim().is_empty() {
        return Ok(Metadata::new());
    }

    let mapping = match serde_yaml::from_str::<Value>(block)? {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(Metadata::new()),
        other => return Err(FrontmatterError::NotAMapping(kind(&other))),
    };

    let mut metadata = Metadata::new();
    for (key, value) in mapping {
        let key = match key {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => return Err(FrontmatterError::InvalidKey(format!("{other:?}"))),
        };
        // Null values behave like an absent key.
        if let Some(value) = convert(value) {
            metadata.insert(key, value);
        }
    }
    Ok(metadata)
}

fn convert(value: Value) -> Option<MetaValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(MetaValue::Bool(b)),
        Value::Number(n) => Some(convert_number(&n)),
        Value::String(s) => Some(MetaValue::Text(s)),
        Value::Sequence(items) => Some(MetaValue::List(
            items.into_iter().filter_map(convert).collect(),
        )),
        mapping @ Value::Mapping(_) => serde_json::to_string(&mapping).ok().map(MetaValue::Text),
        Value::Tagged(tagged) => convert(tagged.value),
    }
}

fn convert_number(n: &serde_yaml::Number) -> MetaValue {
    if let Some(i) = n.as_i64() {
        return MetaValue::Number(i.into());
    }
    if let Some(u) = n.as_u64() {
        return MetaValue::Number(u.into());
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(MetaValue::Number)
        .unwrap_or_else(|| MetaValue::Text(n.to_string()))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Generate a frontmatter block (including both fences) from metadata.
pub fn generate(metadata: &Metadata) -> Result<String, FrontmatterError> {
    if metadata.is_empty() {
        return Ok("---\n---\n".to_string());
    }
    let yaml = serde_yaml::to_string(metadata)?;
    Ok(format!("---\n{yaml}---\n"))
}

/// Prefix `body` with a frontmatter block built from `metadata`.
pub fn compose(metadata: &Metadata, body: &str) -> Result<String, FrontmatterError> {
    let mut doc = generate(metadata)?;
    doc.push_str(body.trim_start_matches('\n'));
    if !doc.ends_with('\n') {
        doc.push('\n');
    }
    Ok(doc)
}
