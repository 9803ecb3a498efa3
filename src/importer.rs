/// CSV → frontmatter markdown importer.
///
/// Each row becomes one `<name>.md` file: the body column is the document
/// body and every other non-empty cell becomes a frontmatter entry.
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::frontmatter::{self, FrontmatterError, MetaValue, Metadata};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV has no header row")]
    NoColumns,

    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Column holding the document body; the last column when unset.
    pub body_column: Option<String>,
    /// Column used for file names; row numbers when unset.
    pub name_column: Option<String>,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub written: Vec<PathBuf>,
    /// Rows skipped for an empty body.
    pub skipped: usize,
}

pub fn import_csv(
    csv_path: &Path,
    out_dir: &Path,
    options: &ImportOptions,
) -> Result<ImportSummary, ImportError> {
    let file = fs::File::open(csv_path).map_err(|source| ImportError::Io {
        path: csv_path.to_path_buf(),
        source,
    })?;
    import_reader(file, out_dir, options)
}

pub fn import_reader<R: Read>(
    reader: R,
    out_dir: &Path,
    options: &ImportOptions,
) -> Result<ImportSummary, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(ImportError::NoColumns);
    }

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| ImportError::UnknownColumn(name.to_string()))
    };
    let body_idx = match &options.body_column {
        Some(name) => column(name)?,
        None => headers.len() - 1,
    };
    let name_idx = options.name_column.as_deref().map(column).transpose()?;

    fs::create_dir_all(out_dir).map_err(|source| ImportError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut summary = ImportSummary::default();
    let mut used = HashSet::new();

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let row = row + 1;

        let body = record.get(body_idx).unwrap_or("").trim();
        if body.is_empty() {
            warn!("Skipping row {row}: empty body");
            summary.skipped += 1;
            continue;
        }

        let mut metadata = Metadata::new();
        for (idx, (header, cell)) in headers.iter().zip(record.iter()).enumerate() {
            let cell = cell.trim();
            if idx == body_idx || cell.is_empty() {
                continue;
            }
            metadata.insert(header.trim().to_string(), cell_value(cell));
        }

        let base = name_idx
            .and_then(|idx| record.get(idx))
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("row-{row}"));
        let name = unique_name(&base, &mut used);

        let path = out_dir.join(format!("{name}.md"));
        let content = frontmatter::compose(&metadata, body)?;
        fs::write(&path, content).map_err(|source| ImportError::Io {
            path: path.clone(),
            source,
        })?;
        summary.written.push(path);
    }

    info!(
        "Imported {} document(s) into {}, skipped {}",
        summary.written.len(),
        out_dir.display(),
        summary.skipped
    );
    Ok(summary)
}

fn cell_value(cell: &str) -> MetaValue {
    if let Ok(i) = cell.parse::<i64>() {
        return MetaValue::Number(i.into());
    }
    cell.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| MetaValue::Text(cell.to_string()), MetaValue::Number)
}

/// Lowercase ASCII alphanumerics; runs of anything else become one `-`.
fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    for c in s.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn unique_name(base: &str, used: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{base}-{n}");
        n += 1;
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CSV: &str = "\
title,price,rating,description
Travel Kettle,19.95,4,A compact kettle for trips
Travel Kettle,24.50,,Larger model
Empty,1,1,
";

    #[test]
    fn test_import_rows() {
        let temp = tempdir().unwrap();
        let options = ImportOptions {
            name_column: Some("title".into()),
            ..ImportOptions::default()
        };
        let summary = import_reader(CSV.as_bytes(), temp.path(), &options).unwrap();

        assert_eq!(summary.skipped, 1);
        let names: Vec<_> = summary
            .written
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["travel-kettle.md", "travel-kettle-2.md"]);

        let content = fs::read_to_string(&summary.written[0]).unwrap();
        let (meta, body) = frontmatter::parse(&content).unwrap();
        assert_eq!(body.trim(), "A compact kettle for trips");
        assert!(matches!(meta["rating"], MetaValue::Number(_)));
        assert_eq!(meta["price"].to_string(), "19.95");
        assert_eq!(meta["title"].to_string(), "Travel Kettle");

        let content = fs::read_to_string(&summary.written[1]).unwrap();
        let (meta, _) = frontmatter::parse(&content).unwrap();
        assert!(!meta.contains_key("rating"));
    }

    #[test]
    fn test_body_column_and_row_names() {
        let temp = tempdir().unwrap();
        let options = ImportOptions {
            body_column: Some("title".into()),
            ..ImportOptions::default()
        };
        let summary = import_reader(CSV.as_bytes(), temp.path(), &options).unwrap();
        assert_eq!(summary.written.len(), 3);
        assert!(summary.written[0].ends_with("row-1.md"));

        let content = fs::read_to_string(&summary.written[2]).unwrap();
        let (meta, body) = frontmatter::parse(&content).unwrap();
        assert_eq!(body.trim(), "Empty");
        assert!(!meta.contains_key("description"));
    }

    #[test]
    fn test_unknown_column() {
        let temp = tempdir().unwrap();
        let options = ImportOptions {
            body_column: Some("nope".into()),
            ..ImportOptions::default()
        };
        let err = import_reader(CSV.as_bytes(), temp.path(), &options).unwrap_err();
        assert!(matches!(err, ImportError::UnknownColumn(c) if c == "nope"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Travel Kettle (XL)! "), "travel-kettle-xl");
        assert_eq!(slugify("***"), "");
    }
}
