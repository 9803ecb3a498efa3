//! Line-group chunking.
//!
//! A body is reduced to its non-empty, trimmed lines; every `group`
//! consecutive lines form one chunk. A trailing partial group becomes a
//! shorter final chunk.

/// Default number of lines per chunk.
pub const DEFAULT_GROUP: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    pub position: usize,
}

/// Ordered, finite chunk sequence over a borrowed body.
///
/// Cloning or calling [`LineChunks::restart`] replays the same chunks.
#[derive(Debug, Clone)]
pub struct LineChunks<'a> {
    lines: Vec<&'a str>,
    group: usize,
    next: usize,
}

/// Split `body` into chunks of `group` lines. A `group` of 0 is treated as 1.
pub fn chunk_lines(body: &str, group: usize) -> LineChunks<'_> {
    let lines = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    LineChunks {
        lines,
        group: group.max(1),
        next: 0,
    }
}

/// Convenience wrapper collecting the chunk texts.
pub fn split_into_chunks(body: &str, group: usize) -> Vec<String> {
    chunk_lines(body, group).map(|c| c.content).collect()
}

impl LineChunks<'_> {
    /// Rewind to the first chunk.
    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Iterator for LineChunks<'_> {
    type Item = TextChunk;

    fn next(&mut self) -> Option<TextChunk> {
        let start = self.next * self.group;
        if start >= self.lines.len() {
            return None;
        }
        let end = (start + self.group).min(self.lines.len());
        let chunk = TextChunk {
            content: self.lines[start..end].join("\n"),
            position: self.next,
        };
        self.next += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let total = self.lines.len().div_ceil(self.group);
        let remaining = total.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LineChunks<'_> {}
