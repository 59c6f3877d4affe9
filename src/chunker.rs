use std::fmt;

/// Which of the two source documents a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Pdf,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Csv => write!(f, "csv"),
            SourceKind::Pdf => write!(f, "pdf"),
        }
    }
}

/// A bounded fragment of a source document. Ids are zero-based ordinals
/// assigned per source and are only stable within a single index build.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub source: SourceKind,
    pub id: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ChunkPolicy {
    /// Data rows grouped into one tabular chunk.
    pub rows_per_chunk: usize,
    /// Maximum characters per prose chunk before hard-splitting.
    pub max_chunk_chars: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            rows_per_chunk: 120,
            max_chunk_chars: 900,
        }
    }
}

/// Splits raw document text into chunks using the policy appropriate for
/// the source kind. Empty input yields an empty Vec.
pub fn chunk_document(text: &str, source: SourceKind, policy: &ChunkPolicy) -> Vec<Chunk> {
    match source {
        SourceKind::Csv => chunk_tabular(text, source, policy.rows_per_chunk),
        SourceKind::Pdf => chunk_prose(text, source, policy.max_chunk_chars),
    }
}

/// Tabular text: the first non-empty line is the header; data rows are
/// grouped into fixed-size batches. Every batch carries the header and a
/// 1-based row-range label so each chunk is self-describing out of context.
fn chunk_tabular(text: &str, source: SourceKind, rows_per_chunk: usize) -> Vec<Chunk> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let rows: Vec<&str> = lines.collect();

    rows.chunks(rows_per_chunk)
        .enumerate()
        .map(|(id, batch)| {
            let first = id * rows_per_chunk + 1;
            let last = first + batch.len() - 1;
            let text = format!("rows {first}-{last}\n{header}\n{}", batch.join("\n"));
            Chunk { source, id, text }
        })
        .collect()
}

/// Free text: split on blank-line boundaries into paragraph-like units.
/// Units at or under the maximum length become one chunk each; oversized
/// units are hard-split into maximum-length windows with no overlap.
fn chunk_prose(text: &str, source: SourceKind, max_chunk_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for unit in text.split("\n\n") {
        let unit = unit.trim();
        if unit.is_empty() {
            continue;
        }
        if unit.chars().count() <= max_chunk_chars {
            chunks.push(Chunk {
                source,
                id: chunks.len(),
                text: unit.to_string(),
            });
        } else {
            let chars: Vec<char> = unit.chars().collect();
            for window in chars.chunks(max_chunk_chars) {
                chunks.push(Chunk {
                    source,
                    id: chunks.len(),
                    text: window.iter().collect(),
                });
            }
        }
    }
    chunks
}

/// Truncates a string to at most `max` characters, on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
