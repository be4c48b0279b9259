//! Fixed-size, overlapping text chunking.
//!
//! Offsets are counted in characters (Unicode scalar values), so a window
//! never splits a multi-byte character. Windows advance by
//! `chunk_size - chunk_overlap` and stop as soon as one reaches the end of the
//! text, which gives `ceil((len - overlap) / (size - overlap))` chunks for text
//! longer than one window, a single chunk otherwise, and none for empty text.

use std::ops::Range;

use chrono::{DateTime, Utc};

use crate::document::{Chunk, ChunkMetadata, Document};
use crate::error::{RagError, Result};

pub(crate) fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidArgument("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidArgument(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Compute the character ranges covered by each chunk of a text of
/// `char_len` characters.
///
/// # Errors
///
/// Returns [`RagError::InvalidArgument`] if `chunk_size == 0` or
/// `chunk_overlap >= chunk_size`.
pub fn chunk_spans(
    char_len: usize,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Range<usize>>> {
    validate(chunk_size, chunk_overlap)?;

    let step = chunk_size - chunk_overlap;
    let mut spans = Vec::new();
    let mut start = 0;

    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        spans.push(start..end);
        if end == char_len {
            break;
        }
        start += step;
    }

    Ok(spans)
}

/// Split `text` into overlapping windows of at most `chunk_size` characters.
///
/// # Example
///
/// ```rust
/// use docchat_rag::chunking::chunk_text;
///
/// let chunks = chunk_text(&"a".repeat(1000), 400, 40).unwrap();
/// assert_eq!(chunks.len(), 3);
/// assert_eq!(chunks[2].len(), 280);
/// ```
///
/// # Errors
///
/// Returns [`RagError::InvalidArgument`] if `chunk_size == 0` or
/// `chunk_overlap >= chunk_size`, whatever the text.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    // Byte offset of every character boundary, including the end of the text.
    let boundaries: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let char_len = boundaries.len() - 1;

    let spans = chunk_spans(char_len, chunk_size, chunk_overlap)?;
    Ok(spans
        .into_iter()
        .map(|span| text[boundaries[span.start]..boundaries[span.end]].to_string())
        .collect())
}

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks stamped with `created_at`.
    ///
    /// Returns an empty `Vec` if the document has empty content.
    fn chunk(&self, document: &Document, created_at: DateTime<Utc>) -> Vec<Chunk>;
}

/// Splits documents into fixed-size character windows with overlap.
///
/// Chunk IDs are generated as `{document_name}-{chunk_index}`, so they are
/// stable for a given document and unique within a batch as long as document
/// names are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] for parameters that would never
    /// terminate or produce no text.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for FixedSizeChunker {
    fn default() -> Self {
        Self {
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
            chunk_overlap: crate::config::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document, created_at: DateTime<Utc>) -> Vec<Chunk> {
        // Parameters were validated in `new`.
        let windows =
            chunk_text(&document.content, self.chunk_size, self.chunk_overlap).unwrap_or_default();

        windows
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk {
                id: format!("{}-{index}", document.name),
                content,
                metadata: ChunkMetadata {
                    document_name: document.name.clone(),
                    doc_type: document.doc_type.clone(),
                    size: document.size,
                    created_at,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousand_chars_yield_three_windows() {
        let spans = chunk_spans(1000, 400, 40).unwrap();
        assert_eq!(spans, vec![0..400, 360..760, 720..1000]);

        let chunks = chunk_text(&"a".repeat(1000), 400, 40).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 280);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 400, 40).unwrap().is_empty());
    }

    #[test]
    fn text_within_one_window_yields_one_chunk() {
        assert_eq!(chunk_text("short", 400, 40).unwrap(), vec!["short".to_string()]);
        assert_eq!(chunk_text(&"b".repeat(400), 400, 40).unwrap().len(), 1);
        assert_eq!(chunk_text(&"b".repeat(401), 400, 40).unwrap().len(), 2);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        for (size, overlap) in [(0, 0), (10, 10), (10, 11)] {
            let err = chunk_text("anything", size, overlap).unwrap_err();
            assert!(matches!(err, RagError::InvalidArgument(_)), "{size}/{overlap}: {err}");
        }
        assert!(FixedSizeChunker::new(40, 40).is_err());
    }

    #[test]
    fn multibyte_text_is_split_on_character_boundaries() {
        let text = "é".repeat(10);
        let chunks = chunk_text(&text, 4, 1).unwrap();
        assert_eq!(chunks[0], "éééé");
        assert!(chunks.iter().all(|c| c.chars().all(|ch| ch == 'é')));
    }

    #[test]
    fn chunker_assigns_ids_and_metadata() {
        let document = Document::new("report.pdf", "x".repeat(500), 2048, "application/pdf");
        let created_at = Utc::now();
        let chunks = FixedSizeChunker::default().chunk(&document, created_at);

        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["report.pdf-0", "report.pdf-1"]);
        for chunk in &chunks {
            assert_eq!(chunk.metadata.document_name, "report.pdf");
            assert_eq!(chunk.metadata.doc_type, "application/pdf");
            assert_eq!(chunk.metadata.size, 2048);
            assert_eq!(chunk.metadata.created_at, created_at);
        }
    }
}
