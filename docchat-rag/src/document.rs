//! Data types for documents, chunks, and retrieval results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MIME type accepted for uploads.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A source document and its extracted text.
///
/// `name` is the document's key within a session; the rest is immutable once
/// the document is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Unique name of the document (the uploaded file name).
    pub name: String,
    /// The extracted text content.
    pub content: String,
    /// Size of the original upload in bytes.
    pub size: u64,
    /// MIME type of the original upload.
    #[serde(rename = "type")]
    pub doc_type: String,
}

impl Document {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        size: u64,
        doc_type: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), content: content.into(), size, doc_type: doc_type.into() }
    }
}

/// Metadata attached to every [`Chunk`] and stored alongside its vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Name of the parent [`Document`]. Retrieval filters on this field.
    pub document_name: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// A window of a [`Document`]'s text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// `<document-name>-<index>`.
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A [`Chunk`] with its embedding vector attached, ready to be upserted.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a similarity score (higher is more relevant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
