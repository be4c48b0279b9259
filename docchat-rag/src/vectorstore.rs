//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{ChunkMetadata, EmbeddedChunk, ScoredChunk};
use crate::error::Result;

/// Metadata filter applied to vector queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    /// Restrict results to chunks whose `documentName` equals this value exactly.
    pub document_name: Option<String>,
}

impl DocumentFilter {
    /// Match every chunk.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match only chunks of the named document.
    pub fn document(name: impl Into<String>) -> Self {
        Self { document_name: Some(name.into()) }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.document_name.as_deref().is_none_or(|name| metadata.document_name == name)
    }
}

/// A storage backend for chunk embeddings with similarity search.
///
/// All operations are scoped to a namespace. Upserting into a namespace that
/// does not exist yet creates it.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::{DocumentFilter, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.delete_namespace("docs").await?;
/// store.upsert("docs", &embedded_chunks).await?;
/// let results = store.query("docs", &query_vector, &DocumentFilter::document("a.pdf"), 2).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Delete every vector in `namespace`. Deleting an absent namespace is not an error.
    async fn delete_namespace(&self, namespace: &str) -> Result<()>;

    /// Insert or replace chunks by id.
    async fn upsert(&self, namespace: &str, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Return the `top_k` chunks matching `filter` most similar to `embedding`,
    /// ordered by descending score.
    async fn query(
        &self,
        namespace: &str,
        embedding: &[f32],
        filter: &DocumentFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Name used in logs and errors.
    fn name(&self) -> &str;
}
