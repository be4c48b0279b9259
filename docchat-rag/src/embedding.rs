//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A text to embed, tagged with the id its vector must come back under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingInput<'a> {
    pub id: &'a str,
    pub text: &'a str,
}

/// A vector returned by an [`EmbeddingProvider`], paired with the id of the
/// input it was computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub id: String,
    pub vector: Vec<f32>,
}

/// A provider that generates vector embeddings from text input.
///
/// Batch results are keyed by input id rather than by position, so callers
/// never depend on the service preserving input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of inputs in a single call.
    ///
    /// Every input id appears exactly once in the output.
    async fn embed_batch(&self, inputs: &[EmbeddingInput<'_>]) -> Result<Vec<Embedding>>;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.embed_batch(&[EmbeddingInput { id: "query", text }]).await?;
        results.pop().map(|e| e.vector).ok_or_else(|| {
            RagError::upstream(self.name(), "embedding service returned no vectors")
        })
    }

    /// Name used in logs and errors.
    fn name(&self) -> &str;
}
