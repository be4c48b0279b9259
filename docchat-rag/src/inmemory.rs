//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] is backed by a `HashMap` behind a
//! `tokio::sync::RwLock`. It is used in tests and for local runs without
//! vector-store credentials.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{EmbeddedChunk, ScoredChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::{DocumentFilter, VectorStore};

/// An in-memory vector store ranking by cosine similarity.
///
/// Namespaces are stored as nested maps: namespace → chunk id → chunk.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, HashMap<String, EmbeddedChunk>>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vectors currently stored in `namespace`.
    pub async fn len(&self, namespace: &str) -> usize {
        self.namespaces.read().await.get(namespace).map_or(0, HashMap::len)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }

    async fn upsert(&self, namespace: &str, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let store = namespaces.entry(namespace.to_string()).or_default();

        // Dimensionality is fixed by the first vector written.
        let mut dimensions = store.values().next().map(|c| c.embedding.len());
        for chunk in chunks {
            let dim = *dimensions.get_or_insert(chunk.embedding.len());
            if chunk.embedding.len() != dim {
                return Err(RagError::upstream(
                    "InMemory",
                    format!(
                        "chunk '{}' has {} dimensions, namespace uses {dim}",
                        chunk.chunk.id,
                        chunk.embedding.len()
                    ),
                ));
            }
        }

        for chunk in chunks {
            store.insert(chunk.chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        embedding: &[f32],
        filter: &DocumentFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let namespaces = self.namespaces.read().await;
        let Some(store) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredChunk> = store
            .values()
            .filter(|c| filter.matches(&c.chunk.metadata))
            .map(|c| ScoredChunk {
                chunk: c.chunk.clone(),
                score: cosine_similarity(&c.embedding, embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    fn name(&self) -> &str {
        "InMemory"
    }
}
