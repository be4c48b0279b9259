//! Retrieval orchestrator.
//!
//! The [`Retriever`] coordinates indexing (chunk → embed → store) and context
//! selection (embed → search, or keyword fallback) by composing a [`Chunker`]
//! with an optional vector path made of an [`EmbeddingProvider`] and a
//! [`VectorStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_rag::{Retriever, RagConfig, InMemoryVectorStore, CallBudget};
//!
//! let retriever = Retriever::builder()
//!     .config(RagConfig::default())
//!     .vector_path(Arc::new(my_embedder), Arc::new(InMemoryVectorStore::new()), "default")
//!     .build()?;
//!
//! let budget = CallBudget::with_timeout(retriever.config().request_timeout());
//! retriever.index_documents(&documents, &budget).await?;
//! let context = retriever.context_for("what is this?", &documents[0], &budget).await;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::context::select_context;
use crate::deadline::CallBudget;
use crate::document::{Chunk, Document, EmbeddedChunk};
use crate::embedding::{EmbeddingInput, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::vectorstore::{DocumentFilter, VectorStore};

/// Separator placed between retrieved chunks in an assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Outcome of [`Retriever::index_documents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    /// Whether the chunks were written to a vector store. `false` when no
    /// vector path is configured.
    pub indexed: bool,
}

/// Embedding provider, store and namespace used by the vector path.
#[derive(Clone)]
struct VectorPath {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    namespace: String,
}

/// The retrieval orchestrator. Construct one via [`Retriever::builder()`].
pub struct Retriever {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    vector: Option<VectorPath>,
}

impl Retriever {
    /// Create a new [`RetrieverBuilder`].
    pub fn builder() -> RetrieverBuilder {
        RetrieverBuilder::default()
    }

    /// Return a reference to the retrieval configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Whether a vector store is configured.
    pub fn has_vector_path(&self) -> bool {
        self.vector.is_some()
    }

    /// Chunk every document with the configured chunker.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let created_at = Utc::now();
        documents.iter().flat_map(|d| self.chunker.chunk(d, created_at)).collect()
    }

    /// Replace the vector index with the chunks of `documents`.
    ///
    /// The namespace is cleared first, then every chunk of every document is
    /// embedded in one batched call and upserted. Vectors are paired with
    /// chunks by id. Without a vector path the documents are only chunked.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidArgument`] if two documents share a name.
    /// - [`RagError::Auth`] / [`RagError::Upstream`] from the embedding
    ///   service or vector store, including timeouts and cancellation.
    pub async fn index_documents(
        &self,
        documents: &[Document],
        budget: &CallBudget,
    ) -> Result<IndexReport> {
        let mut names = HashSet::new();
        if let Some(dup) = documents.iter().find(|d| !names.insert(d.name.as_str())) {
            return Err(RagError::InvalidArgument(format!(
                "document name '{}' is used more than once",
                dup.name
            )));
        }

        let chunks = self.chunk_documents(documents);
        let mut report =
            IndexReport { documents: documents.len(), chunks: chunks.len(), indexed: false };

        let Some(vector) = &self.vector else {
            info!(documents = report.documents, chunks = report.chunks, "chunked documents");
            return Ok(report);
        };

        // 1. Full replace: drop whatever the previous batch indexed
        budget
            .run(vector.store.name(), vector.store.delete_namespace(&vector.namespace))
            .await
            .map_err(|e| {
                error!(namespace = %vector.namespace, error = %e, "failed to clear namespace");
                e
            })?;

        if chunks.is_empty() {
            report.indexed = true;
            return Ok(report);
        }

        // 2. One batched embedding call for every chunk of every document
        let inputs: Vec<EmbeddingInput<'_>> =
            chunks.iter().map(|c| EmbeddingInput { id: &c.id, text: &c.content }).collect();
        info!(chunk_count = inputs.len(), "generating embeddings");
        let embeddings = budget
            .run(vector.embedder.name(), vector.embedder.embed_batch(&inputs))
            .await
            .map_err(|e| {
                error!(error = %e, "embedding failed during indexing");
                e
            })?;

        // 3. Pair vectors with chunks by id
        let mut by_id: HashMap<String, Vec<f32>> =
            embeddings.into_iter().map(|e| (e.id, e.vector)).collect();
        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = by_id.remove(&chunk.id).ok_or_else(|| {
                RagError::upstream(
                    vector.embedder.name(),
                    format!("no embedding returned for chunk '{}'", chunk.id),
                )
            })?;
            embedded.push(EmbeddedChunk { chunk, embedding });
        }
        if let Some(extra) = by_id.keys().next() {
            return Err(RagError::upstream(
                vector.embedder.name(),
                format!("embedding returned for unknown id '{extra}'"),
            ));
        }

        // 4. Upsert into the vector store
        budget
            .run(vector.store.name(), vector.store.upsert(&vector.namespace, &embedded))
            .await
            .map_err(|e| {
                error!(namespace = %vector.namespace, error = %e, "upsert failed during indexing");
                e
            })?;

        report.indexed = true;
        info!(
            documents = report.documents,
            chunks = report.chunks,
            namespace = %vector.namespace,
            "indexed documents"
        );
        Ok(report)
    }

    /// Return the contents of the `top_k` chunks of `document_name` most
    /// similar to `query`, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if no vector path is configured, or the
    /// error of the failing embedding/store call.
    pub async fn retrieve(
        &self,
        query: &str,
        document_name: &str,
        top_k: usize,
        budget: &CallBudget,
    ) -> Result<Vec<String>> {
        let vector = self
            .vector
            .as_ref()
            .ok_or_else(|| RagError::Config("no vector store configured".to_string()))?;

        // 1. Embed the query
        let query_embedding =
            budget.run(vector.embedder.name(), vector.embedder.embed(query)).await?;

        // 2. Search the store, restricted to the selected document
        let filter = DocumentFilter::document(document_name);
        let results = budget
            .run(
                vector.store.name(),
                vector.store.query(&vector.namespace, &query_embedding, &filter, top_k),
            )
            .await?;

        info!(document = document_name, result_count = results.len(), "retrieved chunks");
        Ok(results.into_iter().map(|r| r.chunk.content).collect())
    }

    /// Assemble the context for answering `query` about `document`.
    ///
    /// Uses vector retrieval when configured. If the vector path is absent it
    /// is never touched; if it fails or finds nothing, the keyword fallback
    /// ([`select_context`]) is used and a warning is logged.
    pub async fn context_for(&self, query: &str, document: &Document, budget: &CallBudget) -> String {
        if self.vector.is_none() {
            return select_context(query, document);
        }

        match self.retrieve(query, &document.name, self.config.top_k, budget).await {
            Ok(chunks) if !chunks.is_empty() => chunks.join(CONTEXT_SEPARATOR),
            Ok(_) => {
                warn!(document = %document.name, "vector search found nothing, using keyword fallback");
                select_context(query, document)
            }
            Err(e) => {
                warn!(document = %document.name, error = %e, "vector search failed, using keyword fallback");
                select_context(query, document)
            }
        }
    }
}

/// Builder for constructing a [`Retriever`].
///
/// Only `config` is required. The chunker defaults to a
/// [`FixedSizeChunker`] built from the config; the vector path is optional.
#[derive(Default)]
pub struct RetrieverBuilder {
    config: Option<RagConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    vector: Option<VectorPath>,
}

impl RetrieverBuilder {
    /// Set the retrieval configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Enable the vector path.
    pub fn vector_path(
        mut self,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        namespace: impl Into<String>,
    ) -> Self {
        self.vector = Some(VectorPath { embedder, store, namespace: namespace.into() });
        self
    }

    /// Build the [`Retriever`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the config is missing, and
    /// [`RagError::InvalidArgument`] if the default chunker cannot be built
    /// from it.
    pub fn build(self) -> Result<Retriever> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?),
        };
        Ok(Retriever { config, chunker, vector: self.vector })
    }
}

#[cfg(all(feature = "openai", feature = "pinecone"))]
impl Retriever {
    /// Build a retriever from service settings.
    ///
    /// The vector path (OpenAI embeddings + Pinecone) is enabled only when
    /// both OpenAI and Pinecone credentials are present.
    pub fn from_settings(
        config: RagConfig,
        settings: &crate::config::ServiceSettings,
    ) -> Result<Self> {
        let mut builder = Self::builder().config(config);
        if let (Some(openai), Some(pinecone)) = (&settings.openai, &settings.pinecone) {
            let embedder = crate::openai::OpenAIEmbeddingProvider::from_settings(openai)?;
            let store = crate::pinecone::PineconeVectorStore::new(pinecone)?;
            builder = builder.vector_path(Arc::new(embedder), Arc::new(store), &pinecone.namespace);
        }
        builder.build()
    }
}
