//! # docchat-rag
//!
//! Retrieval core for document question answering: deterministic text
//! chunking, keyword and vector context selection, and answer composition
//! over a language-model API.
//!
//! ## Features
//!
//! - **Chunking**: fixed-size, overlapping character windows ([`chunking`])
//! - **Keyword fallback**: sentence-level context selection without embeddings ([`context`])
//! - **Vector path**: batched embeddings paired by id, namespace-scoped
//!   upsert/query with document filters ([`Retriever`])
//! - **Bounded calls**: every remote call runs under a deadline and a
//!   cancellation token ([`CallBudget`])
//!
//! Cargo features `openai` and `pinecone` (both default) enable the HTTP
//! clients in [`openai`] and [`pinecone`].
//!
//! ## Quick Start
//!
//! ```rust
//! use docchat_rag::{Document, chunking::chunk_text, context::select_context};
//!
//! let doc = Document::new("notes.pdf", "Rust is fast. Rust is safe.", 27, "application/pdf");
//! assert_eq!(chunk_text(&doc.content, 400, 40).unwrap().len(), 1);
//! assert_eq!(select_context("safe", &doc), "Rust is safe.");
//! ```

pub mod chunking;
pub mod config;
pub mod context;
pub mod deadline;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod retrieval;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use chunking::{Chunker, FixedSizeChunker, chunk_text};
pub use config::{OpenAISettings, PineconeSettings, RagConfig, RagConfigBuilder, ServiceSettings};
pub use context::select_context;
pub use deadline::CallBudget;
pub use document::{Chunk, ChunkMetadata, Document, EmbeddedChunk, PDF_MIME_TYPE, ScoredChunk};
pub use embedding::{Embedding, EmbeddingInput, EmbeddingProvider};
pub use error::{RagError, Result};
pub use generation::{GenerationRequest, TextGenerator, compose_answer};
pub use inmemory::InMemoryVectorStore;
pub use retrieval::{IndexReport, Retriever, RetrieverBuilder};
pub use vectorstore::{DocumentFilter, VectorStore};

#[cfg(feature = "openai")]
pub use openai::{OpenAIChatClient, OpenAIEmbeddingProvider};

#[cfg(feature = "pinecone")]
pub use pinecone::PineconeVectorStore;
