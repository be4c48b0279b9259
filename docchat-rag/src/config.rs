//! Configuration for chunking, retrieval and the remote services behind them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default maximum chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 400;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 40;

/// Default number of chunks returned by vector retrieval.
pub const DEFAULT_TOP_K: usize = 2;

/// Default deadline applied to every remote call.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Namespace used when `PINECONE_NAMESPACE` is unset.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Tuning parameters for chunking and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks to return from vector search.
    pub top_k: usize,
    /// Deadline for each remote call, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The per-call deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the deadline applied to every remote call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidArgument`] if `chunk_size == 0` or
    ///   `chunk_overlap >= chunk_size`, as [`chunk_text`](crate::chunking::chunk_text)
    ///   would report.
    /// - [`RagError::Config`] if `top_k == 0` or the request timeout is zero.
    pub fn build(self) -> Result<RagConfig> {
        crate::chunking::validate(self.config.chunk_size, self.config.chunk_overlap)?;
        if self.config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.config.request_timeout_ms == 0 {
            return Err(RagError::Config("request timeout must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}

/// Credentials and endpoints for the OpenAI-compatible embedding and chat APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAISettings {
    pub api_key: String,
    /// Overrides `https://api.openai.com/v1`.
    pub base_url: Option<String>,
}

/// Credentials and addressing for a Pinecone index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PineconeSettings {
    pub api_key: String,
    pub index_name: String,
    /// Data-plane host. Resolved from the control plane when absent.
    pub index_host: Option<String>,
    pub namespace: String,
}

/// Service settings read once at startup.
///
/// The vector path is enabled only when both `PINECONE_API_KEY` and
/// `PINECONE_INDEX_NAME` are present; otherwise [`pinecone`](Self::pinecone)
/// is `None` and retrieval uses the keyword fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSettings {
    pub openai: Option<OpenAISettings>,
    pub pinecone: Option<PineconeSettings>,
}

impl ServiceSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let openai = get("OPENAI_API_KEY")
            .map(|api_key| OpenAISettings { api_key, base_url: get("OPENAI_BASE_URL") });

        let pinecone = match (get("PINECONE_API_KEY"), get("PINECONE_INDEX_NAME")) {
            (Some(api_key), Some(index_name)) => Some(PineconeSettings {
                api_key,
                index_name,
                index_host: get("PINECONE_INDEX_HOST"),
                namespace: get("PINECONE_NAMESPACE")
                    .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            }),
            _ => None,
        };

        Self { openai, pinecone }
    }

    /// Whether the vector-store path can be used at all.
    pub fn vector_path_enabled(&self) -> bool {
        self.openai.is_some() && self.pinecone.is_some()
    }
}
