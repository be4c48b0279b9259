//! Pinecone vector store backend over the REST data plane.
//!
//! This module is only available when the `pinecone` feature is enabled.
//!
//! Chunk content and metadata are stored as vector metadata, so a query
//! returns everything needed to rebuild a [`Chunk`] without a second lookup.
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_rag::pinecone::PineconeVectorStore;
//!
//! let store = PineconeVectorStore::new(&settings.pinecone.unwrap())?;
//! store.delete_namespace("default").await?;
//! store.upsert("default", &embedded).await?;
//! ```

use std::borrow::Cow;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::config::PineconeSettings;
use crate::document::{Chunk, ChunkMetadata, EmbeddedChunk, ScoredChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::{DocumentFilter, VectorStore};

/// Control-plane endpoint used to resolve an index's data-plane host.
pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

/// API version header sent with every request.
const API_VERSION: &str = "2024-07";

/// Vectors per upsert request.
const UPSERT_BATCH_SIZE: usize = 100;

const BACKEND: &str = "Pinecone";

// ── Pinecone API request/response types ────────────────────────────

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    namespace: &'a str,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: Cow<'a, str>,
    values: &'a [f32],
    metadata: StoredMetadata<'a>,
}

#[derive(Serialize)]
struct StoredMetadata<'a> {
    content: &'a str,
    #[serde(flatten)]
    chunk: &'a ChunkMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    metadata: Option<MatchMetadata>,
}

/// Pinecone returns every number as a float, so `size` is read back as `f64`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchMetadata {
    content: String,
    document_name: String,
    #[serde(rename = "type")]
    doc_type: String,
    size: f64,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

/// A [`VectorStore`] backed by a [Pinecone](https://www.pinecone.io/) index.
pub struct PineconeVectorStore {
    client: reqwest::Client,
    api_key: String,
    index_name: String,
    control_plane_url: String,
    host: OnceCell<String>,
}

impl PineconeVectorStore {
    /// Create a store for the index described by `settings`.
    ///
    /// If `index_host` is unset the host is resolved from the control plane
    /// on first use.
    pub fn new(settings: &PineconeSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(RagError::auth(BACKEND, "API key must not be empty"));
        }
        let host = match &settings.index_host {
            Some(host) => OnceCell::new_with(Some(normalize_host(host))),
            None => OnceCell::new(),
        };
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: settings.api_key.clone(),
            index_name: settings.index_name.clone(),
            control_plane_url: CONTROL_PLANE_URL.to_string(),
            host,
        })
    }

    /// Resolve index hosts against a different control plane.
    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn host(&self) -> Result<&str> {
        self.host
            .get_or_try_init(|| async {
                let url = format!("{}/indexes/{}", self.control_plane_url, self.index_name);
                let response = self
                    .client
                    .get(&url)
                    .header("Api-Key", &self.api_key)
                    .header("X-Pinecone-API-Version", API_VERSION)
                    .send()
                    .await
                    .map_err(|e| RagError::upstream(BACKEND, format!("describe index failed: {e}")))?;
                let described: DescribeIndexResponse = decode(response).await?;
                info!(index = %self.index_name, host = %described.host, "resolved index host");
                Ok::<_, RagError>(normalize_host(&described.host))
            })
            .await
            .map(String::as_str)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.host().await?);
        self.client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(backend = BACKEND, path, error = %e, "request failed");
                RagError::upstream(BACKEND, format!("request to {path} failed: {e}"))
            })
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(backend = BACKEND, %status, "API error");
    let message = format!("API returned {status}: {body}");
    Err(if status.as_u16() == 401 || status.as_u16() == 403 {
        RagError::auth(BACKEND, message)
    } else {
        RagError::upstream(BACKEND, message)
    })
}

async fn decode<R: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<R> {
    check(response)
        .await?
        .json::<R>()
        .await
        .map_err(|e| RagError::upstream(BACKEND, format!("failed to parse response: {e}")))
}

/// Pinecone record ids must be ASCII, but chunk ids embed the document name
/// verbatim. Ids are percent-encoded on write and decoded on read.
fn record_id(chunk_id: &str) -> Cow<'_, str> {
    urlencoding::encode(chunk_id)
}

fn chunk_id(record_id: String) -> String {
    let decoded = urlencoding::decode(&record_id).map(Cow::into_owned);
    decoded.unwrap_or(record_id)
}

fn filter_json(filter: &DocumentFilter) -> Option<Value> {
    filter.document_name.as_ref().map(|name| json!({ "documentName": { "$eq": name } }))
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        debug!(backend = BACKEND, namespace, "deleting namespace");
        let response =
            self.post("/vectors/delete", &json!({ "deleteAll": true, "namespace": namespace })).await?;
        // An unknown namespace is reported as 404 and is already empty.
        if response.status().as_u16() == 404 {
            return Ok(());
        }
        check(response).await.map(|_| ())
    }

    async fn upsert(&self, namespace: &str, chunks: &[EmbeddedChunk]) -> Result<()> {
        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|c| UpsertVector {
                        id: record_id(&c.chunk.id),
                        values: &c.embedding,
                        metadata: StoredMetadata {
                            content: &c.chunk.content,
                            chunk: &c.chunk.metadata,
                        },
                    })
                    .collect(),
                namespace,
            };
            let body = serde_json::to_value(&request).map_err(|e| {
                RagError::upstream(BACKEND, format!("failed to encode upsert: {e}"))
            })?;
            debug!(backend = BACKEND, namespace, batch_size = batch.len(), "upserting vectors");
            check(self.post("/vectors/upsert", &body).await?).await?;
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
        let mut body = json!({
            "namespace": namespace,
            "vector": embedding,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });
        if let Some(filter) = filter_json(filter) {
            body["filter"] = filter;
        }

        let response: QueryResponse = decode(self.post("/query", &body).await?).await?;
        let mut results = Vec::with_capacity(response.matches.len());
        for m in response.matches {
            let Some(meta) = m.metadata else {
                return Err(RagError::upstream(BACKEND, format!("match '{}' has no metadata", m.id)));
            };
            results.push(ScoredChunk {
                chunk: Chunk {
                    id: chunk_id(m.id),
                    content: meta.content,
                    metadata: ChunkMetadata {
                        document_name: meta.document_name,
                        doc_type: meta.doc_type,
                        size: meta.size as u64,
                        created_at: meta.created_at,
                    },
                },
                score: m.score,
            });
        }
        Ok(results)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
