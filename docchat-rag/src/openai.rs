//! OpenAI embedding and chat-completion clients.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::OpenAISettings;
use crate::embedding::{Embedding, EmbeddingInput, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, TextGenerator};

/// The default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

const PROVIDER: &str = "OpenAI";

fn require_key(api_key: String) -> Result<String> {
    if api_key.trim().is_empty() {
        return Err(RagError::auth(PROVIDER, "API key must not be empty"));
    }
    Ok(api_key)
}

fn base_url(settings: &OpenAISettings) -> String {
    settings.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string())
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// POST `body` to `url` with bearer auth and decode a JSON response.
///
/// 401 and 403 map to [`RagError::Auth`]; everything else that goes wrong is
/// [`RagError::Upstream`].
async fn post_json<B, R>(client: &reqwest::Client, url: &str, api_key: &str, body: &B) -> Result<R>
where
    B: Serialize + ?Sized,
    R: for<'de> Deserialize<'de>,
{
    let response = client.post(url).bearer_auth(api_key).json(body).send().await.map_err(|e| {
        error!(provider = PROVIDER, error = %e, "request failed");
        RagError::upstream(PROVIDER, format!("request failed: {e}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail =
            serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);

        error!(provider = PROVIDER, %status, "API error");
        let message = format!("API returned {status}: {detail}");
        return Err(if status.as_u16() == 401 || status.as_u16() == 403 {
            RagError::auth(PROVIDER, message)
        } else {
            RagError::upstream(PROVIDER, message)
        });
    }

    response.json::<R>().await.map_err(|e| {
        error!(provider = PROVIDER, error = %e, "failed to parse response");
        RagError::upstream(PROVIDER, format!("failed to parse response: {e}"))
    })
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// The response's `index` field is used to pair each vector with the id of
/// the input it belongs to.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let vector = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: require_key(api_key.into())?,
            base_url: OPENAI_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        })
    }

    /// Create a provider from loaded [`OpenAISettings`].
    pub fn from_settings(settings: &OpenAISettings) -> Result<Self> {
        Ok(Self::new(settings.api_key.clone())?.with_base_url(base_url(settings)))
    }

    /// Set the model name (e.g. `text-embedding-3-small`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the provider at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[EmbeddingInput<'_>]) -> Result<Vec<Embedding>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = inputs.len(), model = %self.model, "embedding batch");

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs.iter().map(|i| i.text).collect(),
        };
        let url = format!("{}/embeddings", self.base_url);
        let response: EmbeddingResponse =
            post_json(&self.client, &url, &self.api_key, &request).await?;

        if response.data.len() != inputs.len() {
            return Err(RagError::upstream(
                PROVIDER,
                format!("expected {} embeddings, got {}", inputs.len(), response.data.len()),
            ));
        }

        let mut seen = vec![false; inputs.len()];
        let mut embeddings = Vec::with_capacity(inputs.len());
        for item in response.data {
            let input = inputs.get(item.index).ok_or_else(|| {
                RagError::upstream(PROVIDER, format!("embedding index {} out of range", item.index))
            })?;
            if std::mem::replace(&mut seen[item.index], true) {
                return Err(RagError::upstream(
                    PROVIDER,
                    format!("duplicate embedding index {}", item.index),
                ));
            }
            embeddings.push(Embedding { id: input.id.to_string(), vector: item.embedding });
        }

        Ok(embeddings)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// A [`TextGenerator`] backed by the OpenAI chat-completions API.
pub struct OpenAIChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIChatClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: require_key(api_key.into())?,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Create a client from loaded [`OpenAISettings`].
    pub fn from_settings(settings: &OpenAISettings) -> Result<Self> {
        Ok(Self::new(settings.api_key.clone())?.with_base_url(base_url(settings)))
    }

    /// Point the client at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAIChatClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        debug!(provider = PROVIDER, model = request.model, "chat completion");

        let body = ChatRequest {
            model: request.model,
            messages: [
                ChatMessage { role: "system", content: request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let url = format!("{}/chat/completions", self.base_url);
        let response: ChatResponse = post_json(&self.client, &url, &self.api_key, &body).await?;

        Ok(response.choices.into_iter().next().and_then(|c| c.message.content).unwrap_or_default())
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
