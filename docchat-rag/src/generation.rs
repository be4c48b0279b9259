//! Answer composition over a text-generation collaborator.

use async_trait::async_trait;
use tracing::{error, info};

use crate::deadline::CallBudget;
use crate::error::Result;

/// System instruction sent with every question.
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that answers questions using \
only the provided document context. If the answer cannot be found in the context, say so.";

/// Sampling temperature used for answers.
pub const TEMPERATURE: f32 = 0.5;

/// Completion token budget for answers.
pub const MAX_TOKENS: u32 = 500;

/// Answer used when the service returns an empty completion.
pub const NO_RESPONSE: &str = "No response generated";

/// A single chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl<'a> GenerationRequest<'a> {
    /// Build the fixed-instruction request for answering `query` from `context`.
    pub fn answer(query: &str, context: &str, model: &'a str) -> Self {
        Self {
            model,
            system: SYSTEM_INSTRUCTION,
            user: format!(
                "Based on the following document context, please answer the user's question. \
                 If the answer cannot be found in the context, please say so.\n\n\
                 Context:\n{context}\n\nQuestion: {query}\n\nAnswer:"
            ),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }
}

/// A language-model service that turns a system + user message pair into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Return the completion text, or an empty string if the service produced none.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;

    /// Name used in logs and errors.
    fn name(&self) -> &str;
}

/// Ask `generator` to answer `query` from `context` with `model`.
///
/// Never fails: errors, including timeouts and cancellation, come back as an
/// answer of the form `"Error: <message>"`.
pub async fn compose_answer(
    generator: &dyn TextGenerator,
    budget: &CallBudget,
    query: &str,
    context: &str,
    model: &str,
) -> String {
    let request = GenerationRequest::answer(query, context, model);
    match budget.run(generator.name(), generator.generate(&request)).await {
        Ok(answer) if answer.trim().is_empty() => NO_RESPONSE.to_string(),
        Ok(answer) => {
            info!(model, answer_len = answer.len(), "answer generated");
            answer
        }
        Err(e) => {
            error!(model, error = %e, "answer generation failed");
            format!("Error: {e}")
        }
    }
}
