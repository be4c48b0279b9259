//! Error types for the `docchat-rag` crate.

use thiserror::Error;

/// Errors that can occur while chunking, embedding, indexing, retrieving or
/// generating answers.
#[derive(Debug, Error)]
pub enum RagError {
    /// A caller supplied an argument that can never succeed, such as a chunk
    /// overlap that is not smaller than the chunk size.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A credential was missing or rejected by a remote service.
    #[error("Authentication error ({service}): {message}")]
    Auth {
        /// The service that rejected the request.
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// A remote service failed, timed out, was cancelled or returned an
    /// unusable response.
    #[error("Upstream error ({service}): {message}")]
    Upstream {
        /// The service that produced the error.
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    pub(crate) fn upstream(service: &str, message: impl Into<String>) -> Self {
        Self::Upstream { service: service.to_string(), message: message.into() }
    }

    pub(crate) fn auth(service: &str, message: impl Into<String>) -> Self {
        Self::Auth { service: service.to_string(), message: message.into() }
    }

    /// Whether this error came from a remote service rather than from the caller.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
