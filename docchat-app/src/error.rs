//! Error types for the `docchat-app` crate.

use docchat_rag::RagError;
use thiserror::Error;

/// Errors returned by user actions on a [`DocChatApp`](crate::DocChatApp).
#[derive(Debug, Error)]
pub enum AppError {
    /// The named document is not in the active document set.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Another user action is still running.
    #[error("Busy: '{running}' is still in progress")]
    Busy {
        /// The action currently holding the in-flight slot.
        running: &'static str,
    },

    /// A precondition for the action is not met yet (nothing uploaded,
    /// nothing selected, documents not processed).
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The request itself is malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Text could not be extracted from an upload.
    #[error("Extraction failed for '{name}': {message}")]
    Extraction {
        /// The uploaded file name.
        name: String,
        /// A description of the failure.
        message: String,
    },

    /// An error propagated from `docchat-rag`.
    #[error(transparent)]
    Rag(#[from] RagError),
}

/// A convenience result type for user actions.
pub type Result<T> = std::result::Result<T, AppError>;
