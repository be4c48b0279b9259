//! Session state and its reducer.
//!
//! All session mutations go through [`reduce`], a pure function from the
//! current state and an [`Action`] to the next state. Actions are applied
//! only after the operation they describe has completed or been abandoned.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use docchat_rag::Document;
use serde::{Deserialize, Serialize};

/// One question and its answer in a document's chat history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything a session owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub documents: Vec<Document>,
    pub selected_document: Option<String>,
    pub selected_model: Option<String>,
    /// Chat history per document name.
    pub chat_history: HashMap<String, Vec<ChatMessage>>,
    pub is_processing: bool,
    /// Set once the current document set has been processed.
    pub bot_ready: bool,
}

impl SessionState {
    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }

    /// History for `name`, oldest first.
    pub fn history(&self, name: &str) -> &[ChatMessage] {
        self.chat_history.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A completed state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace the active document set. The bot must be processed again.
    DocumentsUploaded(Vec<Document>),
    /// Drop one document and its history.
    DocumentRemoved(String),
    DocumentSelected(Option<String>),
    ModelSelected(Option<String>),
    IndexingStarted,
    IndexingFinished { success: bool },
    QuestionStarted,
    /// A question ended without an answer, e.g. its task was dropped.
    QuestionAborted,
    AnswerRecorded { document: String, message: ChatMessage },
}

/// Apply `action` to `state`, returning the next state.
pub fn reduce(mut state: SessionState, action: Action) -> SessionState {
    match action {
        Action::DocumentsUploaded(documents) => {
            state.documents = documents;
            state.bot_ready = false;
            let SessionState { documents, chat_history, selected_document, .. } = &mut state;
            chat_history.retain(|name, _| documents.iter().any(|d| &d.name == name));
            if selected_document.as_ref().is_some_and(|s| !documents.iter().any(|d| &d.name == s)) {
                *selected_document = None;
            }
        }
        Action::DocumentRemoved(name) => {
            state.documents.retain(|d| d.name != name);
            state.chat_history.remove(&name);
            if state.selected_document.as_deref() == Some(name.as_str()) {
                state.selected_document = None;
            }
            // The index still holds the removed document until reprocessed.
            state.bot_ready = false;
        }
        Action::DocumentSelected(name) => state.selected_document = name,
        Action::ModelSelected(model) => state.selected_model = model,
        Action::IndexingStarted => {
            state.is_processing = true;
            state.bot_ready = false;
        }
        Action::IndexingFinished { success } => {
            state.is_processing = false;
            state.bot_ready = success;
        }
        Action::QuestionStarted => state.is_processing = true,
        Action::QuestionAborted => state.is_processing = false,
        Action::AnswerRecorded { document, message } => {
            state.is_processing = false;
            state.chat_history.entry(document).or_default().push(message);
        }
    }
    state
}
