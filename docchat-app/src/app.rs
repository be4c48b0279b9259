//! The document chat session.
//!
//! [`DocChatApp`] owns one session: the uploaded documents, the selections,
//! per-document chat history and the retrieval components. Every user action
//! that talks to a remote service runs behind the [`InFlightGuard`], and every
//! state change is applied through [`reduce`](crate::state::reduce).
//!
//! The state lock is never held across an `.await`, so a dropped `process` or
//! `ask` future can still settle the session from its destructor.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use docchat_rag::{
    CallBudget, IndexReport, OpenAIChatClient, RagConfig, RagError, Retriever, ServiceSettings,
    TextGenerator, compose_answer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::guard::InFlightGuard;
use crate::state::{Action, ChatMessage, SessionState, reduce};
use crate::upload::{PlaceholderExtractor, TextExtractor, UploadedFile, documents_from_uploads};

/// Chat models a session may select.
pub const SUPPORTED_MODELS: [&str; 2] = ["gpt-3.5-turbo-0125", "gpt-4o-mini"];

const GENERATOR_SERVICE: &str = "OpenAI";

/// A single document chat session. Construct one via [`DocChatApp::builder()`]
/// or [`DocChatApp::from_settings`].
pub struct DocChatApp {
    state: RwLock<SessionState>,
    guard: InFlightGuard,
    retriever: Retriever,
    generator: Option<Arc<dyn TextGenerator>>,
    extractor: Arc<dyn TextExtractor>,
}

impl DocChatApp {
    pub fn builder() -> DocChatAppBuilder {
        DocChatAppBuilder::default()
    }

    /// Build a session wired to OpenAI and, when configured, Pinecone.
    ///
    /// Without an OpenAI key the session still accepts uploads, but
    /// [`process`](Self::process) and [`ask`](Self::ask) fail with an
    /// authentication error.
    pub fn from_settings(config: RagConfig, settings: &ServiceSettings) -> Result<Self> {
        let retriever = Retriever::from_settings(config, settings)?;
        let mut builder = Self::builder().retriever(retriever);
        if let Some(openai) = &settings.openai {
            builder = builder.generator(Arc::new(OpenAIChatClient::from_settings(openai)?));
        }
        if !settings.vector_path_enabled() {
            info!("vector store not configured, answers use keyword context");
        }
        builder.build()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// A copy of the current session state.
    pub async fn snapshot(&self) -> SessionState {
        self.read().clone()
    }

    /// Chat history for the named document, oldest first.
    pub async fn history(&self, document: &str) -> Vec<ChatMessage> {
        self.read().history(document).to_vec()
    }

    /// Cancel the remote calls of the running action. Returns `false` if idle.
    pub fn cancel_running(&self) -> bool {
        self.guard.cancel_running()
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, action: Action) {
        apply(&mut self.write(), action);
    }

    /// Replace the document set with the PDFs among `files`.
    ///
    /// Returns the names of the documents that were loaded. The bot must be
    /// processed again before questions can be asked.
    pub async fn upload(&self, files: Vec<UploadedFile>) -> Result<Vec<String>> {
        let _in_flight = self.guard.begin("upload")?;

        let documents = documents_from_uploads(&files, self.extractor.as_ref()).await;
        let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();
        info!(received = files.len(), loaded = names.len(), "documents uploaded");
        self.dispatch(Action::DocumentsUploaded(documents));
        Ok(names)
    }

    /// Index the current documents and mark the bot ready.
    ///
    /// # Errors
    ///
    /// - [`RagError::Auth`] if no OpenAI key is configured.
    /// - [`AppError::NotReady`] if no documents are uploaded.
    /// - Any indexing error; the bot stays not ready.
    pub async fn process(&self) -> Result<IndexReport> {
        let in_flight = self.guard.begin("process")?;
        self.require_generator()?;

        let documents = self.read().documents.clone();
        if documents.is_empty() {
            return Err(AppError::NotReady("upload at least one PDF first".to_string()));
        }

        let settle = Settle::start(
            self,
            "process",
            Action::IndexingStarted,
            Action::IndexingFinished { success: false },
        );
        let budget = CallBudget::new(
            self.retriever.config().request_timeout(),
            in_flight.cancellation_token(),
        );
        let result = self.retriever.index_documents(&documents, &budget).await;
        settle.finish(Action::IndexingFinished { success: result.is_ok() });

        match result {
            Ok(report) => {
                info!(documents = report.documents, chunks = report.chunks, "bot ready");
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "processing failed");
                Err(e.into())
            }
        }
    }

    /// Answer `question` about the selected document and record it in the
    /// document's history.
    ///
    /// Generation failures do not fail the call; they are recorded as an
    /// answer starting with `"Error: "`.
    pub async fn ask(&self, question: &str) -> Result<ChatMessage> {
        let in_flight = self.guard.begin("ask")?;

        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidArgument("question must not be empty".to_string()));
        }

        let (document, model) = {
            let state = self.read();
            let name = state
                .selected_document
                .clone()
                .ok_or_else(|| AppError::NotReady("select a document first".to_string()))?;
            let document =
                state.document(&name).cloned().ok_or_else(|| AppError::NotFound(name.clone()))?;
            let model = state
                .selected_model
                .clone()
                .ok_or_else(|| AppError::NotReady("select a model first".to_string()))?;
            if !state.bot_ready {
                return Err(AppError::NotReady("process the documents first".to_string()));
            }
            (document, model)
        };
        let generator = self.require_generator()?;

        let settle = Settle::start(self, "ask", Action::QuestionStarted, Action::QuestionAborted);
        let budget = CallBudget::new(
            self.retriever.config().request_timeout(),
            in_flight.cancellation_token(),
        );
        let context = self.retriever.context_for(question, &document, &budget).await;
        let answer = compose_answer(generator.as_ref(), &budget, question, &context, &model).await;

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            question: question.to_string(),
            answer,
            timestamp: Utc::now(),
        };
        settle.finish(Action::AnswerRecorded {
            document: document.name.clone(),
            message: message.clone(),
        });
        info!(document = %document.name, model = %model, "question answered");
        Ok(message)
    }

    /// Select the document questions are asked about.
    pub async fn select_document(&self, name: &str) -> Result<()> {
        let mut state = self.write();
        if state.document(name).is_none() {
            return Err(AppError::NotFound(name.to_string()));
        }
        apply(&mut state, Action::DocumentSelected(Some(name.to_string())));
        Ok(())
    }

    /// Select the chat model. Must be one of [`SUPPORTED_MODELS`].
    pub async fn select_model(&self, model: &str) -> Result<()> {
        if !SUPPORTED_MODELS.contains(&model) {
            return Err(AppError::InvalidArgument(format!("unsupported model '{model}'")));
        }
        self.dispatch(Action::ModelSelected(Some(model.to_string())));
        Ok(())
    }

    /// Remove a document and its history. The bot must be processed again.
    pub async fn remove_document(&self, name: &str) -> Result<()> {
        let _in_flight = self.guard.begin("remove")?;
        let mut state = self.write();
        if state.document(name).is_none() {
            return Err(AppError::NotFound(name.to_string()));
        }
        apply(&mut state, Action::DocumentRemoved(name.to_string()));
        Ok(())
    }

    fn require_generator(&self) -> Result<Arc<dyn TextGenerator>> {
        self.generator.clone().ok_or_else(|| {
            AppError::Rag(RagError::Auth {
                service: GENERATOR_SERVICE.to_string(),
                message: "OpenAI API key is required".to_string(),
            })
        })
    }
}

fn apply(state: &mut SessionState, action: Action) {
    *state = reduce(std::mem::take(state), action);
}

/// Marks the session busy for one remote operation and settles it exactly
/// once. If the operation's future is dropped before [`finish`](Self::finish),
/// the fallback action is applied on drop.
///
/// Declare it after the [`InFlight`](crate::guard::InFlight) claim so the
/// session is settled before the slot is released.
struct Settle<'a> {
    app: &'a DocChatApp,
    operation: &'static str,
    on_drop: Option<Action>,
}

impl<'a> Settle<'a> {
    fn start(
        app: &'a DocChatApp,
        operation: &'static str,
        started: Action,
        on_drop: Action,
    ) -> Self {
        app.dispatch(started);
        Self { app, operation, on_drop: Some(on_drop) }
    }

    fn finish(mut self, action: Action) {
        self.on_drop = None;
        self.app.dispatch(action);
    }
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        if let Some(action) = self.on_drop.take() {
            warn!(operation = self.operation, "operation dropped before completing");
            self.app.dispatch(action);
        }
    }
}

/// Builder for constructing a [`DocChatApp`].
///
/// The retriever defaults to keyword-only retrieval with [`RagConfig::default`],
/// the extractor to [`PlaceholderExtractor`]. Without a generator the session
/// cannot process or answer.
#[derive(Default)]
pub struct DocChatAppBuilder {
    retriever: Option<Retriever>,
    generator: Option<Arc<dyn TextGenerator>>,
    extractor: Option<Arc<dyn TextExtractor>>,
}

impl DocChatAppBuilder {
    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn build(self) -> Result<DocChatApp> {
        let retriever = match self.retriever {
            Some(retriever) => retriever,
            None => Retriever::builder().config(RagConfig::default()).build()?,
        };
        Ok(DocChatApp {
            state: RwLock::new(SessionState::default()),
            guard: InFlightGuard::new(),
            retriever,
            generator: self.generator,
            extractor: self.extractor.unwrap_or_else(|| Arc::new(PlaceholderExtractor)),
        })
    }
}
