//! # docchat-app
//!
//! Session layer for chatting with uploaded PDFs on top of `docchat-rag`.
//!
//! A [`DocChatApp`] holds one session. Users upload files, process them into
//! the retrieval index, pick a document and a model, then ask questions. Each
//! answer is appended to that document's chat history.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docchat_app::{DocChatApp, UploadedFile, init_tracing, telemetry::DEFAULT_DIRECTIVE};
//! use docchat_rag::{RagConfig, ServiceSettings};
//!
//! init_tracing(DEFAULT_DIRECTIVE);
//! let app = DocChatApp::from_settings(RagConfig::default(), &ServiceSettings::from_env())?;
//!
//! app.upload(vec![UploadedFile::new("report.pdf", "application/pdf", bytes)]).await?;
//! app.process().await?;
//! app.select_document("report.pdf").await?;
//! app.select_model("gpt-4o-mini").await?;
//! let message = app.ask("What is the conclusion?").await?;
//! println!("{}", message.answer);
//! ```

pub mod app;
pub mod error;
pub mod guard;
pub mod state;
pub mod telemetry;
pub mod upload;

pub use app::{DocChatApp, DocChatAppBuilder, SUPPORTED_MODELS};
pub use error::{AppError, Result};
pub use guard::{InFlight, InFlightGuard};
pub use state::{Action, ChatMessage, SessionState, reduce};
pub use telemetry::init_tracing;
pub use upload::{PlaceholderExtractor, TextExtractor, UploadedFile, documents_from_uploads};
