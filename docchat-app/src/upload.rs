//! Uploaded files and the text-extraction seam.

use std::collections::HashSet;

use async_trait::async_trait;
use docchat_rag::{Document, PDF_MIME_TYPE};
use tracing::{info, warn};

use crate::error::Result;

/// A file as received from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), bytes }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME_TYPE
    }
}

/// Turns an uploaded file into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, file: &UploadedFile) -> Result<String>;
}

/// Stand-in extractor that returns fixed sample text naming the file.
///
/// PDF parsing is not implemented; plug a real [`TextExtractor`] in its place.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderExtractor;

#[async_trait]
impl TextExtractor for PlaceholderExtractor {
    async fn extract(&self, file: &UploadedFile) -> Result<String> {
        Ok(format!(
            "Extracted text from {name}. This is a simulation of PDF text extraction. \
             In a real implementation, a PDF parsing library would extract the actual text content.\n\n\
             Sample content: Lorem ipsum dolor sit amet, consectetur adipiscing elit. Sed do eiusmod \
             tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud \
             exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.\n\n\
             This text would normally come from the actual PDF content and would be much longer and \
             more detailed based on the document's contents.",
            name = file.name
        ))
    }
}

/// Build documents from the PDF uploads in `files`.
///
/// Non-PDF files are skipped, as are later files reusing an earlier name.
/// A file whose extraction fails is logged and skipped; the rest still load.
pub async fn documents_from_uploads(
    files: &[UploadedFile],
    extractor: &dyn TextExtractor,
) -> Vec<Document> {
    let mut seen = HashSet::new();
    let mut documents = Vec::new();

    for file in files {
        if !file.is_pdf() {
            info!(file = %file.name, mime_type = %file.mime_type, "skipping non-PDF upload");
            continue;
        }
        if !seen.insert(file.name.as_str()) {
            warn!(file = %file.name, "skipping upload with duplicate name");
            continue;
        }
        match extractor.extract(file).await {
            Ok(content) => documents.push(Document::new(
                file.name.clone(),
                content,
                file.bytes.len() as u64,
                file.mime_type.clone(),
            )),
            Err(e) => warn!(file = %file.name, error = %e, "text extraction failed"),
        }
    }

    documents
}
