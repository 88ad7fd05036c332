// Document intake: signature validation and text extraction for uploaded resumes.
// Everything here is synchronous and side-effect free; handlers run it on a blocking worker.

pub mod extractor;
pub mod handlers;
pub mod validator;

use serde::Serialize;
use thiserror::Error;

pub use extractor::{extract_text, ExtractedText};
pub use validator::validate_document;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Doc,
    Docx,
}

impl DocumentType {
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "application/pdf",
            DocumentType::Doc => "application/msword",
            DocumentType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Doc => "doc",
            DocumentType::Docx => "docx",
        }
    }
}

/// Terminal intake failures. The same bytes always fail the same way, so none are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("unsupported file extension '{0}' (expected pdf, doc or docx)")]
    UnsupportedExtension(String),

    #[error("unsupported MIME type '{0}'")]
    UnsupportedMimeType(String),

    #[error("file content does not match declared type {0:?}")]
    InvalidSignature(DocumentType),

    #[error("DOCX package is missing [Content_Types].xml")]
    MissingPackageManifest,

    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),
}

impl IntakeError {
    /// Stable machine-readable code surfaced in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::UnsupportedExtension(_) => "UNSUPPORTED_EXTENSION",
            IntakeError::UnsupportedMimeType(_) => "UNSUPPORTED_MIME_TYPE",
            IntakeError::InvalidSignature(_) => "INVALID_SIGNATURE",
            IntakeError::MissingPackageManifest => "MISSING_PACKAGE_MANIFEST",
            IntakeError::ExtractionFailed(_) => "EXTRACTION_FAILED",
        }
    }
}

/// Output of the full intake pipeline.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub doc_type: DocumentType,
    pub text: String,
    pub word_count: usize,
}

/// Validates the upload and extracts its text in one step.
pub fn validate_and_extract(
    bytes: &[u8],
    filename: &str,
    mime_type: &str,
) -> Result<ExtractedDocument, IntakeError> {
    let doc_type = validate_document(bytes, filename, mime_type)?;
    let ExtractedText { text, word_count } = extract_text(bytes, doc_type)?;
    Ok(ExtractedDocument {
        doc_type,
        text,
        word_count,
    })
}
