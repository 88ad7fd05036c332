//! Magic-byte validation for uploaded documents.
//!
//! Checks run in a fixed order: extension, declared MIME type, then content signature
//! against the declared type. Nothing here opens or interprets document content.

use crate::intake::{DocumentType, IntakeError};

const PDF_MAGIC: &[u8] = b"%PDF-";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK";
const OOXML_MANIFEST: &[u8] = b"[Content_Types].xml";

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];

/// Validates `bytes` as a genuine PDF, DOC or DOCX and returns the declared type.
pub fn validate_document(
    bytes: &[u8],
    filename: &str,
    mime_type: &str,
) -> Result<DocumentType, IntakeError> {
    let extension = file_extension(filename);
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(IntakeError::UnsupportedExtension(extension));
    }

    let doc_type = document_type_for_mime(mime_type)
        .ok_or_else(|| IntakeError::UnsupportedMimeType(mime_type.to_string()))?;

    check_signature(bytes, doc_type)?;
    Ok(doc_type)
}

/// Lower-cased extension after the last dot, or an empty string when there is none.
fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

fn document_type_for_mime(mime_type: &str) -> Option<DocumentType> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    [DocumentType::Pdf, DocumentType::Doc, DocumentType::Docx]
        .into_iter()
        .find(|t| t.mime_type() == essence)
}

fn check_signature(bytes: &[u8], doc_type: DocumentType) -> Result<(), IntakeError> {
    match doc_type {
        DocumentType::Pdf if bytes.starts_with(PDF_MAGIC) => Ok(()),
        DocumentType::Doc if bytes.starts_with(OLE2_MAGIC) => Ok(()),
        DocumentType::Docx if bytes.starts_with(ZIP_MAGIC) => {
            if contains(bytes, OOXML_MANIFEST) {
                Ok(())
            } else {
                Err(IntakeError::MissingPackageManifest)
            }
        }
        _ => Err(IntakeError::InvalidSignature(doc_type)),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &str = "application/pdf";
    const DOC: &str = "application/msword";
    const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    fn docx_bytes() -> Vec<u8> {
        let mut bytes = b"PK\x03\x04\x14\x00\x06\x00".to_vec();
        bytes.extend_from_slice(b"....[Content_Types].xml....word/document.xml");
        bytes
    }

    #[test]
    fn test_valid_pdf() {
        let result = validate_document(b"%PDF-1.4\n%\xE2\xE3", "cv.pdf", PDF);
        assert_eq!(result, Ok(DocumentType::Pdf));
    }

    #[test]
    fn test_pdf_any_mutation_of_magic_fails() {
        let original = b"%PDF-1.7 rest of file".to_vec();
        for i in 0..5 {
            let mut mutated = original.clone();
            mutated[i] = mutated[i].wrapping_add(1);
            assert_eq!(
                validate_document(&mutated, "cv.pdf", PDF),
                Err(IntakeError::InvalidSignature(DocumentType::Pdf)),
                "mutation at byte {i} should fail"
            );
        }
    }

    #[test]
    fn test_truncated_pdf_fails() {
        assert_eq!(
            validate_document(b"%PD", "cv.pdf", PDF),
            Err(IntakeError::InvalidSignature(DocumentType::Pdf))
        );
    }

    #[test]
    fn test_valid_doc() {
        let mut bytes = OLE2_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        assert_eq!(validate_document(&bytes, "cv.doc", DOC), Ok(DocumentType::Doc));
    }

    #[test]
    fn test_doc_with_wrong_header_fails() {
        let bytes = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0x00];
        assert_eq!(
            validate_document(&bytes, "cv.doc", DOC),
            Err(IntakeError::InvalidSignature(DocumentType::Doc))
        );
    }

    #[test]
    fn test_valid_docx() {
        assert_eq!(
            validate_document(&docx_bytes(), "cv.docx", DOCX),
            Ok(DocumentType::Docx)
        );
    }

    #[test]
    fn test_docx_without_manifest() {
        let bytes = b"PK\x03\x04 word/document.xml only".to_vec();
        assert_eq!(
            validate_document(&bytes, "cv.docx", DOCX),
            Err(IntakeError::MissingPackageManifest)
        );
    }

    #[test]
    fn test_docx_without_zip_marker() {
        let bytes = b"XX[Content_Types].xml".to_vec();
        assert_eq!(
            validate_document(&bytes, "cv.docx", DOCX),
            Err(IntakeError::InvalidSignature(DocumentType::Docx))
        );
    }

    #[test]
    fn test_pdf_renamed_as_docx_fails_signature() {
        assert_eq!(
            validate_document(b"%PDF-1.4", "cv.docx", DOCX),
            Err(IntakeError::InvalidSignature(DocumentType::Docx))
        );
    }

    #[test]
    fn test_unsupported_extension() {
        assert_eq!(
            validate_document(b"%PDF-1.4", "cv.exe", PDF),
            Err(IntakeError::UnsupportedExtension("exe".to_string()))
        );
        assert_eq!(
            validate_document(b"%PDF-1.4", "no_extension", PDF),
            Err(IntakeError::UnsupportedExtension(String::new()))
        );
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(
            validate_document(b"%PDF-1.4", "CV.PDF", PDF),
            Ok(DocumentType::Pdf)
        );
    }

    #[test]
    fn test_unsupported_mime_type() {
        assert_eq!(
            validate_document(b"%PDF-1.4", "cv.pdf", "text/plain"),
            Err(IntakeError::UnsupportedMimeType("text/plain".to_string()))
        );
    }

    #[test]
    fn test_mime_parameters_are_ignored() {
        assert_eq!(
            validate_document(b"%PDF-1.4", "cv.pdf", "Application/PDF; charset=binary"),
            Ok(DocumentType::Pdf)
        );
    }

    #[test]
    fn test_extension_checked_before_mime() {
        assert!(matches!(
            validate_document(b"", "cv.txt", "text/plain"),
            Err(IntakeError::UnsupportedExtension(_))
        ));
    }
}
