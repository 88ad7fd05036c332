//! Text extraction: turns validated document bytes into flat text plus a word count.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::intake::{DocumentType, IntakeError};

/// Main body part of a WordprocessingML package.
const DOCX_BODY_PART: &str = "word/document.xml";

/// Shortest printable run kept when scavenging legacy DOC streams.
const MIN_DOC_RUN_CHARS: usize = 4;

/// Compound-file directory names that show up as printable runs but are not content.
const OLE_STREAM_NAMES: &[&str] = &[
    "Root Entry",
    "WordDocument",
    "SummaryInformation",
    "DocumentSummaryInformation",
    "1Table",
    "0Table",
    "CompObj",
    "Microsoft Word",
    "MSWordDoc",
    "Word.Document",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub word_count: usize,
}

impl ExtractedText {
    fn from_raw(raw: String) -> Result<Self, IntakeError> {
        let text = raw.trim().to_string();
        if text.is_empty() {
            return Err(IntakeError::ExtractionFailed(
                "document contains no extractable text".to_string(),
            ));
        }
        let word_count = text.split_whitespace().count();
        Ok(Self { text, word_count })
    }
}

/// Extracts text from bytes already accepted by the validator.
pub fn extract_text(bytes: &[u8], doc_type: DocumentType) -> Result<ExtractedText, IntakeError> {
    let raw = match doc_type {
        DocumentType::Pdf => extract_pdf(bytes)?,
        DocumentType::Docx => extract_docx(bytes)?,
        DocumentType::Doc => extract_doc(bytes),
    };
    ExtractedText::from_raw(raw)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, IntakeError> {
    // pdf-extract panics on some malformed streams; treat that like any other decode failure.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(IntakeError::ExtractionFailed(format!("unreadable PDF: {e}"))),
        Err(_) => Err(IntakeError::ExtractionFailed(
            "PDF parser aborted on malformed stream".to_string(),
        )),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, IntakeError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IntakeError::ExtractionFailed(format!("corrupted DOCX archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .map_err(|e| IntakeError::ExtractionFailed(format!("missing {DOCX_BODY_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| IntakeError::ExtractionFailed(format!("unreadable {DOCX_BODY_PART}: {e}")))?;

    docx_body_text(&xml)
}

/// Flattens WordprocessingML: `w:t` runs are text, paragraphs and breaks become newlines.
fn docx_body_text(xml: &str) -> Result<String, IntakeError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let text = t.unescape().map_err(|e| {
                    IntakeError::ExtractionFailed(format!("malformed document.xml: {e}"))
                })?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(IntakeError::ExtractionFailed(format!(
                    "malformed document.xml at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    Ok(out)
}

/// Best-effort recovery of text from a legacy binary DOC.
///
/// Word 97-2003 stores body text either as 8-bit characters or UTF-16LE inside the
/// `WordDocument` stream, so printable runs in both encodings are collected in file order.
fn extract_doc(bytes: &[u8]) -> String {
    let mut runs = Vec::new();
    collect_runs(bytes.iter().map(|&b| b as u16), &mut runs);
    for offset in 0..2 {
        let tail = bytes.get(offset..).unwrap_or_default();
        collect_runs(
            tail.chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
            &mut runs,
        );
    }
    runs.join("\n")
}

fn collect_runs(units: impl Iterator<Item = u16>, runs: &mut Vec<String>) {
    let mut current = String::new();
    for unit in units {
        match char::from_u32(u32::from(unit)).filter(|c| is_printable(*c)) {
            Some(c) => current.push(c),
            None => flush_run(&mut current, runs),
        }
    }
    flush_run(&mut current, runs);
}

/// ASCII plus Latin letters; anything higher is almost always two ASCII bytes read as one unit.
fn is_printable(c: char) -> bool {
    c == '\t' || (c.is_ascii() && !c.is_ascii_control()) || (c.is_alphabetic() && c < '\u{0250}')
}

fn flush_run(current: &mut String, runs: &mut Vec<String>) {
    let run = current.trim();
    let keep = run.chars().count() >= MIN_DOC_RUN_CHARS
        && run.chars().any(char::is_alphabetic)
        && !OLE_STREAM_NAMES.iter().any(|name| run.starts_with(name));
    if keep {
        runs.push(run.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>SKILLS</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Rust, </w:t></w:r><w:r><w:t>Go &amp; Kubernetes</w:t></w:r></w:p>
    <w:p><w:r><w:t>Name</w:t><w:tab/><w:t>Jane</w:t><w:br/><w:t>Second line</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    fn build_docx(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_extraction_flattens_paragraphs() {
        let bytes = build_docx(&[
            ("[Content_Types].xml", "<Types/>"),
            (DOCX_BODY_PART, DOCUMENT_XML),
        ]);
        let extracted = extract_text(&bytes, DocumentType::Docx).unwrap();
        assert_eq!(
            extracted.text,
            "SKILLS\nRust, Go & Kubernetes\nName\tJane\nSecond line"
        );
        assert_eq!(extracted.word_count, 9);
    }

    #[test]
    fn test_docx_without_body_part_fails() {
        let bytes = build_docx(&[("[Content_Types].xml", "<Types/>")]);
        let err = extract_text(&bytes, DocumentType::Docx).unwrap_err();
        assert!(matches!(err, IntakeError::ExtractionFailed(msg) if msg.contains("word/document.xml")));
    }

    #[test]
    fn test_corrupted_docx_archive_fails() {
        let bytes = b"PK\x03\x04[Content_Types].xml truncated".to_vec();
        let err = extract_text(&bytes, DocumentType::Docx).unwrap_err();
        assert!(matches!(err, IntakeError::ExtractionFailed(_)));
    }

    #[test]
    fn test_docx_with_empty_body_fails() {
        let bytes = build_docx(&[
            ("[Content_Types].xml", "<Types/>"),
            (DOCX_BODY_PART, "<w:document><w:body/></w:document>"),
        ]);
        let err = extract_text(&bytes, DocumentType::Docx).unwrap_err();
        assert_eq!(
            err,
            IntakeError::ExtractionFailed("document contains no extractable text".to_string())
        );
    }

    #[test]
    fn test_unreadable_pdf_fails() {
        let err = extract_text(b"%PDF-1.4 not really a pdf", DocumentType::Pdf).unwrap_err();
        assert!(matches!(err, IntakeError::ExtractionFailed(_)));
    }

    #[test]
    fn test_doc_recovers_ascii_and_utf16_runs() {
        let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(b"Experienced Rust engineer");
        bytes.extend_from_slice(&[0u8; 8]);
        for unit in "Kubernetes operator".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes.extend_from_slice(&[0u8; 4]);

        let extracted = extract_text(&bytes, DocumentType::Doc).unwrap();
        assert!(extracted.text.contains("Experienced Rust engineer"));
        assert!(extracted.text.contains("Kubernetes operator"));
    }

    #[test]
    fn test_doc_skips_stream_names_and_noise() {
        let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x00];
        bytes.extend_from_slice(b"WordDocument\x00ab\x00\x011234\x00");
        let err = extract_text(&bytes, DocumentType::Doc).unwrap_err();
        assert!(matches!(err, IntakeError::ExtractionFailed(_)));
    }

    #[test]
    fn test_word_count_uses_whitespace_tokens() {
        let extracted = ExtractedText::from_raw("  one two\tthree\nfour  ".to_string()).unwrap();
        assert_eq!(extracted.word_count, 4);
        assert_eq!(extracted.text, "one two\tthree\nfour");
    }
}
