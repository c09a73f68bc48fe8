// PDF Intake Service
// Upload validation and text extraction for uploaded documents

use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::DocumentText;

/// 10 MiB upload cap.
pub const MAX_UPLOAD_BYTES: usize = 10 << 20;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("file is required")]
    Missing,
    #[error("file size must not exceed 10MB (got {0} bytes)")]
    TooLarge(usize),
    #[error("only PDF files are supported (got {0:?})")]
    UnsupportedType(String),
    #[error("failed to extract text: {0}")]
    Unreadable(String),
    #[error("document contains no text")]
    Empty,
}

impl IntakeError {
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::Missing => "FILE_REQUIRED",
            IntakeError::TooLarge(_) => "FILE_TOO_LARGE",
            IntakeError::UnsupportedType(_) => "INVALID_FILE_TYPE",
            IntakeError::Unreadable(_) => "EXTRACTION_FAILED",
            IntakeError::Empty => "EMPTY_DOCUMENT",
        }
    }
}

/// Raw text extraction from PDF bytes.
pub trait PdfTextExtractor: Send + Sync {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, IntakeError>;
}

/// Extractor backed by the `pdf-extract` crate. Digital PDFs only; scanned
/// pages produce no text.
pub struct PdfExtractText;

impl PdfTextExtractor for PdfExtractText {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, IntakeError> {
        // pdf-extract panics on some malformed inputs instead of returning an error.
        let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(pdf_bytes));
        match result {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(IntakeError::Unreadable(e.to_string())),
            Err(_) => Err(IntakeError::Unreadable("PDF parser panicked".to_string())),
        }
    }
}

/// Reject missing, oversized and non-PDF uploads.
pub fn validate_upload(filename: &str, bytes: &[u8]) -> Result<(), IntakeError> {
    if filename.trim().is_empty() || bytes.is_empty() {
        return Err(IntakeError::Missing);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(IntakeError::TooLarge(bytes.len()));
    }

    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ext != "pdf" {
        return Err(IntakeError::UnsupportedType(ext));
    }
    Ok(())
}

/// Validate, extract and normalize an uploaded PDF.
pub fn extract_document_text(
    extractor: &dyn PdfTextExtractor,
    filename: &str,
    bytes: &[u8],
) -> Result<DocumentText, IntakeError> {
    validate_upload(filename, bytes)?;
    info!("[INTAKE] extracting text from {} ({} bytes)", filename, bytes.len());

    let raw = extractor.extract_text(bytes)?;
    match DocumentText::new(&raw) {
        Some(text) => {
            info!("[INTAKE] extracted {} chars from {}", text.char_count(), filename);
            Ok(text)
        }
        None => {
            warn!("[INTAKE] {} contains no extractable text", filename);
            Err(IntakeError::Empty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedExtractor(&'static str);

    impl PdfTextExtractor for FixedExtractor {
        fn extract_text(&self, _pdf_bytes: &[u8]) -> Result<String, IntakeError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_validate_upload() {
        assert!(validate_upload("contract.pdf", b"%PDF").is_ok());
        assert!(validate_upload("CONTRACT.PDF", b"%PDF").is_ok());
        assert!(matches!(validate_upload("", b"%PDF"), Err(IntakeError::Missing)));
        assert!(matches!(validate_upload("a.pdf", b""), Err(IntakeError::Missing)));
        assert!(matches!(
            validate_upload("contract.docx", b"PK"),
            Err(IntakeError::UnsupportedType(ref e)) if e == "docx"
        ));
        assert!(matches!(
            validate_upload("noext", b"x"),
            Err(IntakeError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_validate_upload_size_cap() {
        let big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            validate_upload("big.pdf", &big),
            Err(IntakeError::TooLarge(n)) if n == MAX_UPLOAD_BYTES + 1
        ));
        let exact = vec![0u8; MAX_UPLOAD_BYTES];
        assert!(validate_upload("exact.pdf", &exact).is_ok());
    }

    #[test]
    fn test_extraction_normalizes_whitespace() {
        let text = extract_document_text(
            &FixedExtractor("ДОГОВОР\n\n  № 5\r\n\tот 01.01.2024 "),
            "d.pdf",
            b"%PDF",
        )
        .unwrap();
        assert_eq!(text.as_str(), "ДОГОВОР № 5 от 01.01.2024");
    }

    #[test]
    fn test_blank_extraction_is_empty_error() {
        let err = extract_document_text(&FixedExtractor(" \n \u{000C} "), "scan.pdf", b"%PDF").unwrap_err();
        assert!(matches!(err, IntakeError::Empty));
        assert_eq!(err.code(), "EMPTY_DOCUMENT");
    }

    #[test]
    fn test_garbage_bytes_are_unreadable() {
        let err = PdfExtractText.extract_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, IntakeError::Unreadable(_)));
    }
}
