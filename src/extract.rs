//! Plain-text extraction from uploaded PDFs.
//!
//! Extraction never panics: malformed or image-only files yield an
//! [`ExtractError`] and callers fall back to metadata-only handling.

pub const MIME_PDF: &str = "application/pdf";

#[derive(Debug)]
pub enum ExtractError {
    NotPdf,
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::NotPdf => write!(f, "file is not a PDF"),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// True when the bytes start with the `%PDF-` magic.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Raw text of every page, as produced by `pdf-extract`.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    if !looks_like_pdf(bytes) {
        return Err(ExtractError::NotPdf);
    }
    // pdf-extract can panic on some malformed inputs.
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked".to_string()))?;
    result.map_err(|e| ExtractError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = extract_pdf_text(b"PK\x03\x04 not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::NotPdf));
        assert_eq!(err.to_string(), "file is not a PDF");
    }

    #[test]
    fn truncated_pdf_is_an_error() {
        assert!(extract_pdf_text(b"%PDF-1.4\n%%EOF").is_err());
    }
}
