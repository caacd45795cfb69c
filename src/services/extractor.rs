//! PDF text extraction.
//!
//! Best-effort extraction over uploaded bytes: tolerates malformed
//! (password-free) documents, but never lets an empty result through —
//! scanned or image-only PDFs fail here instead of producing an empty
//! analysis downstream.

use tracing::{debug, warn};

use crate::error::ApiError;
use crate::services::prompts::MIN_TEXT_LEN;

/// PDF files start with this signature.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// MIME types accepted for uploaded quote documents.
const ACCEPTED_MIME_TYPES: [&str; 2] = ["application/pdf", "application/x-pdf"];

/// Check the declared content type of an upload.
pub fn is_pdf_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    ACCEPTED_MIME_TYPES.contains(&essence)
}

/// Check the byte-buffer signature of an upload.
pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Extract plain text from a PDF byte buffer.
///
/// Signals `Extraction` when the document yields no usable text (empty or
/// below the minimum analyzable length).
pub fn extract_text(bytes: &[u8]) -> Result<String, ApiError> {
    if !has_pdf_signature(bytes) {
        return Err(ApiError::bad_request(
            "Le fichier fourni n'est pas un PDF (signature invalide)",
        ));
    }

    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        warn!(error = %e, "PDF text extraction failed");
        ApiError::Extraction(format!("lecture du PDF impossible ({})", e))
    })?;

    let cleaned = clean_text(&text);

    debug!(
        raw_len = text.len(),
        cleaned_len = cleaned.len(),
        "PDF text extraction complete"
    );

    if cleaned.len() < MIN_TEXT_LEN {
        return Err(ApiError::Extraction(
            "texte vide ou trop court (document scanné ?)".to_string(),
        ));
    }

    Ok(cleaned)
}

/// Collapse whitespace runs and strip BOM artifacts.
fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{FEFF}', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_check_accepts_pdf_with_parameters() {
        assert!(is_pdf_mime("application/pdf"));
        assert!(is_pdf_mime("application/pdf; charset=binary"));
        assert!(is_pdf_mime("application/x-pdf"));
        assert!(!is_pdf_mime("image/png"));
        assert!(!is_pdf_mime("text/plain"));
    }

    #[test]
    fn signature_check_requires_pdf_magic() {
        assert!(has_pdf_signature(b"%PDF-1.7 rest of file"));
        assert!(!has_pdf_signature(b"PK\x03\x04 zip archive"));
        assert!(!has_pdf_signature(b""));
    }

    #[test]
    fn non_pdf_bytes_are_rejected_as_bad_request() {
        let err = extract_text(b"plain text body").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(
            clean_text("Devis   n°42\n\nMontant :\t1 200 EUR"),
            "Devis n°42 Montant : 1 200 EUR"
        );
    }
}
