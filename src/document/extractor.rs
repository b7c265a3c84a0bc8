//! Text extraction capability.
//!
//! The loader only depends on [`TextExtractor`]. [`PdfTextExtractor`] reads
//! the text layer of digital PDFs through `pdf-extract`, which decodes
//! compressed content streams and font encodings. Scanned pages without a
//! text layer yield no text, which the loader reports as
//! [`DocumentError::Empty`].

use super::DocumentError;
use std::panic;

/// Turns PDF bytes into plain text
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, DocumentError>;
}

/// Extracts the text layer page by page, one page per paragraph
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, DocumentError> {
        // pdf-extract panics on some malformed documents
        let pages = panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| {
                DocumentError::Unreadable("PDF parser aborted on malformed input".to_string())
            })?
            .map_err(|e| DocumentError::Unreadable(format!("PDF text extraction failed: {e}")))?;

        Ok(pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::flate_pdf;

    fn normalized(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_extracts_flate_compressed_text() {
        let pdf = flate_pdf(&["Revenue grew 20% YoY, Net Income $5M"]);
        let text = PdfTextExtractor.extract(&pdf).unwrap();
        assert!(normalized(&text).contains("Revenue grew 20% YoY, Net Income $5M"));
    }

    #[test]
    fn test_keeps_line_order() {
        let pdf = flate_pdf(&["Total revenue was $3.25 billion", "Net income was $410 million"]);
        let text = normalized(&PdfTextExtractor.extract(&pdf).unwrap());

        let revenue = text.find("Total revenue").unwrap();
        let income = text.find("Net income").unwrap();
        assert!(revenue < income);
    }

    #[test]
    fn test_page_without_text_layer_is_blank() {
        let pdf = flate_pdf(&[]);
        let text = PdfTextExtractor.extract(&pdf).unwrap();
        assert!(text.trim().is_empty());
    }

    #[test]
    fn test_malformed_pdf_is_unreadable() {
        let err = PdfTextExtractor.extract(b"%PDF-1.4\n%%EOF\n").unwrap_err();
        assert!(matches!(err, DocumentError::Unreadable(_)));
    }
}
