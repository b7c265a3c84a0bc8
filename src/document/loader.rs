use super::extractor::{PdfTextExtractor, TextExtractor};
use super::DocumentError;
use crate::config::DocumentConfig;
use crate::constants::system::PDF_MAGIC;
use crate::models::DocumentRef;
use std::fmt;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use tracing::debug;

/// Text plus a reference to the bytes it came from
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub text: String,
    pub reference: DocumentRef,
}

/// Bytes that passed the format and size checks, not yet extracted
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub bytes: Arc<[u8]>,
    pub reference: DocumentRef,
}

/// Reads a document stream and returns its text.
///
/// The format check runs on the first bytes of the stream, before the rest is
/// read or any extraction work is done.
#[derive(Clone)]
pub struct DocumentLoader {
    extractor: Arc<dyn TextExtractor>,
    max_bytes: usize,
}

impl fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentLoader")
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl DocumentLoader {
    pub fn new(extractor: Arc<dyn TextExtractor>, max_bytes: usize) -> Self {
        Self {
            extractor,
            max_bytes,
        }
    }

    pub fn from_config(config: &DocumentConfig) -> Self {
        Self::new(Arc::new(PdfTextExtractor), config.max_bytes)
    }

    /// Read and extract in one call. Extraction is CPU-bound; async callers
    /// use [`read`](Self::read) and run [`extract_text`](Self::extract_text)
    /// on a blocking thread.
    pub fn load<R: Read>(&self, source: &str, reader: R) -> Result<LoadedDocument, DocumentError> {
        let raw = self.read(source, reader)?;
        let text = self.extract_text(&raw.bytes)?;
        Ok(LoadedDocument {
            text,
            reference: raw.reference,
        })
    }

    /// Check the `%PDF-` header and the size limit, returning the bytes
    pub fn read<R: Read>(&self, source: &str, mut reader: R) -> Result<RawDocument, DocumentError> {
        let mut header = [0u8; 5];
        reader.read_exact(&mut header).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                DocumentError::Unreadable("input is too short to be a PDF document".to_string())
            }
            _ => DocumentError::Unreadable(e.to_string()),
        })?;

        if header != PDF_MAGIC {
            return Err(DocumentError::Unreadable(
                "input is not a PDF document (missing %PDF- header)".to_string(),
            ));
        }

        let mut bytes = header.to_vec();
        let remaining = self.max_bytes.saturating_sub(header.len()) as u64 + 1;
        reader
            .take(remaining)
            .read_to_end(&mut bytes)
            .map_err(|e| DocumentError::Unreadable(e.to_string()))?;

        if bytes.len() > self.max_bytes {
            return Err(DocumentError::TooLarge {
                limit: self.max_bytes,
            });
        }

        Ok(RawDocument {
            reference: DocumentRef::from_bytes(source, &bytes),
            bytes: bytes.into(),
        })
    }

    /// Extract text from bytes accepted by [`read`](Self::read)
    pub fn extract_text(&self, bytes: &[u8]) -> Result<String, DocumentError> {
        let text = self.extractor.extract(bytes)?;
        ensure_text(&text)?;

        debug!(bytes = bytes.len(), chars = text.len(), "Document text extracted");
        Ok(text)
    }
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::from_config(&DocumentConfig::default())
    }
}

/// Reject text that is empty or whitespace-only
pub fn ensure_text(text: &str) -> Result<(), DocumentError> {
    if text.trim().is_empty() {
        Err(DocumentError::Empty)
    } else {
        Ok(())
    }
}
