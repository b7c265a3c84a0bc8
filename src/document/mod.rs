//! # Document Loader
//!
//! Turns a document stream into plain text for the pipeline. Reading is
//! split from extraction: [`DocumentLoader::read`] does the cheap header and
//! size checks, [`DocumentLoader::extract_text`] delegates to a
//! [`TextExtractor`] and is the part that runs on a blocking thread.

pub mod extractor;
pub mod loader;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use extractor::{PdfTextExtractor, TextExtractor};
pub use loader::{ensure_text, DocumentLoader, LoadedDocument, RawDocument};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DocumentError {
    #[error("Document unreadable: {0}")]
    Unreadable(String),
    #[error("Document contains no text")]
    Empty,
    #[error("Document exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
}
