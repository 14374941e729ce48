//! Input document model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DocumentError;

/// Metadata key holding the document's page count.
pub const META_PAGE_COUNT: &str = "page_count";
/// Metadata key holding the length of the extracted text in characters.
pub const META_CHAR_COUNT: &str = "char_count";
/// Metadata key holding the path the document was read from.
pub const META_PATH: &str = "path";

/// One unit of input text. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (usually a file name or path).
    pub source_id: String,

    /// Extracted raw text.
    pub text: String,

    /// Auxiliary fields supplied by the text extraction collaborator.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    /// Text length in characters, as reported by the collaborator or counted.
    pub fn char_count(&self) -> usize {
        self.metadata
            .get(META_CHAR_COUNT)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_else(|| self.text.chars().count())
    }

    /// Page count, when the collaborator reported one.
    pub fn page_count(&self) -> Option<u32> {
        self.metadata
            .get(META_PAGE_COUNT)
            .and_then(|v| v.trim().parse().ok())
    }
}

/// A document as handed over by the source: either extracted text or the
/// reason extraction failed.
pub type SourcedDocument = std::result::Result<Document, DocumentError>;

impl DocumentError {
    /// Source id of the failed or successful input.
    pub fn source_id_of(input: &SourcedDocument) -> &str {
        match input {
            Ok(doc) => &doc.source_id,
            Err(err) => &err.source_id,
        }
    }
}
