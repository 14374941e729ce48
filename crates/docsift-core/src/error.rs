//! Error types for the docsift-core library.

use thiserror::Error;

/// Main error type for the docsift library.
#[derive(Error, Debug)]
pub enum SiftError {
    /// Rule set validation error.
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// Result aggregation error.
    #[error("aggregation error: {0}")]
    Aggregate(#[from] AggregateError),

    /// Document processing error.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while loading a rule set.
///
/// Both variants are fatal: a run never starts with a rule set that failed
/// validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Malformed or conflicting rule definition.
    #[error("invalid rule at row {row}: {reason}")]
    InvalidRule { row: usize, reason: String },

    /// A pattern could not be compiled.
    #[error("pattern for rule '{rule_id}' does not compile: {reason}")]
    PatternCompile { rule_id: String, reason: String },
}

/// Errors raised by the aggregator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// Two records share a source id.
    #[error("duplicate document: {0}")]
    DuplicateDocument(String),

    /// A record carries a field that is not part of the table schema.
    #[error("record '{source_id}' has unknown field '{field}'")]
    UnknownField { source_id: String, field: String },

    /// The table was already finalized.
    #[error("aggregator already finalized")]
    Finalized,
}

/// Errors raised while turning a file into document text.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from the PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// No extractor handles this kind of file.
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    /// I/O error while reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A per-document failure. Never fatal to a run; it ends up in the
/// `processing_error` column of the document's row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_id}: {reason}")]
pub struct DocumentError {
    /// Source id of the document that failed.
    pub source_id: String,
    /// Human-readable failure reason.
    pub reason: String,
}

impl DocumentError {
    pub fn new(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for the docsift library.
pub type Result<T> = std::result::Result<T, SiftError>;
