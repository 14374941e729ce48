//! Document sources: turn files into [`Document`]s.
//!
//! This is the text-extraction collaborator of the engine. Failures are
//! returned in-band as [`DocumentError`]s so a broken file becomes one
//! flagged row instead of aborting the batch.

#[cfg(feature = "pdf")]
mod pdf;

#[cfg(feature = "pdf")]
pub use pdf::PdfTextExtractor;

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DocumentError, SourceError};
use crate::models::config::SourceConfig;
use crate::models::document::{
    Document, SourcedDocument, META_CHAR_COUNT, META_PAGE_COUNT, META_PATH,
};
use crate::pipeline::panic_message;

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Text pulled out of a file, plus what the extractor learned about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: Option<u32>,
}

/// Trait for text extraction implementations.
pub trait TextExtractor {
    /// Extract text from raw file bytes.
    fn extract(&self, data: &[u8]) -> Result<ExtractedText>;
}

/// Reads plain text files (lossy UTF-8).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, data: &[u8]) -> Result<ExtractedText> {
        Ok(ExtractedText {
            text: String::from_utf8_lossy(data).into_owned(),
            page_count: None,
        })
    }
}

/// Lowercased extension of a path, without the dot.
fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Whether the configuration accepts this file.
pub fn is_supported(path: &Path, config: &SourceConfig) -> bool {
    let ext = extension(path);
    config.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
}

/// Source id used for a path.
pub fn source_id_for(path: &Path, config: &SourceConfig) -> String {
    if config.file_name_as_id {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            return name.to_string();
        }
    }
    path.display().to_string()
}

/// Distinct files of a batch with source ids that cannot collide.
///
/// Paths naming the same file are merged. When two different files would get
/// the same id (same file name in different directories with
/// `file_name_as_id`), both fall back to their full path.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    entries: Vec<(PathBuf, String)>,
    by_key: HashMap<PathBuf, usize>,
}

impl SourceIndex {
    pub fn build<'a, I>(paths: I, config: &SourceConfig) -> Self
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut files: Vec<PathBuf> = Vec::new();
        let mut by_key = HashMap::new();
        for path in paths {
            by_key.entry(file_key(path)).or_insert_with(|| {
                files.push(path.to_path_buf());
                files.len() - 1
            });
        }

        let preferred: Vec<String> = files.iter().map(|p| source_id_for(p, config)).collect();
        let mut uses: HashMap<&str, usize> = HashMap::new();
        for id in &preferred {
            *uses.entry(id.as_str()).or_default() += 1;
        }

        let entries = files
            .iter()
            .zip(&preferred)
            .map(|(path, id)| {
                let id = if uses[id.as_str()] > 1 {
                    debug!("Source id {} is ambiguous, using the full path", id);
                    path.display().to_string()
                } else {
                    id.clone()
                };
                (path.clone(), id)
            })
            .collect();

        Self { entries, by_key }
    }

    /// Source id assigned to a path of the batch.
    pub fn id_of(&self, path: &Path) -> Option<&str> {
        self.by_key
            .get(&file_key(path))
            .map(|&i| self.entries[i].1.as_str())
    }

    /// Distinct files with their ids, in first-appearance order.
    pub fn entries(&self) -> &[(PathBuf, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn file_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn extractor_for(path: &Path) -> Result<Box<dyn TextExtractor>> {
    match extension(path).as_str() {
        #[cfg(feature = "pdf")]
        "pdf" => Ok(Box::new(PdfTextExtractor::new())),
        "txt" | "text" => Ok(Box::new(PlainTextExtractor)),
        other => Err(SourceError::Unsupported(other.to_string())),
    }
}

/// Read and extract one file.
pub fn extract_file(path: &Path) -> Result<ExtractedText> {
    let extractor = extractor_for(path)?;
    let data = std::fs::read(path)?;
    extract_guarded(extractor.as_ref(), &data)
}

/// Run an extractor, reporting a panic inside third-party parsing code as an
/// extraction error.
fn extract_guarded(extractor: &dyn TextExtractor, data: &[u8]) -> Result<ExtractedText> {
    panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(data))).unwrap_or_else(|payload| {
        Err(SourceError::TextExtraction(format!(
            "extractor panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

/// Load a file as a document; any failure is returned as a [`DocumentError`]
/// carrying the file's source id.
pub fn load_document(path: &Path, config: &SourceConfig) -> SourcedDocument {
    load_document_as(path, source_id_for(path, config), config)
}

/// Like [`load_document`], with a caller-chosen source id.
pub fn load_document_as(
    path: &Path,
    source_id: impl Into<String>,
    config: &SourceConfig,
) -> SourcedDocument {
    let source_id = source_id.into();

    if !is_supported(path, config) {
        return Err(DocumentError::new(
            source_id,
            SourceError::Unsupported(extension(path)).to_string(),
        ));
    }

    let extracted = extract_file(path).map_err(|e| DocumentError::new(&source_id, e.to_string()))?;

    debug!(
        "Loaded {}: {} chars, {:?} pages",
        source_id,
        extracted.text.chars().count(),
        extracted.page_count
    );

    let mut document = Document::new(source_id, extracted.text)
        .with_metadata(META_PATH, path.display());
    let char_count = document.text.chars().count();
    document = document.with_metadata(META_CHAR_COUNT, char_count);
    if let Some(pages) = extracted.page_count {
        document = document.with_metadata(META_PAGE_COUNT, pages);
    }

    Ok(document)
}
