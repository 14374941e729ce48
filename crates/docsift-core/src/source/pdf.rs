//! PDF text extraction using lopdf and pdf-extract.

use lopdf::Document;
use tracing::debug;

use super::{ExtractedText, Result, TextExtractor};
use crate::error::SourceError;

/// PDF text extractor. lopdf opens (and if needed decrypts) the file and
/// counts pages; pdf-extract produces the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse the PDF, returning the page count and the bytes pdf-extract
    /// should read (re-saved when the file had to be decrypted).
    fn load(&self, data: &[u8]) -> Result<(u32, Vec<u8>)> {
        let mut doc = Document::load_mem(data).map_err(|e| SourceError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        let raw_data = if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(SourceError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| SourceError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let page_count = doc.get_pages().len() as u32;
        if page_count == 0 {
            return Err(SourceError::NoPages);
        }

        Ok((page_count, raw_data))
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, data: &[u8]) -> Result<ExtractedText> {
        let (page_count, raw_data) = self.load(data)?;

        let text = pdf_extract::extract_text_from_mem(&raw_data)
            .map_err(|e| SourceError::TextExtraction(e.to_string()))?;

        debug!("Extracted {} chars from {} pages", text.len(), page_count);

        Ok(ExtractedText {
            text,
            page_count: Some(page_count),
        })
    }
}
