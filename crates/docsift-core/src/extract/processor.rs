//! Runs every rule of a rule set against one document.

use tracing::{debug, trace};

use crate::models::config::MatchConfig;
use crate::models::document::{Document, SourcedDocument};
use crate::models::record::DocumentRecord;
use crate::rules::RuleSet;

use super::matcher::Matcher;

/// Turns a document into a [`DocumentRecord`].
///
/// Never fails: an unprocessable document yields a record whose fields are
/// all empty and whose `processing_error` explains why.
#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    matcher: Matcher,
    max_pages: Option<u32>,
}

impl DocumentProcessor {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            matcher: Matcher::new(config),
            max_pages: None,
        }
    }

    /// Reject documents whose reported page count exceeds `max_pages`.
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Process a document, or record the collaborator's failure.
    pub fn process_sourced(&self, input: &SourcedDocument, rules: &RuleSet) -> DocumentRecord {
        match input {
            Ok(document) => self.process(document, rules),
            Err(err) => {
                debug!("Recording extraction failure for {}", err.source_id);
                DocumentRecord::failed(&err.source_id, rules.target_fields(), &err.reason)
            }
        }
    }

    /// Run every rule in declaration order.
    pub fn process(&self, document: &Document, rules: &RuleSet) -> DocumentRecord {
        if let (Some(limit), Some(pages)) = (self.max_pages, document.page_count()) {
            if pages > limit {
                debug!("Skipping {}: {} pages", document.source_id, pages);
                return DocumentRecord::failed(
                    &document.source_id,
                    rules.target_fields(),
                    format!("page limit exceeded: {} > {}", pages, limit),
                );
            }
        }

        let text = self.matcher.prepare(&document.text);
        let mut record = DocumentRecord::new(&document.source_id);
        record.char_count = Some(document.char_count());

        for rule in rules {
            let result = self.matcher.match_text(rule, &text);
            trace!(
                "{} / {}: found={} value={:?}",
                document.source_id, rule.id, result.found, result.value
            );

            if rule.required && !result.found {
                record.missing_required.push(rule.id.clone());
            }
            record.fields.insert(rule.target_field.clone(), result.value);
        }

        debug!(
            "Processed {}: {}/{} fields, {} required missing",
            document.source_id,
            record.fields.values().filter(|v| v.is_some()).count(),
            rules.len(),
            record.missing_required.len()
        );

        record
    }
}
