//! Core library for rule-based document field extraction.
//!
//! This crate provides:
//! - A validated rule model (exact, contains, regex and line rules)
//! - A deterministic matcher and per-document processor
//! - An aggregator that builds one rectangular result table per run
//! - A batch pipeline with a bounded worker pool and cooperative cancellation
//! - Field-by-field comparison of document revisions
//! - Document sources for PDF and plain text files

pub mod aggregate;
pub mod compare;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod source;

pub use aggregate::Aggregator;
pub use compare::{compare_pairs, compare_records, Comparison, DocumentPair, FeatureMapping};
pub use error::{AggregateError, DocumentError, Result, RuleError, SiftError, SourceError};
pub use extract::{DocumentProcessor, Matcher};
pub use models::config::{MatchConfig, MatchPolicy, SiftConfig};
pub use models::document::{Document, SourcedDocument};
pub use models::record::{DocumentRecord, MatchResult, ResultTable, Schema};
pub use models::rule::{RawRuleRow, Rule, RuleMode};
pub use pipeline::{CancellationToken, Pipeline};
pub use rules::{rows_for_group, rule_groups, RuleSet};
pub use source::{load_document, load_document_as, SourceIndex, TextExtractor};
