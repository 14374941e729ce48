//! Match results, per-document records and the consolidated result table.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Name of the identifier column.
pub const SOURCE_ID_COLUMN: &str = "source_id";
/// Name of the diagnostic column listing unmet required rules.
pub const MISSING_REQUIRED_COLUMN: &str = "missing_required";
/// Name of the diagnostic column carrying a per-document failure.
pub const PROCESSING_ERROR_COLUMN: &str = "processing_error";

/// Outcome of applying one rule to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub rule_id: String,
    pub value: Option<String>,
    pub found: bool,
}

impl MatchResult {
    pub fn found(rule_id: impl Into<String>, value: String) -> Self {
        Self {
            rule_id: rule_id.into(),
            value: Some(value),
            found: true,
        }
    }

    pub fn not_found(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            value: None,
            found: false,
        }
    }
}

/// The extracted fields of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Source id of the document.
    pub source_id: String,

    /// Target field -> extracted value (`None` when nothing matched).
    pub fields: BTreeMap<String, Option<String>>,

    /// Ids of required rules that did not match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_required: Vec<String>,

    /// Why the document could not be processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,

    /// Length of the document text in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_count: Option<usize>,
}

impl DocumentRecord {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            fields: BTreeMap::new(),
            missing_required: Vec::new(),
            processing_error: None,
            char_count: None,
        }
    }

    /// A record for a document that could not be processed: every field
    /// empty, the reason kept in `processing_error`.
    pub fn failed<'a>(
        source_id: impl Into<String>,
        fields: impl IntoIterator<Item = &'a str>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            fields: fields.into_iter().map(|f| (f.to_string(), None)).collect(),
            missing_required: Vec::new(),
            processing_error: Some(reason.into()),
            char_count: None,
        }
    }

    /// Extracted value of a field, if any.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_deref())
    }

    /// Whether this row needs a reviewer's attention.
    pub fn has_diagnostics(&self) -> bool {
        !self.missing_required.is_empty() || self.processing_error.is_some()
    }
}

/// Column layout of a result table, fixed before the first record arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    /// Build a schema from target fields in declaration order.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Target fields in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Full header: `source_id`, target fields, then optional diagnostics.
    pub fn columns(&self, include_diagnostics: bool) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.fields.len() + 3);
        columns.push(SOURCE_ID_COLUMN.to_string());
        columns.extend(self.fields.iter().cloned());
        if include_diagnostics {
            columns.push(MISSING_REQUIRED_COLUMN.to_string());
            columns.push(PROCESSING_ERROR_COLUMN.to_string());
        }
        columns
    }

    /// Render a record as cells aligned with [`Schema::columns`].
    pub fn cells(
        &self,
        record: &DocumentRecord,
        include_diagnostics: bool,
        list_separator: &str,
    ) -> Vec<String> {
        let mut cells = Vec::with_capacity(self.fields.len() + 3);
        cells.push(record.source_id.clone());
        for field in &self.fields {
            cells.push(record.value(field).unwrap_or_default().to_string());
        }
        if include_diagnostics {
            cells.push(record.missing_required.join(list_separator));
            cells.push(record.processing_error.clone().unwrap_or_default());
        }
        cells
    }
}

/// The consolidated, rectangular output of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTable {
    /// Column layout.
    pub schema: Schema,

    /// One row per document, in input order unless sorted.
    pub rows: Vec<DocumentRecord>,

    /// The run was cancelled before every document was dispatched.
    #[serde(default)]
    pub cancelled: bool,
}

impl ResultTable {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            cancelled: false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for a given source id.
    pub fn get(&self, source_id: &str) -> Option<&DocumentRecord> {
        self.rows.iter().find(|r| r.source_id == source_id)
    }

    /// Rows that carry a diagnostic marker.
    pub fn flagged(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.rows.iter().filter(|r| r.has_diagnostics())
    }

    /// Stable sort by `source_id` or a target field; empty values sort last.
    ///
    /// Returns `false` (leaving the table untouched) for an unknown key.
    pub fn sort_by_column(&mut self, key: &str) -> bool {
        if key == SOURCE_ID_COLUMN {
            self.rows.sort_by(|a, b| a.source_id.cmp(&b.source_id));
            return true;
        }
        if !self.schema.contains(key) {
            return false;
        }

        self.rows.sort_by(|a, b| match (a.value(key), b.value(key)) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, code: Option<&str>) -> DocumentRecord {
        let mut r = DocumentRecord::new(id);
        r.fields.insert("code".to_string(), code.map(str::to_string));
        r
    }

    #[test]
    fn test_columns_and_cells() {
        let schema = Schema::new(["code", "voltage"]);
        let mut r = record("a.pdf", Some("X1"));
        r.fields.insert("voltage".to_string(), None);
        r.missing_required = vec!["r2".to_string(), "r3".to_string()];

        assert_eq!(
            schema.columns(true),
            vec!["source_id", "code", "voltage", "missing_required", "processing_error"]
        );
        assert_eq!(schema.cells(&r, true, ";"), vec!["a.pdf", "X1", "", "r2;r3", ""]);
        assert_eq!(schema.cells(&r, false, ";"), vec!["a.pdf", "X1", ""]);
    }

    #[test]
    fn test_failed_record_is_empty() {
        let r = DocumentRecord::failed("bad.pdf", ["code", "voltage"], "cannot read");

        assert_eq!(r.fields.len(), 2);
        assert!(r.fields.values().all(Option::is_none));
        assert_eq!(r.processing_error.as_deref(), Some("cannot read"));
        assert!(r.has_diagnostics());
    }

    #[test]
    fn test_sort_empty_last_and_stable() {
        let mut table = ResultTable::new(Schema::new(["code"]));
        table.rows = vec![
            record("1", None),
            record("2", Some("B")),
            record("3", Some("A")),
            record("4", None),
            record("5", Some("A")),
        ];

        assert!(table.sort_by_column("code"));
        let order: Vec<_> = table.rows.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(order, vec!["3", "5", "2", "1", "4"]);
    }

    #[test]
    fn test_sort_unknown_key() {
        let mut table = ResultTable::new(Schema::new(["code"]));
        table.rows = vec![record("b", None), record("a", None)];

        assert!(!table.sort_by_column("missing"));
        assert_eq!(table.rows[0].source_id, "b");

        assert!(table.sort_by_column(SOURCE_ID_COLUMN));
        assert_eq!(table.rows[0].source_id, "a");
    }
}
