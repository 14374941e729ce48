//! Field-by-field comparison of two revisions of a document.
//!
//! Each pair of records (old revision, latest revision) is compared on every
//! target field. Changed fields are translated into feature names through a
//! [`FeatureMapping`] so reviewers see which product features a revision
//! touched.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::record::{DocumentRecord, ResultTable, Schema};

/// An (old, latest) pair of source ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPair {
    pub old: String,
    pub latest: String,
}

impl DocumentPair {
    pub fn new(old: impl Into<String>, latest: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            latest: latest.into(),
        }
    }
}

/// Maps target fields to feature names. Lookup ignores case and surrounding
/// whitespace; unmapped fields map to their own lowercased name.
#[derive(Debug, Clone, Default)]
pub struct FeatureMapping {
    features: HashMap<String, String>,
}

impl FeatureMapping {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut features = HashMap::new();
        for (field, feature) in pairs {
            // First mapping for a field wins.
            features
                .entry(key(field.as_ref()))
                .or_insert_with(|| key(feature.as_ref()));
        }
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature name for a field.
    pub fn feature_for(&self, field: &str) -> String {
        let field = key(field);
        self.features.get(&field).cloned().unwrap_or(field)
    }
}

fn key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Old and latest value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub field: String,
    pub old: Option<String>,
    pub latest: Option<String>,
    pub same: bool,
}

/// Outcome of comparing one document pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub pair: DocumentPair,
    /// Text length of the old revision, in characters.
    pub old_chars: Option<usize>,
    /// Text length of the latest revision, in characters.
    pub latest_chars: Option<usize>,
    /// Target fields whose values differ, in schema order.
    pub changed_fields: Vec<String>,
    /// Feature names of the changed fields, sorted and deduplicated.
    pub mapped_features: Vec<String>,
    pub fields: Vec<FieldComparison>,
    /// Set when either revision could not be processed.
    pub error: Option<String>,
}

impl Comparison {
    fn failed(pair: DocumentPair, error: String) -> Self {
        Self {
            pair,
            old_chars: None,
            latest_chars: None,
            changed_fields: Vec::new(),
            mapped_features: Vec::new(),
            fields: Vec::new(),
            error: Some(error),
        }
    }

    /// Whether any field changed between the revisions.
    pub fn changed(&self) -> bool {
        !self.changed_fields.is_empty()
    }

    /// Report header for a schema.
    pub fn columns(schema: &Schema) -> Vec<String> {
        let mut columns: Vec<String> = [
            "old",
            "latest",
            "old_chars",
            "latest_chars",
            "data_changed",
            "changed_fields",
            "mapped_features",
            "error",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        for field in schema.fields() {
            columns.push(format!("{}_old", field));
            columns.push(format!("{}_latest", field));
            columns.push(format!("{}_same", field));
        }
        columns
    }

    /// Report cells aligned with [`Comparison::columns`].
    pub fn cells(&self, schema: &Schema) -> Vec<String> {
        let mut cells = vec![
            self.pair.old.clone(),
            self.pair.latest.clone(),
            count_cell(self.old_chars),
            count_cell(self.latest_chars),
            if self.error.is_some() {
                String::new()
            } else if self.changed() {
                "yes".to_string()
            } else {
                "no".to_string()
            },
            self.changed_fields.join(", "),
            self.mapped_features.join(", "),
            self.error.clone().unwrap_or_default(),
        ];

        for field in schema.fields() {
            match self.fields.iter().find(|f| &f.field == field) {
                Some(f) => {
                    cells.push(f.old.clone().unwrap_or_default());
                    cells.push(f.latest.clone().unwrap_or_default());
                    cells.push(f.same.to_string());
                }
                None => cells.extend([String::new(), String::new(), String::new()]),
            }
        }
        cells
    }
}

/// Compare two records field by field.
///
/// Multi-valued fields (joined with `separator`) compare as unordered sets of
/// values, and whitespace inside values is ignored.
pub fn compare_records(
    schema: &Schema,
    old: &DocumentRecord,
    latest: &DocumentRecord,
    separator: &str,
    mapping: &FeatureMapping,
) -> Comparison {
    let pair = DocumentPair::new(&old.source_id, &latest.source_id);

    for record in [old, latest] {
        if let Some(reason) = &record.processing_error {
            return Comparison {
                old_chars: old.char_count,
                latest_chars: latest.char_count,
                ..Comparison::failed(pair, format!("{}: {}", record.source_id, reason))
            };
        }
    }

    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut changed_fields = Vec::new();
    let mut features = BTreeSet::new();

    for field in schema.fields() {
        let old_value = old.value(field);
        let latest_value = latest.value(field);
        let same = comparable(old_value, separator) == comparable(latest_value, separator);

        if !same {
            changed_fields.push(field.clone());
            features.insert(mapping.feature_for(field));
        }

        fields.push(FieldComparison {
            field: field.clone(),
            old: old_value.map(str::to_string),
            latest: latest_value.map(str::to_string),
            same,
        });
    }

    debug!(
        "Compared {} -> {}: {} changed",
        pair.old,
        pair.latest,
        changed_fields.len()
    );

    Comparison {
        pair,
        old_chars: old.char_count,
        latest_chars: latest.char_count,
        changed_fields,
        mapped_features: features.into_iter().collect(),
        fields,
        error: None,
    }
}

/// Compare every pair using the records of one result table.
pub fn compare_pairs(
    table: &ResultTable,
    pairs: &[DocumentPair],
    separator: &str,
    mapping: &FeatureMapping,
) -> Vec<Comparison> {
    pairs
        .iter()
        .map(|pair| match (table.get(&pair.old), table.get(&pair.latest)) {
            (Some(old), Some(latest)) => {
                compare_records(&table.schema, old, latest, separator, mapping)
            }
            (None, _) => Comparison::failed(pair.clone(), format!("{}: not processed", pair.old)),
            (_, None) => {
                Comparison::failed(pair.clone(), format!("{}: not processed", pair.latest))
            }
        })
        .collect()
}

fn count_cell(count: Option<usize>) -> String {
    count.map(|c| c.to_string()).unwrap_or_default()
}

fn comparable(value: Option<&str>, separator: &str) -> Vec<String> {
    let mut parts: Vec<String> = match value {
        Some(v) if !separator.is_empty() => v.split(separator).map(strip_whitespace).collect(),
        Some(v) => vec![strip_whitespace(v)],
        None => Vec::new(),
    };
    parts.sort();
    parts
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}
