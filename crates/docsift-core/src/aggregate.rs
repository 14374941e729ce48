//! Consolidates per-document records into one result table.

use std::collections::HashSet;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::AggregateError;
use crate::models::record::{DocumentRecord, ResultTable, Schema};

/// Result type for aggregation.
pub type Result<T> = std::result::Result<T, AggregateError>;

/// Single-writer accumulator for [`DocumentRecord`]s.
///
/// The schema is fixed at construction, so every row of the final table has
/// every column.
#[derive(Debug)]
pub struct Aggregator {
    table: ResultTable,
    seen: HashSet<String>,
    finalized: OnceLock<ResultTable>,
    sort_by: Option<String>,
}

impl Aggregator {
    pub fn new(schema: Schema) -> Self {
        Self {
            table: ResultTable::new(schema),
            seen: HashSet::new(),
            finalized: OnceLock::new(),
            sort_by: None,
        }
    }

    /// Sort the finalized table by this column instead of keeping input order.
    pub fn with_sort_key(mut self, key: Option<String>) -> Self {
        self.sort_by = key;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.table.schema
    }

    /// Number of records added so far.
    pub fn len(&self) -> usize {
        self.table.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.rows.is_empty()
    }

    /// Append a record. On error the table is left unchanged.
    pub fn add(&mut self, mut record: DocumentRecord) -> Result<()> {
        if self.finalized.get().is_some() {
            return Err(AggregateError::Finalized);
        }
        if self.seen.contains(&record.source_id) {
            return Err(AggregateError::DuplicateDocument(record.source_id));
        }
        if let Some(field) = record.fields.keys().find(|f| !self.table.schema.contains(f)) {
            return Err(AggregateError::UnknownField {
                source_id: record.source_id.clone(),
                field: field.clone(),
            });
        }

        for field in self.table.schema.fields() {
            record.fields.entry(field.clone()).or_insert(None);
        }

        self.seen.insert(record.source_id.clone());
        self.table.rows.push(record);
        Ok(())
    }

    /// Flag the table as the result of a cancelled run.
    pub fn mark_cancelled(&mut self) {
        self.table.cancelled = true;
    }

    /// The consolidated table. Computed on the first call; later calls return
    /// the same table.
    pub fn finalize(&self) -> &ResultTable {
        self.finalized.get_or_init(|| {
            let mut table = self.table.clone();
            if let Some(key) = &self.sort_by {
                if !table.sort_by_column(key) {
                    debug!("Ignoring unknown sort key '{}'", key);
                }
            }
            debug!("Finalized table with {} rows", table.len());
            table
        })
    }

    /// Consume the aggregator, returning the finalized table.
    pub fn into_table(self) -> ResultTable {
        self.finalize();
        let Self {
            table, finalized, ..
        } = self;
        finalized.into_inner().unwrap_or(table)
    }
}
