//! CSV and JSON glue between files on disk and the core engine.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use docsift_core::compare::{Comparison, FeatureMapping};
use docsift_core::models::config::OutputConfig;
use docsift_core::{RawRuleRow, ResultTable, Schema};

/// Output format for result tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// CSV output
    Csv,
    /// JSON output
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

fn reader(path: &Path) -> anyhow::Result<csv::Reader<File>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Cannot open {}", path.display()))
}

/// Read rule rows (`id,pattern,mode,target_field,required`).
pub fn read_rules(path: &Path) -> anyhow::Result<Vec<RawRuleRow>> {
    let mut rdr = reader(path)?;
    let mut rows = Vec::new();
    for (index, row) in rdr.deserialize::<RawRuleRow>().enumerate() {
        rows.push(row.with_context(|| format!("{}: bad rule row {}", path.display(), index + 1))?);
    }
    Ok(rows)
}

/// One `field,feature[,group]` row of a feature mapping file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MappingRow {
    pub field: String,
    pub feature: String,
    #[serde(default)]
    pub group: String,
}

/// Read feature mapping rows (`field,feature[,group]`).
pub fn read_mapping(path: &Path) -> anyhow::Result<Vec<MappingRow>> {
    let mut rdr = reader(path)?;
    let mut rows = Vec::new();
    for row in rdr.deserialize::<MappingRow>() {
        rows.push(row.with_context(|| format!("{}: bad mapping row", path.display()))?);
    }
    Ok(rows)
}

/// Feature mapping of one group. Rows of the group win over ungrouped rows.
pub fn mapping_for(rows: &[MappingRow], group: &str) -> FeatureMapping {
    let group = group.trim();
    let own = rows
        .iter()
        .filter(|r| !group.is_empty() && r.group.trim() == group);
    let shared = rows.iter().filter(|r| r.group.trim().is_empty());
    FeatureMapping::new(own.chain(shared).map(|r| (&r.field, &r.feature)))
}

/// One `old,latest[,group]` row of a pairs file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PairRow {
    pub old: PathBuf,
    pub latest: PathBuf,
    #[serde(default)]
    pub group: String,
}

/// Read document pairs (`old,latest[,group]`).
pub fn read_pairs(path: &Path) -> anyhow::Result<Vec<PairRow>> {
    let mut rdr = reader(path)?;
    let mut pairs = Vec::new();
    for row in rdr.deserialize::<PairRow>() {
        pairs.push(row.with_context(|| format!("{}: bad pair row", path.display()))?);
    }
    Ok(pairs)
}

/// Write a result table.
pub fn write_table<W: Write>(
    writer: W,
    table: &ResultTable,
    format: OutputFormat,
    config: &OutputConfig,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(writer);
            wtr.write_record(table.schema.columns(config.include_diagnostics))?;
            for row in &table.rows {
                wtr.write_record(table.schema.cells(
                    row,
                    config.include_diagnostics,
                    &config.list_separator,
                ))?;
            }
            wtr.flush()?;
        }
        OutputFormat::Json if config.include_diagnostics => {
            serde_json::to_writer_pretty(writer, table)?;
        }
        OutputFormat::Json => {
            let mut table = table.clone();
            for row in &mut table.rows {
                row.missing_required.clear();
                row.processing_error = None;
            }
            serde_json::to_writer_pretty(writer, &table)?;
        }
    }
    Ok(())
}

/// Write a comparison report as CSV.
pub fn write_comparisons<W: Write>(
    writer: W,
    schema: &Schema,
    comparisons: &[Comparison],
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(Comparison::columns(schema))?;
    for comparison in comparisons {
        wtr.write_record(comparison.cells(schema))?;
    }
    wtr.flush()?;
    Ok(())
}
