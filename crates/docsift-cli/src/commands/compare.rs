//! Compare command - extract two revisions of each document and report
//! which fields changed.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use clap::Args;
use console::style;
use tracing::info;

use docsift_core::compare::{compare_pairs, Comparison, DocumentPair, FeatureMapping};
use docsift_core::source::{load_document_as, SourceIndex};
use docsift_core::{CancellationToken, Pipeline, ResultTable, RuleSet, SiftConfig};

use super::{build_rules, cancel_on_interrupt, load_config, progress_bar};
use crate::io::{self, PairRow};

/// Arguments for the compare command.
#[derive(Args)]
pub struct CompareArgs {
    /// Pairs file (CSV: old,latest[,group]); each group gets its own report
    #[arg(required = true)]
    pairs: PathBuf,

    /// Rule file (CSV: id,pattern,mode,target_field,required[,group])
    #[arg(short, long)]
    rules: PathBuf,

    /// Field to feature mapping (CSV: field,feature[,group])
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Output report (default: docsift_compare_<date>.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
}

pub async fn run(args: CompareArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(jobs) = args.jobs {
        config.pipeline.workers = jobs;
    }
    // Comparison rows follow the pairs file, not a sort key.
    config.pipeline.sort_by = None;
    config.validate()?;

    let rule_rows = io::read_rules(&args.rules)?;
    let mapping_rows = match &args.mapping {
        Some(path) => io::read_mapping(path)?,
        None => Vec::new(),
    };

    let pair_rows = io::read_pairs(&args.pairs)?;
    if pair_rows.is_empty() {
        anyhow::bail!("No document pairs in {}", args.pairs.display());
    }

    let base_output = args.output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "docsift_compare_{}.csv",
            Local::now().format("%Y-%m-%d")
        ))
    });

    let token = CancellationToken::new();
    cancel_on_interrupt(token.clone());

    let mut interrupted = false;
    let mut failed = Vec::new();
    let (mut total, mut changed) = (0, 0);
    for group in pair_groups(&pair_rows) {
        let rows: Vec<&PairRow> = pair_rows
            .iter()
            .filter(|r| r.group.trim() == group)
            .collect();
        let rules = build_rules(
            rule_rows.clone(),
            &args.rules,
            Some(group.as_str()),
            &config,
        )?;
        let mapping = io::mapping_for(&mapping_rows, &group);
        let output_path = group_output_path(&base_output, &group);

        let run = compare_group(&rows, rules, &mapping, &config, token.clone()).await?;
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&output_path)?);
        io::write_comparisons(writer, &run.table.schema, &run.comparisons)?;

        if !group.is_empty() {
            println!("{} Group {}", style("ℹ").blue(), style(&group).cyan());
        }
        println!(
            "{} Report written to {}",
            style("✓").green(),
            output_path.display()
        );

        total += run.comparisons.len();
        changed += run.comparisons.iter().filter(|c| c.changed()).count();
        interrupted |= run.table.cancelled;
        failed.extend(run.comparisons.into_iter().filter(|c| c.error.is_some()));
    }

    println!(
        "{} Compared {} pairs in {:?}",
        style("✓").green(),
        total,
        start.elapsed()
    );
    println!(
        "   {} changed, {} unchanged, {} failed",
        style(changed).yellow(),
        style(total - changed - failed.len()).green(),
        style(failed.len()).red()
    );

    if interrupted {
        println!(
            "{} Run was interrupted; pairs with unprocessed files are reported as failed.",
            style("!").yellow()
        );
    }

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed pairs:").red());
        for comparison in &failed {
            println!(
                "  - {} -> {}: {}",
                comparison.pair.old,
                comparison.pair.latest,
                comparison.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

struct GroupRun {
    table: ResultTable,
    comparisons: Vec<Comparison>,
}

/// Extract every distinct file of one group once, then compare its pairs.
async fn compare_group(
    rows: &[&PairRow],
    rules: RuleSet,
    mapping: &FeatureMapping,
    config: &SiftConfig,
    token: CancellationToken,
) -> anyhow::Result<GroupRun> {
    let index = SourceIndex::build(
        rows.iter()
            .flat_map(|r| [r.old.as_path(), r.latest.as_path()]),
        &config.source,
    );
    let mut pairs = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(old), Some(latest)) = (index.id_of(&row.old), index.id_of(&row.latest)) else {
            anyhow::bail!(
                "Pair {} -> {} is missing from the source index",
                row.old.display(),
                row.latest.display()
            );
        };
        pairs.push(DocumentPair::new(old, latest));
    }

    info!(
        "Comparing {} pairs over {} distinct files",
        pairs.len(),
        index.len()
    );

    let pb = progress_bar(index.len(), "files");
    let record_pb = pb.clone();
    let pipeline = Pipeline::new(rules, config)
        .with_cancellation(token)
        .on_record(move |_| record_pb.inc(1));

    let source_config = config.source.clone();
    let entries = index.entries().to_vec();
    let table = tokio::task::spawn_blocking(move || {
        pipeline.run_with(entries, |(path, id): (PathBuf, String)| {
            load_document_as(&path, id, &source_config)
        })
    })
    .await??;

    pb.finish_and_clear();

    let comparisons = compare_pairs(&table, &pairs, &config.matching.separator, mapping);
    Ok(GroupRun { table, comparisons })
}

/// Distinct pair groups in order of first appearance.
fn pair_groups(rows: &[PairRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| r.group.trim())
        .filter(|g| seen.insert(*g))
        .map(str::to_string)
        .collect()
}

/// Report path of a group: `report.csv` becomes `report_<group>.csv`.
fn group_output_path(base: &Path, group: &str) -> PathBuf {
    if group.is_empty() {
        return base.to_path_buf();
    }
    let safe: String = group
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "docsift_compare".to_string());
    let name = match base.extension() {
        Some(ext) => format!("{}_{}.{}", stem, safe, ext.to_string_lossy()),
        None => format!("{}_{}", stem, safe),
    };
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pair(old: &str, latest: &str, group: &str) -> PairRow {
        PairRow {
            old: PathBuf::from(old),
            latest: PathBuf::from(latest),
            group: group.to_string(),
        }
    }

    #[test]
    fn test_pair_groups_in_first_appearance_order() {
        let rows = vec![
            pair("a", "b", "TI"),
            pair("c", "d", ""),
            pair("e", "f", " TI "),
            pair("g", "h", "NXP"),
        ];

        assert_eq!(pair_groups(&rows), vec!["TI", "", "NXP"]);
    }

    #[test]
    fn test_group_output_path() {
        let base = Path::new("out/report.csv");

        assert_eq!(group_output_path(base, ""), PathBuf::from("out/report.csv"));
        assert_eq!(group_output_path(base, "TI"), PathBuf::from("out/report_TI.csv"));
        assert_eq!(
            group_output_path(base, "Maxim/ADI"),
            PathBuf::from("out/report_Maxim_ADI.csv")
        );
        assert_eq!(
            group_output_path(Path::new("report"), "TI"),
            PathBuf::from("report_TI")
        );
    }
}
