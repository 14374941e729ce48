//! Extract command - run a rule file over a batch of documents.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use clap::Args;
use console::style;
use glob::glob;
use tracing::{debug, info};

use docsift_core::source::{is_supported, load_document_as, SourceIndex};
use docsift_core::{MatchPolicy, Pipeline};

use super::{build_rules, cancel_on_interrupt, load_config, progress_bar};
use crate::io::{self, OutputFormat};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input files glob pattern (e.g. "docs/**/*.pdf")
    #[arg(required = true)]
    input: String,

    /// Rule file (CSV: id,pattern,mode,target_field,required)
    #[arg(short, long)]
    rules: PathBuf,

    /// Use only the rules of this group (plus ungrouped rules)
    #[arg(short, long)]
    group: Option<String>,

    /// Output file (default: docsift_output_<date>.<format>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Number of parallel workers
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Sort rows by this column
    #[arg(long)]
    sort_by: Option<String>,

    /// Report every match of a rule instead of the first one
    #[arg(long)]
    all_matches: bool,

    /// Characters of context captured around `contains` matches
    #[arg(long)]
    context: Option<usize>,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(jobs) = args.jobs {
        config.pipeline.workers = jobs;
    }
    if args.sort_by.is_some() {
        config.pipeline.sort_by = args.sort_by.clone();
    }
    if args.all_matches {
        config.matching.policy = MatchPolicy::All;
    }
    if args.context.is_some() {
        config.matching.context_window = args.context;
    }
    config.validate()?;

    let rules = build_rules(
        io::read_rules(&args.rules)?,
        &args.rules,
        args.group.as_deref(),
        &config,
    )?;
    info!("Loaded {} rules from {}", rules.len(), args.rules.display());

    let files = expand_inputs(&args.input, &config.source)?;
    let index = SourceIndex::build(files.iter().map(PathBuf::as_path), &config.source);
    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        index.len()
    );

    let pb = progress_bar(index.len(), "files");
    let record_pb = pb.clone();
    let pipeline = Pipeline::new(rules, &config).on_record(move |_| record_pb.inc(1));
    cancel_on_interrupt(pipeline.cancellation_token());

    let source_config = config.source.clone();
    let entries = index.entries().to_vec();
    let table = tokio::task::spawn_blocking(move || {
        pipeline.run_with(entries, |(path, id): (PathBuf, String)| {
            load_document_as(&path, id, &source_config)
        })
    })
    .await??;

    pb.finish_and_clear();

    let output_path = args.output.unwrap_or_else(|| default_output_path(args.format));
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(&output_path)?);
    io::write_table(writer, &table, args.format, &config.output)?;
    debug!("Wrote output to {}", output_path.display());

    let flagged: Vec<_> = table.flagged().collect();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        table.len(),
        start.elapsed()
    );
    println!(
        "   {} complete, {} flagged",
        style(table.len() - flagged.len()).green(),
        style(flagged.len()).yellow()
    );
    println!(
        "{} Results written to {}",
        style("✓").green(),
        output_path.display()
    );

    if table.cancelled {
        println!(
            "{} Run was interrupted; the table is partial.",
            style("!").yellow()
        );
    }

    if !flagged.is_empty() {
        println!();
        println!("{}", style("Flagged documents:").yellow());
        for record in &flagged {
            match &record.processing_error {
                Some(reason) => println!("  - {}: {}", record.source_id, style(reason).red()),
                None => println!(
                    "  - {}: missing {}",
                    record.source_id,
                    record.missing_required.join(", ")
                ),
            }
        }
    }

    Ok(())
}

/// Expand a glob pattern into the supported files it names, sorted.
pub(crate) fn expand_inputs(
    pattern: &str,
    config: &docsift_core::models::config::SourceConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob(pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported(p, config))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", pattern);
    }
    Ok(files)
}

fn default_output_path(format: OutputFormat) -> PathBuf {
    Path::new(".").join(format!(
        "docsift_output_{}.{}",
        Local::now().format("%Y-%m-%d"),
        format.extension()
    ))
}
