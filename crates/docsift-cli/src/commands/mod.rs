//! CLI subcommands.

pub mod compare;
pub mod config;
pub mod extract;
pub mod rules;

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use docsift_core::{rows_for_group, CancellationToken, RawRuleRow, RuleSet, SiftConfig};

use crate::io;

/// Default location of the user configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docsift")
        .join("config.json")
}

/// Load the configuration: an explicit `--config` path, else the user
/// config file if present, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<SiftConfig> {
    if let Some(path) = config_path {
        return Ok(SiftConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config from {}", default_path.display());
        Ok(SiftConfig::from_file(&default_path)?)
    } else {
        Ok(SiftConfig::default())
    }
}

/// Read and validate a rule file.
pub fn load_rules(path: &Path, config: &SiftConfig) -> anyhow::Result<RuleSet> {
    build_rules(io::read_rules(path)?, path, None, config)
}

/// Validate the rows of a rule file, restricted to `group` when given.
pub fn build_rules(
    rows: Vec<RawRuleRow>,
    path: &Path,
    group: Option<&str>,
    config: &SiftConfig,
) -> anyhow::Result<RuleSet> {
    let rows = match group {
        Some(group) => rows_for_group(&rows, group),
        None => rows,
    };
    let rules = RuleSet::load_with(rows, &config.matching)?;
    if rules.is_empty() {
        match group.filter(|g| !g.is_empty()) {
            Some(group) => anyhow::bail!("No rules for group '{}' in {}", group, path.display()),
            None => anyhow::bail!("No rules defined in {}", path.display()),
        }
    }
    Ok(rules)
}

pub fn progress_bar(len: usize, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(&format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit}"
    )) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

/// Cancel the token on Ctrl-C. In-flight documents finish; the rest are skipped.
pub fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing documents already in progress");
            token.cancel();
        }
    });
}
