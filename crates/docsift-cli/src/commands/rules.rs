//! Rules command - validate rule files before a run.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use docsift_core::{rule_groups, RuleSet};

use super::{build_rules, load_config, load_rules};
use crate::io;

/// Arguments for the rules command.
#[derive(Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    command: RulesCommand,
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Validate a rule file and list its rules
    Check {
        /// Rule file (CSV: id,pattern,mode,target_field,required[,group])
        path: PathBuf,
    },
}

pub async fn run(args: RulesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        RulesCommand::Check { path } => check_rules(&path, config_path),
    }
}

fn check_rules(path: &Path, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let rows = io::read_rules(path)?;
    let groups = rule_groups(&rows);
    if groups.is_empty() {
        return list_rules(&load_rules(path, &config)?, None);
    }

    // Targets may repeat across groups, so each group is validated on its own.
    for group in &groups {
        let rules = build_rules(rows.clone(), path, Some(group.as_str()), &config)?;
        list_rules(&rules, Some(group.as_str()))?;
        println!();
    }

    Ok(())
}

fn list_rules(rules: &RuleSet, group: Option<&str>) -> anyhow::Result<()> {
    let label = match group {
        Some(group) => format!("group {}: ", style(group).cyan()),
        None => String::new(),
    };
    println!(
        "{} {}{} rules OK ({})",
        style("✓").green(),
        label,
        rules.len(),
        if rules.case_insensitive() {
            "case-insensitive"
        } else {
            "case-sensitive"
        }
    );
    println!();
    println!(
        "  {:<16} {:<9} {:<20} {}",
        style("ID").bold(),
        style("MODE").bold(),
        style("FIELD").bold(),
        style("REQUIRED").bold()
    );
    for rule in rules {
        println!(
            "  {:<16} {:<9} {:<20} {}",
            rule.id,
            rule.mode.as_str(),
            rule.target_field,
            if rule.required { "yes" } else { "" }
        );
    }

    Ok(())
}
