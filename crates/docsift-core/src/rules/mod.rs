//! Rule set loading and validation.
//!
//! Every pattern is compiled here, once, so a bad pattern fails the load
//! instead of silently matching nothing in every document.

pub mod patterns;

use std::collections::HashSet;

use regex::RegexBuilder;
use tracing::debug;

use crate::error::RuleError;
use crate::models::config::MatchConfig;
use crate::models::record::{
    Schema, MISSING_REQUIRED_COLUMN, PROCESSING_ERROR_COLUMN, SOURCE_ID_COLUMN,
};
use crate::models::rule::{parse_required, CompiledPattern, RawRuleRow, Rule, RuleMode};

/// Result type for rule loading.
pub type Result<T> = std::result::Result<T, RuleError>;

/// The active, validated rule set of a run.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    case_insensitive: bool,
}

impl RuleSet {
    /// Validate and compile raw rule rows with default matching options.
    pub fn load<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = RawRuleRow>,
    {
        Self::load_with(rows, &MatchConfig::default())
    }

    /// Validate and compile raw rule rows.
    ///
    /// Rows are numbered from 1 in error messages.
    pub fn load_with<I>(rows: I, config: &MatchConfig) -> Result<Self>
    where
        I: IntoIterator<Item = RawRuleRow>,
    {
        let mut rules = Vec::new();
        let mut ids = HashSet::new();
        let mut fields = HashSet::new();

        for (index, raw) in rows.into_iter().enumerate() {
            let row = index + 1;
            let rule = parse_row(row, raw, config.case_insensitive)?;

            if !ids.insert(rule.id.clone()) {
                return Err(invalid(row, format!("duplicate rule id '{}'", rule.id)));
            }
            if !fields.insert(rule.target_field.clone()) {
                return Err(invalid(
                    row,
                    format!("duplicate target field '{}'", rule.target_field),
                ));
            }

            rules.push(rule);
        }

        debug!("Loaded {} rules", rules.len());

        Ok(Self {
            rules,
            case_insensitive: config.case_insensitive,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Whether patterns were compiled case-insensitively.
    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Target fields in declaration order.
    pub fn target_fields(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.target_field.as_str())
    }

    /// Result table schema derived from this rule set.
    pub fn schema(&self) -> Schema {
        Schema::new(self.target_fields())
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Distinct non-empty groups named by rule rows, in first-appearance order.
pub fn rule_groups(rows: &[RawRuleRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| r.group.trim())
        .filter(|g| !g.is_empty() && seen.insert(*g))
        .map(str::to_string)
        .collect()
}

/// Rows making up the rule set of `group`: its own rows plus ungrouped ones.
pub fn rows_for_group(rows: &[RawRuleRow], group: &str) -> Vec<RawRuleRow> {
    rows.iter().filter(|r| r.applies_to(group)).cloned().collect()
}

fn invalid(row: usize, reason: impl Into<String>) -> RuleError {
    RuleError::InvalidRule {
        row,
        reason: reason.into(),
    }
}

fn parse_row(row: usize, raw: RawRuleRow, case_insensitive: bool) -> Result<Rule> {
    let id = raw.id.trim().to_string();
    let pattern = raw.pattern.trim().to_string();
    let target_field = raw.target_field.trim().to_string();

    if id.is_empty() {
        return Err(invalid(row, "empty rule id"));
    }
    if pattern.is_empty() {
        return Err(invalid(row, format!("rule '{}' has an empty pattern", id)));
    }
    if target_field.is_empty() {
        return Err(invalid(row, format!("rule '{}' has an empty target field", id)));
    }
    if [SOURCE_ID_COLUMN, MISSING_REQUIRED_COLUMN, PROCESSING_ERROR_COLUMN]
        .contains(&target_field.as_str())
    {
        return Err(invalid(
            row,
            format!("target field '{}' is a reserved column", target_field),
        ));
    }

    let mode: RuleMode = raw.mode.parse().map_err(|reason: String| invalid(row, reason))?;
    let required = parse_required(&raw.required).ok_or_else(|| {
        invalid(row, format!("unrecognized required flag '{}'", raw.required.trim()))
    })?;

    let compiled = compile(&id, &pattern, mode, case_insensitive)?;

    Ok(Rule {
        id,
        pattern,
        mode,
        target_field,
        required,
        compiled,
    })
}

fn compile(id: &str, pattern: &str, mode: RuleMode, case_insensitive: bool) -> Result<CompiledPattern> {
    let source = match mode {
        RuleMode::Line => {
            return patterns::parse_line_number(pattern)
                .map(CompiledPattern::Line)
                .ok_or_else(|| RuleError::PatternCompile {
                    rule_id: id.to_string(),
                    reason: format!("'{}' is not a positive line number", pattern),
                });
        }
        RuleMode::Exact => format!(r"^[ \t]*{}[ \t]*$", regex::escape(pattern)),
        RuleMode::Contains => regex::escape(pattern),
        RuleMode::Regex => pattern.to_string(),
    };

    RegexBuilder::new(&source)
        .case_insensitive(case_insensitive)
        .multi_line(true)
        .crlf(true)
        .build()
        .map(CompiledPattern::Regex)
        .map_err(|e| RuleError::PatternCompile {
            rule_id: id.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, pattern: &str, mode: RuleMode, field: &str) -> RawRuleRow {
        RawRuleRow::new(id, pattern, mode, field, false)
    }

    #[test]
    fn test_load_valid_rules() {
        let rows = vec![
            row("r1", "voltage", RuleMode::Contains, "voltage"),
            row("r2", "#([A-Z0-9]+)", RuleMode::Regex, "invoice_id"),
            row("r3", "Specifications", RuleMode::Exact, "heading"),
            row("r4", "_2", RuleMode::Line, "second_line"),
        ];

        let rules = RuleSet::load(rows).unwrap();

        assert_eq!(rules.len(), 4);
        assert_eq!(
            rules.target_fields().collect::<Vec<_>>(),
            vec!["voltage", "invoice_id", "heading", "second_line"]
        );
        assert!(rules.get("r2").unwrap().regex().is_some());
        assert!(rules.get("r4").unwrap().regex().is_none());
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let err = RuleSet::load(vec![row("r1", "   ", RuleMode::Contains, "f")]).unwrap_err();
        assert!(matches!(err, RuleError::InvalidRule { row: 1, .. }));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let rows = vec![
            row("r1", "a", RuleMode::Contains, "f1"),
            row("r1", "b", RuleMode::Contains, "f2"),
        ];
        let err = RuleSet::load(rows).unwrap_err();
        assert!(matches!(err, RuleError::InvalidRule { row: 2, .. }));
    }

    #[test]
    fn test_duplicate_target_field_rejected() {
        let rows = vec![
            row("r1", "a", RuleMode::Contains, "f"),
            row("r2", "b", RuleMode::Contains, " f "),
        ];
        let err = RuleSet::load(rows).unwrap_err();
        assert!(err.to_string().contains("duplicate target field 'f'"));
    }

    #[test]
    fn test_bad_regex_fails_at_load() {
        let err = RuleSet::load(vec![row("r1", "([unclosed", RuleMode::Regex, "f")]).unwrap_err();
        assert!(matches!(err, RuleError::PatternCompile { ref rule_id, .. } if rule_id == "r1"));
    }

    #[test]
    fn test_regex_metacharacters_literal_in_contains() {
        let rules = RuleSet::load(vec![row("r1", "([unclosed", RuleMode::Contains, "f")]).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_bad_line_number() {
        let err = RuleSet::load(vec![row("r1", "0", RuleMode::Line, "f")]).unwrap_err();
        assert!(matches!(err, RuleError::PatternCompile { .. }));
    }

    #[test]
    fn test_unknown_mode_and_required() {
        let mut raw = row("r1", "a", RuleMode::Contains, "f");
        raw.mode = "fuzzy".to_string();
        assert!(matches!(
            RuleSet::load(vec![raw]).unwrap_err(),
            RuleError::InvalidRule { .. }
        ));

        let mut raw = row("r1", "a", RuleMode::Contains, "f");
        raw.required = "sometimes".to_string();
        assert!(matches!(
            RuleSet::load(vec![raw]).unwrap_err(),
            RuleError::InvalidRule { .. }
        ));
    }

    #[test]
    fn test_reserved_field_rejected() {
        let err = RuleSet::load(vec![row("r1", "a", RuleMode::Contains, "source_id")]).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_group_selection() {
        let rows = vec![
            row("id", "#([A-Z0-9]+)", RuleMode::Regex, "invoice_id"),
            row("volt", "voltage", RuleMode::Contains, "voltage").with_group("TI"),
            row("pkg", "package", RuleMode::Contains, "package").with_group("NXP"),
            row("temp", "temperature", RuleMode::Contains, "temperature").with_group("TI"),
        ];

        assert_eq!(rule_groups(&rows), vec!["TI", "NXP"]);

        let ti = RuleSet::load(rows_for_group(&rows, "TI")).unwrap();
        assert_eq!(
            ti.target_fields().collect::<Vec<_>>(),
            vec!["invoice_id", "voltage", "temperature"]
        );
        assert_eq!(rows_for_group(&rows, "").len(), 1);
    }

    #[test]
    fn test_same_target_in_two_groups() {
        let rows = vec![
            row("ti_volt", "voltage", RuleMode::Contains, "voltage").with_group("TI"),
            row("nxp_volt", "supply", RuleMode::Contains, "voltage").with_group("NXP"),
        ];

        assert!(RuleSet::load(rows.clone()).is_err());
        assert!(RuleSet::load(rows_for_group(&rows, "TI")).is_ok());
        assert!(RuleSet::load(rows_for_group(&rows, "NXP")).is_ok());
    }
}
