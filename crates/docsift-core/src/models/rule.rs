//! Extraction rule models.

use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a rule's pattern is applied to document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
    /// A whole line must equal the pattern.
    Exact,
    /// The pattern occurs anywhere in the text.
    Contains,
    /// The pattern is a regular expression.
    Regex,
    /// The pattern is a 1-based line number.
    Line,
}

impl FromStr for RuleMode {
    type Err = String;

    /// Parse a mode name as written in a rule table. Empty means `contains`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "contains" | "" => Ok(Self::Contains),
            "regex" | "re" => Ok(Self::Regex),
            "line" => Ok(Self::Line),
            _ => Err(format!("unknown mode '{}'", s.trim())),
        }
    }
}

impl RuleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::Regex => "regex",
            Self::Line => "line",
        }
    }
}

impl std::fmt::Display for RuleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An untyped rule row as delivered by the rule source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRuleRow {
    pub id: String,
    pub pattern: String,
    #[serde(default)]
    pub mode: String,
    pub target_field: String,
    /// `true`/`yes`/`1` mark the rule as required; empty means optional.
    #[serde(default)]
    pub required: String,
    /// Document group (e.g. a vendor code) the rule belongs to; empty rules
    /// apply to every group.
    #[serde(default)]
    pub group: String,
}

impl RawRuleRow {
    pub fn new(
        id: impl Into<String>,
        pattern: impl Into<String>,
        mode: RuleMode,
        target_field: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            mode: mode.as_str().to_string(),
            target_field: target_field.into(),
            required: required.to_string(),
            group: String::new(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Whether this row is part of the rule set for `group`.
    pub fn applies_to(&self, group: &str) -> bool {
        let own = self.group.trim();
        own.is_empty() || own == group.trim()
    }
}

/// Parse the `required` column. `None` for unrecognized values.
pub fn parse_required(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "x" => Some(true),
        "false" | "no" | "n" | "0" | "" => Some(false),
        _ => None,
    }
}

/// Pattern compiled at load time.
#[derive(Debug, Clone)]
pub(crate) enum CompiledPattern {
    /// Exact, contains and regex rules all run as a regex.
    Regex(Regex),
    /// Zero-based line index.
    Line(usize),
}

/// A validated extraction rule. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique rule identifier.
    pub id: String,
    /// Pattern text as written in the rule table.
    pub pattern: String,
    /// Matching mode.
    pub mode: RuleMode,
    /// Output column populated by this rule.
    pub target_field: String,
    /// Absence of a match is flagged on the document's record.
    pub required: bool,
    pub(crate) compiled: CompiledPattern,
}

impl Rule {
    /// The compiled regex, for every mode except [`RuleMode::Line`].
    pub fn regex(&self) -> Option<&Regex> {
        match &self.compiled {
            CompiledPattern::Regex(re) => Some(re),
            CompiledPattern::Line(_) => None,
        }
    }
}
