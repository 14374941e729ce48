//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SiftError};

/// Main configuration for a docsift run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Rule matching configuration.
    pub matching: MatchConfig,

    /// Pipeline (batch) configuration.
    pub pipeline: PipelineConfig,

    /// Document source configuration.
    pub source: SourceConfig,

    /// Result sink configuration.
    pub output: OutputConfig,
}

/// How repeated matches of one rule inside a document are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Keep the first match only.
    #[default]
    First,
    /// Keep every match, joined with [`MatchConfig::separator`].
    All,
}

/// Matcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Compile every pattern case-insensitively.
    pub case_insensitive: bool,

    /// Collapse runs of spaces/tabs and drop blank lines before matching.
    pub normalize_whitespace: bool,

    /// Characters of context kept on each side of a `contains` match.
    pub context_window: Option<usize>,

    /// Report the whole line around a `contains` match (overrides the window).
    pub whole_line: bool,

    /// First match or all matches.
    pub policy: MatchPolicy,

    /// Separator used when [`MatchPolicy::All`] joins several matches.
    pub separator: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            normalize_whitespace: true,
            context_window: None,
            whole_line: false,
            policy: MatchPolicy::First,
            separator: "|".to_string(),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of worker threads (1 = sequential).
    pub workers: usize,

    /// Column to sort the final table by (`source_id` or a target field).
    pub sort_by: Option<String>,

    /// Documents with more pages than this are reported, not matched.
    pub max_pages: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            sort_by: None,
            max_pages: Some(200),
        }
    }
}

/// Document source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// File extensions accepted as documents (lowercase, no dot).
    pub extensions: Vec<String>,

    /// Use the file name rather than the full path as the source id.
    pub file_name_as_id: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["pdf".to_string(), "txt".to_string()],
            file_name_as_id: false,
        }
    }
}

/// Result sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Include the `missing_required` and `processing_error` columns.
    pub include_diagnostics: bool,

    /// Separator for the rule ids listed in `missing_required`.
    pub list_separator: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_diagnostics: true,
            list_separator: ";".to_string(),
        }
    }
}

impl SiftConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            return Err(SiftError::Config("pipeline.workers must be at least 1".to_string()));
        }
        if self.pipeline.max_pages == Some(0) {
            return Err(SiftError::Config("pipeline.max_pages must be positive".to_string()));
        }
        if self.matching.policy == MatchPolicy::All && self.matching.separator.is_empty() {
            return Err(SiftError::Config("matching.separator must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SiftConfig =
            serde_json::from_str(r#"{ "pipeline": { "workers": 2 } }"#).unwrap();

        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(config.pipeline.max_pages, Some(200));
        assert!(config.matching.case_insensitive);
        assert_eq!(config.matching.policy, MatchPolicy::First);
    }

    #[test]
    fn test_policy_snake_case() {
        let config: MatchConfig = serde_json::from_str(r#"{ "policy": "all" }"#).unwrap();
        assert_eq!(config.policy, MatchPolicy::All);
        assert_eq!(config.separator, "|");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = SiftConfig::default();
        config.pipeline.sort_by = Some("invoice_id".to_string());
        config.save(&path).unwrap();

        let loaded = SiftConfig::from_file(&path).unwrap();
        assert_eq!(loaded.pipeline.sort_by.as_deref(), Some("invoice_id"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = SiftConfig::default();
        config.pipeline.workers = 0;
        assert!(matches!(config.validate(), Err(SiftError::Config(_))));
    }
}
