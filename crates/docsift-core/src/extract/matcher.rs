//! Applies a single rule to a single document's text.

use std::borrow::Cow;

use regex::{Captures, Match};

use crate::models::config::{MatchConfig, MatchPolicy};
use crate::models::document::Document;
use crate::models::record::MatchResult;
use crate::models::rule::{CompiledPattern, Rule, RuleMode};
use crate::rules::patterns::normalize_text;

/// Rule matcher. Pure: the same rule and text always give the same result.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatchConfig,
}

impl Matcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Prepare document text for matching according to the configuration.
    pub fn prepare<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.config.normalize_whitespace {
            Cow::Owned(normalize_text(text))
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Match a rule against a document.
    pub fn match_rule(&self, rule: &Rule, document: &Document) -> MatchResult {
        let text = self.prepare(&document.text);
        self.match_text(rule, &text)
    }

    /// Match a rule against text that was already passed through [`Matcher::prepare`].
    pub fn match_text(&self, rule: &Rule, text: &str) -> MatchResult {
        let values: Vec<String> = match &rule.compiled {
            CompiledPattern::Line(index) => text
                .lines()
                .nth(*index)
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .into_iter()
                .collect(),
            CompiledPattern::Regex(re) => {
                let matches = re
                    .captures_iter(text)
                    .filter_map(|caps| {
                        let whole = caps.get(0)?;
                        Some(self.value_of(rule.mode, &caps, whole, text))
                    })
                    .filter(|value| !value.is_empty());

                match self.config.policy {
                    MatchPolicy::First => matches.take(1).collect(),
                    MatchPolicy::All => matches.collect(),
                }
            }
        };

        if values.is_empty() {
            MatchResult::not_found(&rule.id)
        } else {
            MatchResult::found(&rule.id, values.join(&self.config.separator))
        }
    }

    fn value_of(&self, mode: RuleMode, caps: &Captures<'_>, whole: Match<'_>, text: &str) -> String {
        let value = match mode {
            RuleMode::Regex => caps.get(1).unwrap_or(whole).as_str(),
            RuleMode::Contains if self.config.whole_line => {
                let (start, end) = line_bounds(text, whole.start(), whole.end());
                &text[start..end]
            }
            RuleMode::Contains => match self.config.context_window {
                Some(window) => {
                    let (start, end) = context_bounds(text, whole.start(), whole.end(), window);
                    &text[start..end]
                }
                None => whole.as_str(),
            },
            RuleMode::Exact | RuleMode::Line => whole.as_str(),
        };

        value.trim().to_string()
    }
}

/// Byte range of the line enclosing `start..end`.
fn line_bounds(text: &str, start: usize, end: usize) -> (usize, usize) {
    let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[end..].find('\n').map(|i| end + i).unwrap_or(text.len());
    (line_start, line_end)
}

/// Byte range of `start..end` widened by up to `window` characters on each
/// side, never crossing the enclosing line.
fn context_bounds(text: &str, start: usize, end: usize, window: usize) -> (usize, usize) {
    let (line_start, line_end) = line_bounds(text, start, end);

    let before = &text[line_start..start];
    let skip = before.chars().count().saturating_sub(window);
    let context_start = line_start
        + before
            .char_indices()
            .nth(skip)
            .map(|(i, _)| i)
            .unwrap_or(before.len());

    let after = &text[end..line_end];
    let context_end = end
        + after
            .char_indices()
            .nth(window)
            .map(|(i, _)| i)
            .unwrap_or(after.len());

    (context_start, context_end)
}
