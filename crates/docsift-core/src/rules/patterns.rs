//! Fixed patterns used to prepare document text for matching.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Runs of horizontal whitespace, including non-breaking spaces from PDF text
    pub static ref HORIZONTAL_WS: Regex = Regex::new(
        r"[ \t\u{00a0}\u{2007}\u{202f}]+"
    ).unwrap();

    // Positive 1-based line number for `line` rules, optionally written `_N`
    pub static ref LINE_NUMBER: Regex = Regex::new(
        r"^_?(\d+)$"
    ).unwrap();
}

/// Collapse horizontal whitespace, trim every line and drop blank lines.
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(|line| HORIZONTAL_WS.replace_all(line, " "))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the pattern of a `line` rule into a zero-based index.
pub fn parse_line_number(pattern: &str) -> Option<usize> {
    LINE_NUMBER
        .captures(pattern.trim())
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .map(|n| n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        let text = "  Rated   Voltage:\t 12 V  \n\n   \nPart\u{00a0}No  A-1\r\n";
        assert_eq!(normalize_text(text), "Rated Voltage: 12 V\nPart No A-1");
    }

    #[test]
    fn test_parse_line_number() {
        assert_eq!(parse_line_number("1"), Some(0));
        assert_eq!(parse_line_number("_3"), Some(2));
        assert_eq!(parse_line_number("0"), None);
        assert_eq!(parse_line_number("-2"), None);
        assert_eq!(parse_line_number("first"), None);
    }
}
