// Text Processing Service
// Whitespace normalization and character-level helpers for extracted text

use regex::Regex;
use std::sync::OnceLock;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Collapse every run of whitespace (including line breaks and form feeds
/// emitted by PDF extraction) into a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    whitespace_re().replace_all(text, " ").trim().to_string()
}

/// Length in Unicode scalar values, the unit segments are measured in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Single-line preview for logs and CLI output.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Договор \n\n №1\t от\r\n 2024  "), "Договор №1 от 2024");
        assert_eq!(normalize_whitespace("\u{000C}a\u{00A0}b"), "a b");
        assert_eq!(normalize_whitespace(" \n\t "), "");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn test_char_len_counts_scalars_not_bytes() {
        assert_eq!(char_len("закон"), 5);
        assert_eq!("закон".len(), 10);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("abc", 5), "abc");
        assert_eq!(preview("решение суда", 7), "решение...");
        assert_eq!(preview("a\nb", 5), "a b");
    }
}
