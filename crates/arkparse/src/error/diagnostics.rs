//! # Diagnostic Utilities
//!
//! Helpers for grammar error messages: "did you mean" suggestions for
//! misspelled rule names, and `file:line:col` prefixes for the CLI.

use crate::syntax::{LineIndex, TextRange};
use std::fmt::Write;

/// Suggest the closest name to `actual` among `candidates`.
///
/// # Example
///
/// ```rust
/// use arkparse::error::diagnostics::did_you_mean;
///
/// let names = vec!["expression".to_string(), "statement".to_string()];
/// assert_eq!(did_you_mean("expresion", &names), Some("expression".to_string()));
/// ```
#[must_use]
pub fn did_you_mean(actual: &str, candidates: &[String]) -> Option<String> {
    let actual_lower = actual.to_lowercase();
    let mut best: Option<(&String, f64)> = None;

    for candidate in candidates {
        let similarity = string_similarity(&actual_lower, &candidate.to_lowercase());
        if similarity < 0.6 {
            continue;
        }
        match best {
            Some((_, best_sim)) if similarity <= best_sim => {}
            _ => best = Some((candidate, similarity)),
        }
    }

    best.map(|(suggestion, _)| suggestion.clone())
}

/// Render a list of expected names as `a`, `a or b`, or `a, b, or c`.
#[must_use]
pub fn format_expected_list(expected: &[String]) -> String {
    match expected {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} or {b}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}

/// Prefix `message` with the one-based `line:col` of `span` in `source`.
#[must_use]
pub fn format_with_location(
    message: &str,
    span: TextRange,
    source: &str,
    filename: Option<&str>,
) -> String {
    let index = LineIndex::new(source.as_bytes());
    let point = index.point(span.start());
    let mut result = String::new();
    if let Some(filename) = filename {
        let _ = write!(result, "{filename}:");
    }
    let _ = write!(result, "{point}: {message}");
    result
}

/// Similarity in `0.0..=1.0` derived from Levenshtein distance.
fn string_similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }
    let distance = levenshtein_distance(s1, s2);
    let max_len = s1.chars().count().max(s2.chars().count());
    1.0 - (distance as f64 / max_len as f64)
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s2_chars: Vec<char> = s2.chars().collect();
    let mut previous: Vec<usize> = (0..=s2_chars.len()).collect();
    let mut current = vec![0; s2_chars.len() + 1];

    for (i, c1) in s1.chars().enumerate() {
        current[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != *c2);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[s2_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::TextSize;

    #[test]
    fn test_did_you_mean() {
        let expected = vec!["identifier".to_string(), "number".to_string()];
        assert_eq!(did_you_mean("identifer", &expected), Some("identifier".to_string()));
        assert_eq!(did_you_mean("zzz", &expected), None);
    }

    #[test]
    fn test_string_similarity() {
        assert!((string_similarity("hello", "hello") - 1.0).abs() < f64::EPSILON);
        assert!(string_similarity("hello", "hell") > 0.5);
        assert!(string_similarity("hello", "world") < 0.5);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
    }

    #[test]
    fn test_format_expected_list() {
        let names = |xs: &[&str]| xs.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        assert_eq!(format_expected_list(&names(&["a"])), "a");
        assert_eq!(format_expected_list(&names(&["a", "b"])), "a or b");
        assert_eq!(format_expected_list(&names(&["a", "b", "c"])), "a, b, or c");
    }

    #[test]
    fn test_format_with_location() {
        let source = "a = b;\nc = ;\n";
        let span = TextRange::new(TextSize::from(11), TextSize::from(12));
        assert_eq!(
            format_with_location("expected expression", span, source, Some("g.grammar")),
            "g.grammar:2:5: expected expression"
        );
    }
}
