//! Property-based tests over generated ArkTS-like input
//!
//! The fragments mix valid syntax with stray delimiters, unterminated
//! templates and comments, so most generated documents need recovery.

use arkparse::testing::{assert_incremental_equivalent, check_span_coverage};
use arkparse::{Parser, arkts};
use proptest::prelude::*;

const FRAGMENTS: &[&str] = &[
    "let ", "const ", "x", "foo", " = ", "1", "2.5", "'s'", ";", "\n", " ", "+", "*", "(", ")", "{", "}", "[", "]",
    ",", ".", "`", "${", "if ", "else ", "return ", "function ", "struct ", "@Component\n", "build() ", "=> ",
    "// note\n", "/* c */", "/*", "$r", "this", "?", ":", "!", "++",
];

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..40).prop_map(|parts| parts.concat())
}

fn edited_document() -> impl Strategy<Value = (String, usize, usize, String)> {
    (document(), any::<usize>(), any::<usize>(), document()).prop_map(|(text, a, b, replacement)| {
        let len = text.len() + 1;
        let (start, end) = {
            let (a, b) = (a % len, b % len);
            (a.min(b), a.max(b))
        };
        let replacement = replacement.chars().take(8).collect();
        (text, start, end, replacement)
    })
}

fn parser() -> Parser {
    Parser::new(arkts::language().clone())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_parse_is_total_and_covers_input(text in document()) {
        let tree = parser().parse(&text).unwrap();
        prop_assert_eq!(tree.text_len().to_usize(), text.len());
        if let Err(violation) = check_span_coverage(&tree, text.as_bytes()) {
            return Err(TestCaseError::fail(violation.to_string()));
        }
    }

    #[test]
    fn prop_parse_is_deterministic(text in document()) {
        let parser = parser();
        let first = parser.parse(&text).unwrap();
        let second = parser.parse(&text).unwrap();
        prop_assert_eq!(first.to_sexp(), second.to_sexp());
        prop_assert!(first == second);
        prop_assert_eq!(first.errors(), second.errors());
    }

    #[test]
    fn prop_reparse_matches_fresh_parse((text, start, end, replacement) in edited_document()) {
        assert_incremental_equivalent(&parser(), &text, start..end, &replacement);
    }

    #[test]
    fn prop_arbitrary_bytes_parse(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let tree = parser().parse_bytes(&bytes).unwrap();
        prop_assert_eq!(tree.text_len().to_usize(), bytes.len());
    }
}
