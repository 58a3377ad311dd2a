//! # Testing Utilities
//!
//! Checks for the structural properties every parse result must have,
//! meant for use in tests and fuzz targets:
//!
//! - [`check_span_coverage`]: children tile their parent, and the tokens
//!   spell out the source exactly.
//! - [`assert_incremental_equivalent`]: reparsing after an edit gives the
//!   same tree as parsing the edited text from scratch.

use crate::incremental::Edit;
use crate::parser::Parser;
use crate::syntax::{SyntaxNode, SyntaxTree, TextSize};
use std::fmt;
use std::ops::Range;

/// First place where a tree does not cover its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanViolation {
    pub kind: String,
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for SpanViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}: {}", self.kind, self.offset, self.message)
    }
}

impl std::error::Error for SpanViolation {}

/// Verify that the root spans `text`, that every node's children are
/// contiguous and exactly fill it, and that the token texts concatenate to
/// `text`.
///
/// # Errors
///
/// The first violation found, in document order.
pub fn check_span_coverage(tree: &SyntaxTree, text: &[u8]) -> Result<(), SpanViolation> {
    let root = tree.root_node();
    let range = root.byte_range();
    if range.start() != TextSize::zero() || range.end().to_usize() != text.len() {
        return Err(violation(
            &root,
            0,
            format!("root spans {range:?} but the text has {} bytes", text.len()),
        ));
    }

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let range = node.byte_range();
        if node.is_token() {
            let start = range.start().to_usize();
            let expected = &text[start..range.end().to_usize()];
            let actual = node.token_text().unwrap_or_default().as_bytes();
            if actual != expected && !(actual.is_empty() && node.is_missing()) {
                return Err(violation(
                    &node,
                    start,
                    format!("token text {actual:?} differs from source {expected:?}"),
                ));
            }
            continue;
        }

        let mut offset = range.start();
        let mut children = Vec::with_capacity(node.child_count());
        for child in node.children() {
            let child_range = child.byte_range();
            if child_range.start() != offset {
                return Err(violation(
                    &child,
                    child_range.start().to_usize(),
                    format!("child starts at {:?}, expected {offset:?}", child_range.start()),
                ));
            }
            offset = child_range.end();
            children.push(child);
        }
        if offset != range.end() {
            return Err(violation(
                &node,
                offset.to_usize(),
                format!("children end at {offset:?} but the node ends at {:?}", range.end()),
            ));
        }
        stack.extend(children.into_iter().rev());
    }
    Ok(())
}

fn violation(node: &SyntaxNode, offset: usize, message: String) -> SpanViolation {
    SpanViolation {
        kind: node.kind_name().to_owned(),
        offset,
        message,
    }
}

/// Parse `old_text`, replace `range` with `replacement`, and assert that the
/// incremental reparse equals a fresh parse of the result. Returns the
/// reparsed tree.
///
/// # Panics
///
/// If either parse is cancelled, if the trees differ, or if the reparsed
/// tree fails [`check_span_coverage`].
pub fn assert_incremental_equivalent(
    parser: &Parser,
    old_text: &str,
    range: Range<usize>,
    replacement: &str,
) -> SyntaxTree {
    let old = parser.parse(old_text).unwrap_or_else(|err| panic!("initial parse: {err}"));
    let mut new_text = old_text.to_owned();
    let edit = Edit::apply(&mut new_text, range, replacement);

    let reparsed = parser
        .reparse(&old, &[edit], &new_text)
        .unwrap_or_else(|err| panic!("reparse: {err}"));
    let fresh = parser.parse(&new_text).unwrap_or_else(|err| panic!("fresh parse: {err}"));
    assert_eq!(
        reparsed.to_sexp(),
        fresh.to_sexp(),
        "incremental reparse of {new_text:?} differs from a fresh parse"
    );
    assert!(
        reparsed == fresh,
        "incremental reparse of {new_text:?} differs from a fresh parse in token details"
    );
    if let Err(violation) = check_span_coverage(&reparsed, new_text.as_bytes()) {
        panic!("reparse of {new_text:?}: {violation}");
    }
    reparsed
}
