//! # Incremental Reparsing
//!
//! Reparsing after an edit reuses the parts of the previous tree the edit
//! could not have affected.
//!
//! ## Overview
//!
//! The caller describes each change as an [`Edit`] (byte offsets plus the
//! matching row/column points) and hands the previous tree, the edits and the
//! new text to [`Parser::reparse`](crate::parser::Parser::reparse). The edits
//! are folded into one old-to-new offset mapping, and every old token whose
//! bytes or lexing lookahead overlap a changed range is marked damaged.
//!
//! While parsing the new text the parser then:
//!
//! - takes an undamaged old token instead of lexing, when the lexer would be
//!   run in the same mode and scanner state the token was originally lexed in;
//! - pushes a whole undamaged old subtree instead of parsing it, when the
//!   parse state matches the one the subtree was started in and the token
//!   that ended it is intact.
//!
//! Reuse never changes the result: a reparse is structurally equal to a
//! fresh parse of the new text. It only lets the new tree share `Arc`s with
//! the old one.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use arkparse::arkts;
//! use arkparse::incremental::Edit;
//! use arkparse::parser::Parser;
//!
//! let parser = Parser::new(arkts::language().clone());
//! let mut text = String::from("let x = 1;");
//! let tree = parser.parse(&text).unwrap();
//!
//! let edit = Edit::apply(&mut text, 8..9, "42");
//! let tree = parser.reparse(&tree, &[edit], &text).unwrap();
//! assert_eq!(tree, parser.parse(&text).unwrap());
//! ```

mod edit;
mod reuse;

pub use edit::Edit;
pub(crate) use edit::EditMap;
pub(crate) use reuse::ReuseIndex;

use crate::syntax::SyntaxTree;

impl Edit {
    /// Record this edit on `tree`; see [`SyntaxTree::edit`].
    #[must_use]
    pub fn apply_to_tree(&self, tree: &SyntaxTree) -> SyntaxTree {
        tree.edit(self)
    }
}
