use crate::incremental::Edit;
use crate::syntax::line_col::{LineIndex, Point};
use crate::syntax::node::TreeContext;
use crate::syntax::{GreenElement, GreenNode, SyntaxNode, TextRange, TextSize, TreeCursor};
use crate::table::ParseTable;
use std::fmt::{self, Write};
use std::sync::Arc;

/// One parse result
///
/// A tree is a value: reparsing produces a new tree that may share unchanged
/// subtrees with this one, and neither is mutated afterwards.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    root: Arc<GreenNode>,
    text_len: TextSize,
    revision: u64,
    context: Arc<TreeContext>,
    /// Edits recorded since this tree was parsed
    edits: Vec<Edit>,
}

/// Location of an error or missing element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub range: TextRange,
    pub start: Point,
    /// `true` for an inserted missing token, `false` for an error span.
    pub missing: bool,
    /// Kind name of the missing token, or `ERROR`.
    pub kind: String,
}

impl SyntaxTree {
    pub(crate) fn new(root: Arc<GreenNode>, revision: u64, table: Arc<ParseTable>, text: &[u8]) -> Self {
        Self {
            text_len: root.text_len(),
            root,
            revision,
            context: Arc::new(TreeContext::new(table, LineIndex::new(text))),
            edits: Vec::new(),
        }
    }

    /// Copy of this tree with `edit` recorded. The copy still describes the
    /// old text; the next [`Parser::reparse`](crate::parser::Parser::reparse)
    /// of it applies recorded edits before the ones it is given.
    #[must_use]
    pub fn edit(&self, edit: &Edit) -> Self {
        let mut tree = self.clone();
        tree.edits.push(*edit);
        tree
    }

    #[must_use]
    pub fn pending_edits(&self) -> &[Edit] {
        &self.edits
    }

    #[must_use]
    pub const fn root(&self) -> &Arc<GreenNode> {
        &self.root
    }

    #[must_use]
    pub fn root_node(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.root.clone(), self.context.clone())
    }

    #[must_use]
    pub const fn text_len(&self) -> TextSize {
        self.text_len
    }

    /// Incremented by every reparse that produced this tree.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn table(&self) -> &Arc<ParseTable> {
        self.context.table()
    }

    #[must_use]
    pub fn line_index(&self) -> &LineIndex {
        self.context.lines()
    }

    #[must_use]
    pub fn walk(&self) -> TreeCursor {
        TreeCursor::new(self.root.clone(), self.context.clone())
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        GreenElement::Node(self.root.clone()).is_erroneous()
    }

    /// Error and missing elements in document order. Error nodes are reported
    /// once; their contents are not searched.
    #[must_use]
    pub fn errors(&self) -> Vec<SyntaxError> {
        let mut errors = Vec::new();
        let mut cursor = self.walk();
        loop {
            let node = cursor.node();
            let flagged = node.is_error() || node.is_missing();
            if flagged {
                errors.push(SyntaxError {
                    range: node.byte_range(),
                    start: node.start_point(),
                    missing: node.is_missing(),
                    kind: node.kind_name().to_owned(),
                });
            }
            if !flagged && node.has_error() && cursor.goto_first_child() {
                continue;
            }
            while !cursor.goto_next_sibling() {
                if !cursor.goto_parent() {
                    return errors;
                }
            }
        }
    }

    /// S-expression of the named structure, fields prefixed with `name:`.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        write_sexp(&self.root_node(), &mut out);
        out
    }
}

/// Structural equality of the root; revisions and sharing are ignored.
impl PartialEq for SyntaxTree {
    fn eq(&self, other: &Self) -> bool {
        self.text_len == other.text_len && self.root == other.root
    }
}

impl Eq for SyntaxTree {}

impl fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sexp())
    }
}

fn write_sexp(node: &SyntaxNode, out: &mut String) {
    let table = node.context().table().clone();
    if node.is_missing() {
        let name = table.symbol_name(node.kind());
        if node.is_named() {
            let _ = write!(out, "(MISSING {name})");
        } else {
            let _ = write!(out, "(MISSING {name:?})");
        }
        return;
    }
    if node.is_error() && node.is_token() {
        let _ = write!(out, "(ERROR {:?})", node.token_text().unwrap_or_default());
        return;
    }
    out.push('(');
    out.push_str(if node.is_error() { "ERROR" } else { node.kind_name() });
    for child in node.children() {
        if !(child.is_named() || child.is_missing() || child.is_error()) {
            continue;
        }
        out.push(' ');
        if let Some(field) = child.field_name() {
            out.push_str(field);
            out.push_str(": ");
        }
        write_sexp(&child, out);
    }
    out.push(')');
}
