//! Positioned views over the green tree
//!
//! A [`SyntaxNode`] pairs a green element with its absolute offset, the field
//! it fills in its parent and the tree context needed to name it. Views are
//! cheap to clone (a few `Arc`s) and stay valid for as long as they are held,
//! whatever happens to later revisions of the tree.

use crate::syntax::line_col::{LineIndex, Point};
use crate::syntax::{FieldId, GreenElement, GreenNode, NodeFlags, SyntaxKind, TextRange, TextSize};
use crate::table::ParseTable;
use std::fmt;
use std::sync::Arc;

/// Everything a view needs besides the element itself
#[derive(Debug)]
pub struct TreeContext {
    pub(crate) table: Arc<ParseTable>,
    pub(crate) lines: LineIndex,
}

impl TreeContext {
    #[must_use]
    pub fn new(table: Arc<ParseTable>, lines: LineIndex) -> Self {
        Self { table, lines }
    }

    #[must_use]
    pub fn table(&self) -> &Arc<ParseTable> {
        &self.table
    }

    #[must_use]
    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }
}

#[derive(Clone)]
pub struct SyntaxNode {
    element: GreenElement,
    offset: TextSize,
    field: Option<FieldId>,
    context: Arc<TreeContext>,
}

impl SyntaxNode {
    #[must_use]
    pub fn new_root(root: Arc<GreenNode>, context: Arc<TreeContext>) -> Self {
        Self::new(GreenElement::Node(root), TextSize::zero(), None, context)
    }

    pub(crate) const fn new(element: GreenElement, offset: TextSize, field: Option<FieldId>, context: Arc<TreeContext>) -> Self {
        Self {
            element,
            offset,
            field,
            context,
        }
    }

    #[must_use]
    pub fn kind(&self) -> SyntaxKind {
        self.element.kind()
    }

    /// Grammar name of the kind, `ERROR` for error nodes.
    #[must_use]
    pub fn kind_name(&self) -> &str {
        self.context.table.symbol_name(self.kind())
    }

    /// Named rules and named tokens; literal punctuation and keywords are anonymous.
    #[must_use]
    pub fn is_named(&self) -> bool {
        self.context.table.is_named(self.kind())
    }

    #[must_use]
    pub const fn green(&self) -> &GreenElement {
        &self.element
    }

    #[must_use]
    pub const fn field_id(&self) -> Option<FieldId> {
        self.field
    }

    /// Field this node fills in its parent.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.field.map(|field| self.context.table.field_name(field))
    }

    #[must_use]
    pub fn byte_range(&self) -> TextRange {
        TextRange::at(self.offset, self.element.text_len())
    }

    #[must_use]
    pub const fn start_byte(&self) -> TextSize {
        self.offset
    }

    #[must_use]
    pub fn end_byte(&self) -> TextSize {
        self.byte_range().end()
    }

    #[must_use]
    pub fn start_point(&self) -> Point {
        self.context.lines.point(self.start_byte())
    }

    #[must_use]
    pub fn end_point(&self) -> Point {
        self.context.lines.point(self.end_byte())
    }

    #[must_use]
    pub fn is_token(&self) -> bool {
        matches!(self.element, GreenElement::Token(_))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.element.flags().contains(NodeFlags::ERROR)
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.element.flags().contains(NodeFlags::MISSING)
    }

    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.element.flags().contains(NodeFlags::EXTRA)
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.element.is_erroneous()
    }

    /// Source text of a token; `None` for interior nodes.
    #[must_use]
    pub fn token_text(&self) -> Option<&str> {
        self.element.as_token().map(|token| token.text())
    }

    /// Concatenated token text of the subtree.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.element.text_len().to_usize());
        collect_text(&self.element, &mut out);
        out
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.element.as_node().map_or(0, |node| node.child_count())
    }

    /// All children in document order, tokens and extras included.
    pub fn children(&self) -> impl Iterator<Item = Self> + '_ {
        let children = self.element.as_node().map_or(&[][..], |node| node.children());
        let mut offset = self.offset;
        children.iter().map(move |child| {
            let view = Self::new(child.element.clone(), offset, child.field, self.context.clone());
            offset += child.element.text_len();
            view
        })
    }

    pub fn named_children(&self) -> impl Iterator<Item = Self> + '_ {
        self.children().filter(Self::is_named)
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Option<Self> {
        self.children().nth(index)
    }

    /// First child filling field `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Self> {
        let field = self.context.table.field_id(name)?;
        self.children().find(|child| child.field == Some(field))
    }

    /// Every child filling field `name`, for repeated fields.
    pub fn fields<'a>(&'a self, name: &str) -> impl Iterator<Item = Self> + 'a {
        let field = self.context.table.field_id(name);
        self.children().filter(move |child| field.is_some() && child.field == field)
    }

    /// Smallest named descendant covering `range`.
    #[must_use]
    pub fn named_descendant_for_range(&self, range: TextRange) -> Option<Self> {
        if !self.byte_range().contains_range(range) {
            return None;
        }
        let mut best = self.clone();
        let mut current = self.clone();
        loop {
            let next = current
                .children()
                .find(|child| child.byte_range().contains_range(range) && !child.byte_range().is_empty());
            let Some(child) = next else {
                return Some(best);
            };
            if child.is_named() {
                best = child.clone();
            }
            current = child;
        }
    }

    pub(crate) fn context(&self) -> &Arc<TreeContext> {
        &self.context
    }
}

fn collect_text(element: &GreenElement, out: &mut String) {
    match element {
        GreenElement::Token(token) => out.push_str(token.text()),
        GreenElement::Node(node) => {
            for child in node.children() {
                collect_text(&child.element, out);
            }
        }
    }
}

/// Equality by kind, byte range and children.
impl PartialEq for SyntaxNode {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.field == other.field && self.element == other.element
    }
}

impl Eq for SyntaxNode {}

impl std::hash::Hash for SyntaxNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.offset.hash(state);
        self.field.hash(state);
        self.element.hash(state);
    }
}

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind_name(), self.byte_range())?;
        if let Some(text) = self.token_text() {
            write!(f, " {text:?}")?;
        }
        Ok(())
    }
}
