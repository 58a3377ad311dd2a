//! Immutable green tree
//!
//! Green elements know their kind, length and children but not their absolute
//! position, so an unchanged subtree can be shared between tree revisions
//! through its `Arc`. Positions are computed on the way down by
//! [`SyntaxNode`](crate::syntax::SyntaxNode) and [`TreeCursor`](crate::syntax::TreeCursor).

use crate::lexer::ScannerState;
use crate::syntax::{FieldId, SyntaxKind, TextSize};
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Per-element flag set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const NONE: Self = Self(0);
    /// An `ERROR` node, or a token nothing in the grammar matched.
    pub const ERROR: Self = Self(1);
    /// Zero-width token inserted by recovery.
    pub const MISSING: Self = Self(1 << 1);
    /// Built while more than one parse version was alive.
    pub const FRAGILE: Self = Self(1 << 2);
    /// Some descendant is an error or missing element.
    pub const HAS_ERROR: Self = Self(1 << 3);
    /// Trivia or other grammar extra.
    pub const EXTRA: Self = Self(1 << 4);
    /// Lexed right after a zero-width external token at the same offset,
    /// where another empty external token was not allowed.
    pub const NO_EMPTY_EXTERNAL: Self = Self(1 << 5);

    /// Flags that take part in structural equality.
    const STRUCTURAL: Self = Self(Self::ERROR.0 | Self::MISSING.0 | Self::HAS_ERROR.0 | Self::EXTRA.0);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn structural(self) -> Self {
        Self(self.0 & Self::STRUCTURAL.0)
    }
}

impl std::ops::BitOr for NodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Leaf token
///
/// Besides its text a token remembers how it was lexed: the lex mode, how many
/// bytes past its end the lexer examined and the external scanner state after
/// it. Incremental reparsing uses these to decide whether the token can be
/// reused; they do not take part in equality.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct GreenToken {
    kind: SyntaxKind,
    text: CompactString,
    len: TextSize,
    flags: NodeFlags,
    lex_mode: u16,
    examined: TextSize,
    scanner_state: ScannerState,
}

impl GreenToken {
    /// Token whose length is the byte length of `text`.
    #[must_use]
    pub fn new(kind: SyntaxKind, text: impl Into<CompactString>) -> Self {
        let text = text.into();
        let len = TextSize::of(text.len());
        Self::from_bytes_len(kind, text, len)
    }

    /// Token over raw bytes; `text` is the lossy UTF-8 rendering of them.
    #[must_use]
    pub fn from_bytes_len(kind: SyntaxKind, text: CompactString, len: TextSize) -> Self {
        Self {
            kind,
            text,
            len,
            flags: NodeFlags::NONE,
            lex_mode: 0,
            examined: TextSize::zero(),
            scanner_state: ScannerState::new(),
        }
    }

    /// Zero-width token standing for a terminal the input lacks.
    #[must_use]
    pub fn missing(kind: SyntaxKind, lex_mode: u16, scanner_state: ScannerState) -> Self {
        Self {
            flags: NodeFlags::MISSING,
            lex_mode,
            scanner_state,
            ..Self::new(kind, "")
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    #[must_use]
    pub fn with_lex_info(mut self, lex_mode: u16, examined: TextSize, scanner_state: ScannerState) -> Self {
        self.lex_mode = lex_mode;
        self.examined = examined;
        self.scanner_state = scanner_state;
        self
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> SyntaxKind {
        self.kind
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    #[must_use]
    pub const fn text_len(&self) -> TextSize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[must_use]
    pub const fn lex_mode(&self) -> u16 {
        self.lex_mode
    }

    /// Bytes past the end of the token that the lexer looked at.
    #[must_use]
    pub const fn examined(&self) -> TextSize {
        self.examined
    }

    /// External scanner state after this token.
    #[must_use]
    pub fn scanner_state(&self) -> &ScannerState {
        &self.scanner_state
    }
}

impl PartialEq for GreenToken {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.len == other.len
            && self.flags.structural() == other.flags.structural()
            && self.text == other.text
    }
}

impl Eq for GreenToken {}

impl Hash for GreenToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.len.hash(state);
        self.flags.structural().hash(state);
        self.text.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum GreenElement {
    Node(Arc<GreenNode>),
    Token(Arc<GreenToken>),
}

impl GreenElement {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> SyntaxKind {
        match self {
            Self::Node(node) => node.kind(),
            Self::Token(token) => token.kind(),
        }
    }

    #[inline]
    #[must_use]
    pub fn text_len(&self) -> TextSize {
        match self {
            Self::Node(node) => node.text_len(),
            Self::Token(token) => token.text_len(),
        }
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        match self {
            Self::Node(node) => node.flags(),
            Self::Token(token) => token.flags(),
        }
    }

    #[must_use]
    pub fn as_node(&self) -> Option<&Arc<GreenNode>> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub fn as_token(&self) -> Option<&Arc<GreenToken>> {
        match self {
            Self::Node(_) => None,
            Self::Token(token) => Some(token),
        }
    }

    /// Same allocation, not merely equal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Node(a), Self::Node(b)) => Arc::ptr_eq(a, b),
            (Self::Token(a), Self::Token(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Error, missing, or containing either.
    #[must_use]
    pub fn is_erroneous(&self) -> bool {
        let flags = self.flags();
        flags.contains(NodeFlags::ERROR)
            || flags.contains(NodeFlags::MISSING)
            || flags.contains(NodeFlags::HAS_ERROR)
    }

    #[must_use]
    pub fn first_token(&self) -> Option<&Arc<GreenToken>> {
        match self {
            Self::Node(node) => node.first_token(),
            Self::Token(token) => Some(token),
        }
    }

    #[must_use]
    pub fn last_token(&self) -> Option<&Arc<GreenToken>> {
        match self {
            Self::Node(node) => node.last_token(),
            Self::Token(token) => Some(token),
        }
    }
}

impl From<GreenToken> for GreenElement {
    fn from(token: GreenToken) -> Self {
        Self::Token(Arc::new(token))
    }
}

impl From<Arc<GreenNode>> for GreenElement {
    fn from(node: Arc<GreenNode>) -> Self {
        Self::Node(node)
    }
}

/// Child slot: the element plus the field it fills in its parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct GreenChild {
    pub field: Option<FieldId>,
    pub element: GreenElement,
}

impl GreenChild {
    #[must_use]
    pub const fn new(field: Option<FieldId>, element: GreenElement) -> Self {
        Self { field, element }
    }
}

/// Children storage optimized for different sizes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
enum GreenChildren {
    Empty,
    /// Single child (common for wrapper nodes)
    One(GreenChild),
    /// Up to [`INLINE_CHILDREN_THRESHOLD`] children without a heap allocation
    Inline(SmallVec<[GreenChild; 4]>),
    Many(Box<[GreenChild]>),
}

impl GreenChildren {
    fn into_vec(self) -> Vec<GreenChild> {
        match self {
            Self::Empty => Vec::new(),
            Self::One(child) => vec![child],
            Self::Inline(children) => children.into_vec(),
            Self::Many(children) => children.into_vec(),
        }
    }
}

const INLINE_CHILDREN_THRESHOLD: usize = 4;

/// Immutable, shareable interior node
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct GreenNode {
    kind: SyntaxKind,
    text_len: TextSize,
    flags: NodeFlags,
    /// Parse state the node's first token was shifted in.
    parse_state: u32,
    children: GreenChildren,
}

impl GreenNode {
    /// Build a node; length and inherited flags are computed from `children`.
    #[must_use]
    pub fn new(kind: SyntaxKind, mut children: Vec<GreenChild>, flags: NodeFlags, parse_state: u32) -> Arc<Self> {
        let mut text_len = TextSize::zero();
        let mut flags = flags;
        for child in &children {
            text_len += child.element.text_len();
            if child.element.is_erroneous() {
                flags = flags | NodeFlags::HAS_ERROR;
            }
            if child.element.flags().contains(NodeFlags::FRAGILE) {
                flags = flags | NodeFlags::FRAGILE;
            }
        }
        if flags.contains(NodeFlags::ERROR) {
            flags = flags | NodeFlags::HAS_ERROR;
        }
        let children = match children.len() {
            0 => GreenChildren::Empty,
            1 => children.pop().map_or(GreenChildren::Empty, GreenChildren::One),
            2..=INLINE_CHILDREN_THRESHOLD => GreenChildren::Inline(children.into_iter().collect()),
            _ => GreenChildren::Many(children.into_boxed_slice()),
        };
        Arc::new(Self {
            kind,
            text_len,
            flags,
            parse_state,
            children,
        })
    }

    /// `ERROR` node wrapping `children`.
    #[must_use]
    pub fn error(children: Vec<GreenChild>, parse_state: u32) -> Arc<Self> {
        Self::new(SyntaxKind::ERROR, children, NodeFlags::ERROR, parse_state)
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> SyntaxKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn text_len(&self) -> TextSize {
        self.text_len
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[must_use]
    pub const fn parse_state(&self) -> u32 {
        self.parse_state
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[GreenChild] {
        match &self.children {
            GreenChildren::Empty => &[],
            GreenChildren::One(child) => std::slice::from_ref(child),
            GreenChildren::Inline(children) => children,
            GreenChildren::Many(children) => children,
        }
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Leftmost token of the subtree. Empty nodes are stepped over.
    #[must_use]
    pub fn first_token(&self) -> Option<&Arc<GreenToken>> {
        let mut pending: Vec<&GreenChild> = self.children().iter().rev().collect();
        while let Some(child) = pending.pop() {
            match &child.element {
                GreenElement::Token(token) => return Some(token),
                GreenElement::Node(node) => pending.extend(node.children().iter().rev()),
            }
        }
        None
    }

    /// Rightmost token of the subtree.
    #[must_use]
    pub fn last_token(&self) -> Option<&Arc<GreenToken>> {
        let mut pending: Vec<&GreenChild> = self.children().iter().collect();
        while let Some(child) = pending.pop() {
            match &child.element {
                GreenElement::Token(token) => return Some(token),
                GreenElement::Node(node) => pending.extend(node.children().iter()),
            }
        }
        None
    }

    /// Number of nodes and tokens in this subtree, itself included.
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            for child in node.children() {
                match &child.element {
                    GreenElement::Node(node) => pending.push(node),
                    GreenElement::Token(_) => count += 1,
                }
            }
        }
        count
    }
}

/// Repetitions build one hidden node per item, nested to the left, so
/// subtrees can be far deeper than the call stack. Nodes this drop owns
/// alone are taken apart in a loop.
impl Drop for GreenNode {
    fn drop(&mut self) {
        if !self.children().iter().any(|child| matches!(child.element, GreenElement::Node(_))) {
            return;
        }
        fn take(children: &mut GreenChildren, pending: &mut Vec<Arc<GreenNode>>) {
            let children = std::mem::replace(children, GreenChildren::Empty);
            pending.extend(children.into_vec().into_iter().filter_map(|child| match child.element {
                GreenElement::Node(node) => Some(node),
                GreenElement::Token(_) => None,
            }));
        }

        let mut pending = Vec::new();
        take(&mut self.children, &mut pending);
        while let Some(node) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(node) {
                take(&mut node.children, &mut pending);
            }
        }
    }
}

/// Equality by kind, length, error flags and children; parse state and
/// fragility are bookkeeping and do not take part.
impl PartialEq for GreenNode {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if std::ptr::eq(a, b) {
                continue;
            }
            if a.kind != b.kind
                || a.text_len != b.text_len
                || a.flags.structural() != b.flags.structural()
                || a.child_count() != b.child_count()
            {
                return false;
            }
            for (x, y) in a.children().iter().zip(b.children()) {
                if x.field != y.field {
                    return false;
                }
                match (&x.element, &y.element) {
                    (GreenElement::Node(x), GreenElement::Node(y)) => pending.push((&**x, &**y)),
                    (GreenElement::Token(x), GreenElement::Token(y)) => {
                        if x != y {
                            return false;
                        }
                    }
                    _ => return false,
                }
            }
        }
        true
    }
}

impl Eq for GreenNode {}

impl Hash for GreenNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.text_len.hash(state);
        self.flags.structural().hash(state);
        self.children().hash(state);
    }
}
