//! # Cursor API for Tree Navigation
//!
//! A [`TreeCursor`] walks a tree snapshot while keeping the explicit path from
//! the root to the current element. Nodes hold no parent pointers, so
//! `goto_parent` is answered from that path. A cursor owns `Arc`s into the
//! snapshot: it is cloneable in O(depth) and never invalidated by later
//! parses.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut cursor = tree.walk();
//! if cursor.goto_first_child() {
//!     println!("{}", cursor.node().kind_name());
//!     while cursor.goto_next_sibling() {
//!         println!("{}", cursor.node().kind_name());
//!     }
//!     cursor.goto_parent();
//! }
//! ```

use crate::syntax::node::TreeContext;
use crate::syntax::{FieldId, GreenElement, GreenNode, SyntaxNode, TextSize};
use smallvec::SmallVec;
use std::sync::Arc;

/// A frame in the cursor's navigation stack
#[derive(Debug, Clone)]
struct CursorFrame {
    element: GreenElement,
    /// Index of this element among its parent's children
    child_index: usize,
    offset: TextSize,
    field: Option<FieldId>,
}

#[derive(Debug, Clone)]
pub struct TreeCursor {
    /// Navigation stack (root at index 0)
    stack: SmallVec<[CursorFrame; 16]>,
    context: Arc<TreeContext>,
}

impl TreeCursor {
    #[must_use]
    pub fn new(root: Arc<GreenNode>, context: Arc<TreeContext>) -> Self {
        Self {
            stack: smallvec::smallvec![CursorFrame {
                element: GreenElement::Node(root),
                child_index: 0,
                offset: TextSize::zero(),
                field: None,
            }],
            context,
        }
    }

    fn current(&self) -> &CursorFrame {
        // The root frame is never popped.
        &self.stack[self.stack.len() - 1]
    }

    #[must_use]
    pub fn node(&self) -> SyntaxNode {
        let frame = self.current();
        SyntaxNode::new(frame.element.clone(), frame.offset, frame.field, self.context.clone())
    }

    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.current().field.map(|field| self.context.table.field_name(field))
    }

    /// Depth in the tree (0 = root)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Ancestors of the current element, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = SyntaxNode> + '_ {
        self.stack[..self.stack.len() - 1]
            .iter()
            .rev()
            .map(|frame| SyntaxNode::new(frame.element.clone(), frame.offset, frame.field, self.context.clone()))
    }

    pub fn goto_first_child(&mut self) -> bool {
        let frame = self.current();
        let Some(node) = frame.element.as_node() else {
            return false;
        };
        let Some(first) = node.children().first() else {
            return false;
        };
        let child = CursorFrame {
            element: first.element.clone(),
            child_index: 0,
            offset: frame.offset,
            field: first.field,
        };
        self.stack.push(child);
        true
    }

    /// Move to the first child that ends after `offset`.
    pub fn goto_first_child_for_byte(&mut self, offset: TextSize) -> bool {
        if !self.goto_first_child() {
            return false;
        }
        loop {
            if self.current().offset + self.current().element.text_len() > offset {
                return true;
            }
            if !self.goto_next_sibling() {
                self.goto_parent();
                return false;
            }
        }
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        if self.stack.len() < 2 {
            return false;
        }
        let frame = self.current();
        let next_index = frame.child_index + 1;
        let next_offset = frame.offset + frame.element.text_len();
        let parent = &self.stack[self.stack.len() - 2];
        let Some(sibling) = parent.element.as_node().and_then(|node| node.children().get(next_index)) else {
            return false;
        };
        let replacement = CursorFrame {
            element: sibling.element.clone(),
            child_index: next_index,
            offset: next_offset,
            field: sibling.field,
        };
        let last = self.stack.len() - 1;
        self.stack[last] = replacement;
        true
    }

    pub fn goto_prev_sibling(&mut self) -> bool {
        if self.stack.len() < 2 {
            return false;
        }
        let frame = self.current();
        let Some(prev_index) = frame.child_index.checked_sub(1) else {
            return false;
        };
        let parent = &self.stack[self.stack.len() - 2];
        let Some(sibling) = parent.element.as_node().and_then(|node| node.children().get(prev_index)) else {
            return false;
        };
        let replacement = CursorFrame {
            element: sibling.element.clone(),
            child_index: prev_index,
            offset: frame.offset - sibling.element.text_len(),
            field: sibling.field,
        };
        let last = self.stack.len() - 1;
        self.stack[last] = replacement;
        true
    }

    pub fn goto_parent(&mut self) -> bool {
        if self.stack.len() < 2 {
            return false;
        }
        self.stack.pop();
        true
    }

    /// Back to the root of the snapshot.
    pub fn reset(&mut self) {
        self.stack.truncate(1);
    }

    /// Document-order traversal of the subtree under the current element.
    #[must_use]
    pub fn preorder(self) -> Preorder {
        let floor = self.depth();
        Preorder {
            cursor: self,
            floor,
            started: false,
            done: false,
        }
    }
}

/// Pre-order iterator driven by a [`TreeCursor`]
///
/// Finite and restartable: cloning the iterator clones its cursor.
#[derive(Debug, Clone)]
pub struct Preorder {
    cursor: TreeCursor,
    floor: usize,
    started: bool,
    done: bool,
}

impl Iterator for Preorder {
    type Item = SyntaxNode;

    fn next(&mut self) -> Option<SyntaxNode> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.cursor.node());
        }
        if self.cursor.goto_first_child() {
            return Some(self.cursor.node());
        }
        loop {
            if self.cursor.depth() == self.floor {
                self.done = true;
                return None;
            }
            if self.cursor.goto_next_sibling() {
                return Some(self.cursor.node());
            }
            self.cursor.goto_parent();
        }
    }
}
