//! Concrete syntax tree
//!
//! [`GreenNode`]/[`GreenToken`] form the immutable, `Arc`-shared storage;
//! [`SyntaxNode`] and [`TreeCursor`] are positioned views over it, and
//! [`SyntaxTree`] bundles a root with its text length and revision.

pub mod cursor;
pub mod green;
pub mod kind;
pub mod line_col;
pub mod node;
pub mod text;
pub mod tree;

pub use cursor::{Preorder, TreeCursor};
pub use green::*;
pub use kind::*;
pub use line_col::{LineIndex, Point};
pub use node::SyntaxNode;
pub use text::*;
pub use tree::{SyntaxError, SyntaxTree};
