//! Reusable parts of a previous tree
//!
//! [`ReuseIndex`] flattens the old tree into its tokens and visible nodes in
//! document order, marks every token whose text or lexing lookahead an edit
//! touched, and answers two questions for the parser at a new offset: is
//! there an old token that lexing would reproduce exactly, and which old
//! nodes start here without depending on anything that changed.

use crate::incremental::edit::EditMap;
use crate::syntax::{GreenElement, GreenNode, GreenToken, NodeFlags, SyntaxKind};
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct TokenEntry {
    start: usize,
    end: usize,
    token: Arc<GreenToken>,
    /// Inside an `ERROR` node
    in_error: bool,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    start: usize,
    node: Arc<GreenNode>,
    tokens: Range<usize>,
}

/// Old node that can be pushed as-is
#[derive(Debug, Clone)]
pub(crate) struct ReusedNode {
    pub node: Arc<GreenNode>,
    /// Lex mode of the token that followed the node, which is the mode the
    /// text after the node has to be lexed in; `None` when end of input
    /// followed it
    pub next_lex_mode: Option<u16>,
}

/// Old token found at a new offset
#[derive(Debug, Clone)]
pub(crate) struct ReusedToken {
    pub token: Arc<GreenToken>,
}

#[derive(Debug, Default)]
pub(crate) struct ReuseIndex {
    tokens: Vec<TokenEntry>,
    nodes: Vec<NodeEntry>,
    /// `damaged_before[i]` counts damaged tokens among `tokens[..i]`
    damaged_before: Vec<u32>,
    map: EditMap,
}

impl ReuseIndex {
    pub fn new(root: &Arc<GreenNode>, map: EditMap) -> Self {
        let mut index = Self {
            map,
            ..Self::default()
        };
        index.collect(root);

        index.damaged_before.reserve(index.tokens.len() + 1);
        let mut count = 0u32;
        index.damaged_before.push(0);
        for entry in &index.tokens {
            let reach = entry.end + entry.token.examined().to_usize();
            if index.map.damages(entry.start, entry.end, reach) {
                count += 1;
            }
            index.damaged_before.push(count);
        }
        tracing::trace!(
            tokens = index.tokens.len(),
            nodes = index.nodes.len(),
            damaged = count,
            "indexed previous tree"
        );
        index
    }

    fn collect(&mut self, root: &Arc<GreenNode>) {
        enum Step {
            Visit { element: GreenElement, start: usize, in_error: bool },
            Close(usize),
        }
        let mut work = vec![Step::Visit {
            element: GreenElement::Node(root.clone()),
            start: 0,
            in_error: false,
        }];
        while let Some(step) = work.pop() {
            match step {
                Step::Close(entry) => self.nodes[entry].tokens.end = self.tokens.len(),
                Step::Visit {
                    element: GreenElement::Token(token),
                    start,
                    in_error,
                } => {
                    let end = start + token.text_len().to_usize();
                    self.tokens.push(TokenEntry {
                        start,
                        end,
                        token,
                        in_error,
                    });
                }
                Step::Visit {
                    element: GreenElement::Node(node),
                    start,
                    in_error,
                } => {
                    let in_error = in_error || node.kind().is_error();
                    let entry = self.nodes.len();
                    self.nodes.push(NodeEntry {
                        start,
                        node: node.clone(),
                        tokens: self.tokens.len()..self.tokens.len(),
                    });
                    work.push(Step::Close(entry));
                    let mut offsets = Vec::with_capacity(node.child_count());
                    let mut offset = start;
                    for child in node.children() {
                        offsets.push(offset);
                        offset += child.element.text_len().to_usize();
                    }
                    for (child, offset) in node.children().iter().zip(offsets).rev() {
                        work.push(Step::Visit {
                            element: child.element.clone(),
                            start: offset,
                            in_error,
                        });
                    }
                }
            }
        }
    }

    fn damaged_in(&self, range: Range<usize>) -> bool {
        let end = range.end.min(self.tokens.len());
        range.start < end && self.damaged_before[end] > self.damaged_before[range.start]
    }

    /// The old token lexing would produce at `new_offset`, if its text and
    /// lookahead are untouched. Lexer state (mode, scanner state) is for the
    /// caller to compare.
    pub fn token_at(&self, new_offset: usize) -> Option<ReusedToken> {
        let old = self.map.to_old(new_offset)?;
        let first = self.tokens.partition_point(|entry| entry.start < old);
        let index = (first..self.tokens.len())
            .take_while(|i| self.tokens[*i].start == old)
            .find(|i| !self.tokens[*i].token.flags().contains(NodeFlags::MISSING))?;
        let entry = &self.tokens[index];
        let flags = entry.token.flags();
        if self.damaged_in(index..index + 1)
            || flags.contains(NodeFlags::ERROR)
            || entry.token.kind() == SyntaxKind::ERROR
            || entry.start == entry.end
        {
            return None;
        }
        Some(ReusedToken {
            token: entry.token.clone(),
        })
    }

    /// Old nodes starting at `new_offset`, outermost first, that contain no
    /// errors, were built by a single parse version, and neither they nor the
    /// token that followed them were touched by an edit.
    pub fn nodes_at(&self, new_offset: usize) -> impl Iterator<Item = ReusedNode> + '_ {
        let old = self.map.to_old(new_offset);
        let first = old.map_or(self.nodes.len(), |old| {
            self.nodes.partition_point(|entry| entry.start < old)
        });
        self.nodes[first..]
            .iter()
            .take_while(move |entry| Some(entry.start) == old)
            .filter_map(move |entry| self.reusable(entry))
    }

    fn reusable(&self, entry: &NodeEntry) -> Option<ReusedNode> {
        let flags = entry.node.flags();
        if entry.tokens.is_empty()
            || flags.contains(NodeFlags::HAS_ERROR)
            || flags.contains(NodeFlags::FRAGILE)
            || entry.node.kind().is_error()
        {
            return None;
        }
        // The reduction that closed the node looked at the next real token,
        // so that token has to come back unchanged and in the same context.
        let mut lookahead = entry.tokens.end;
        let next = loop {
            let Some(next) = self.tokens.get(lookahead) else {
                // Closed by end of input, which has to still follow it.
                if !self.map.end_intact() || self.damaged_in(entry.tokens.start..lookahead) {
                    return None;
                }
                return Some(ReusedNode {
                    node: entry.node.clone(),
                    next_lex_mode: None,
                });
            };
            if !next.token.flags().contains(NodeFlags::EXTRA) {
                break next;
            }
            lookahead += 1;
        };
        let next_flags = next.token.flags();
        if next.in_error
            || next_flags.contains(NodeFlags::MISSING)
            || next_flags.contains(NodeFlags::FRAGILE)
            || self.damaged_in(entry.tokens.start..lookahead + 1)
        {
            return None;
        }
        Some(ReusedNode {
            node: entry.node.clone(),
            next_lex_mode: Some(next.token.lex_mode()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incremental::Edit;
    use crate::lexer::ScannerState;
    use crate::syntax::{GreenChild, TextSize};

    fn token(kind: u16, text: &str, examined: u32) -> GreenChild {
        let token = GreenToken::new(SyntaxKind(kind), text).with_lex_info(0, TextSize::from(examined), ScannerState::new());
        GreenChild::new(None, token.into())
    }

    fn extra(text: &str) -> GreenChild {
        let token = GreenToken::new(SyntaxKind(9), text)
            .with_flags(NodeFlags::EXTRA)
            .with_lex_info(0, TextSize::from(1), ScannerState::new());
        GreenChild::new(None, token.into())
    }

    /// `let x = 1;` as (decl let ws (name x) ws = ws (value 1) ;)
    fn tree() -> Arc<GreenNode> {
        let name = GreenNode::new(SyntaxKind(20), vec![token(2, "x", 1)], NodeFlags::NONE, 2);
        let value = GreenNode::new(SyntaxKind(21), vec![token(3, "1", 1)], NodeFlags::NONE, 4);
        let decl = GreenNode::new(
            SyntaxKind(22),
            vec![
                token(1, "let", 1),
                extra(" "),
                GreenChild::new(None, name.into()),
                extra(" "),
                token(4, "=", 1),
                extra(" "),
                GreenChild::new(None, value.into()),
                token(5, ";", 1),
            ],
            NodeFlags::NONE,
            0,
        );
        GreenNode::new(SyntaxKind(23), vec![GreenChild::new(None, decl.into())], NodeFlags::NONE, 0)
    }

    #[test]
    fn test_unchanged_tree_offers_inner_nodes() {
        let index = ReuseIndex::new(&tree(), EditMap::new(10, &[]));
        let name = index.nodes_at(4).next().unwrap();
        assert_eq!(name.node.kind(), SyntaxKind(20));
        assert_eq!(name.next_lex_mode, Some(0));
        assert!(index.token_at(0).is_some());
    }

    #[test]
    fn test_nodes_closed_by_end_of_input() {
        let index = ReuseIndex::new(&tree(), EditMap::new(10, &[]));
        let kinds: Vec<SyntaxKind> = index.nodes_at(0).map(|candidate| candidate.node.kind()).collect();
        assert_eq!(kinds, [SyntaxKind(23), SyntaxKind(22)]);
        assert!(index.nodes_at(0).all(|candidate| candidate.next_lex_mode.is_none()));

        // Text appended after the declaration means it was not closed by
        // end of input any more.
        let index = ReuseIndex::new(&tree(), EditMap::new(10, &[Edit::new(10, 10, 13)]));
        assert_eq!(index.nodes_at(0).count(), 0);
        assert_eq!(index.nodes_at(4).count(), 1);
    }

    #[test]
    fn test_edit_blocks_enclosing_nodes_but_not_prefix_tokens() {
        let index = ReuseIndex::new(&tree(), EditMap::new(10, &[Edit::new(8, 9, 10)]));
        assert_eq!(index.nodes_at(0).count(), 0);
        assert!(index.token_at(0).is_some());
        assert!(index.token_at(4).is_some());
        assert_eq!(index.nodes_at(4).count(), 1);
        // The literal itself changed.
        assert!(index.token_at(8).is_none());
        // `;` moved to offset 10 and is intact.
        let semicolon = index.token_at(10).unwrap();
        assert_eq!(semicolon.token.text(), ";");
    }

    #[test]
    fn test_node_needs_its_lookahead_intact() {
        // Replace `=`: the name node's lookahead token is the changed one,
        // through the whitespace between them.
        let index = ReuseIndex::new(&tree(), EditMap::new(10, &[Edit::new(6, 7, 7)]));
        assert_eq!(index.nodes_at(4).count(), 0);
        assert!(index.token_at(4).is_some());
    }

    #[test]
    fn test_missing_tokens_are_never_offered() {
        let missing = GreenChild::new(None, GreenToken::missing(SyntaxKind(5), 0, ScannerState::new()).into());
        let inner = GreenNode::new(SyntaxKind(20), vec![token(1, "a", 1)], NodeFlags::NONE, 0);
        let root = GreenNode::new(
            SyntaxKind(23),
            vec![GreenChild::new(None, inner.into()), missing, token(2, "b", 1)],
            NodeFlags::NONE,
            0,
        );
        let index = ReuseIndex::new(&root, EditMap::new(2, &[]));
        assert!(index.token_at(1).is_some_and(|t| t.token.text() == "b"));
        // `a` was reduced in front of an inserted token.
        assert_eq!(index.nodes_at(0).count(), 0);
    }

    #[test]
    fn test_tokens_inside_errors_block_preceding_nodes() {
        let name = GreenNode::new(SyntaxKind(20), vec![token(2, "x", 1)], NodeFlags::NONE, 0);
        let error = GreenNode::error(vec![token(3, "?", 1)], 1);
        let root = GreenNode::new(
            SyntaxKind(23),
            vec![GreenChild::new(None, name.into()), GreenChild::new(None, error.into())],
            NodeFlags::NONE,
            0,
        );
        let index = ReuseIndex::new(&root, EditMap::new(2, &[]));
        assert_eq!(index.nodes_at(0).count(), 0);
    }
}
