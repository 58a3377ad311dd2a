//! # Error Recovery
//!
//! Runs when the only live version has no action for its lookahead. The
//! stages are tried in order:
//!
//! 1. **Missing token**: find one terminal that the current state can shift
//!    and after which the lookahead is acceptable, and insert it as a
//!    zero-width `MISSING` token. Recover tokens are tried first, then the
//!    state's other terminals in table order.
//! 2. **Skip**: lex forward with every terminal valid. For each token, look
//!    for a stack depth at which it can continue; below the top of the stack
//!    only recover tokens and the end of input qualify. The entries above
//!    that depth and the skipped tokens become one `ERROR` node, and the
//!    external scanner state is reset to the one saved at that depth.
//! 3. **Give up**: if nothing up to the end of input fits, everything goes
//!    into a single `ERROR` node under the root.
//!
//! Every stage either consumes input, shrinks the stack, or is bounded by
//! [`ParserConfig::max_missing_insertions`](super::ParserConfig), so parsing
//! always terminates.

use super::engine::{ERROR_LEX_MODE, Engine, Lexed, Lookahead, flatten_hidden};
use super::stack::{SimStack, StackEntry};
use crate::error::Cancelled;
use crate::lexer::{LexState, ScannerState};
use crate::syntax::{GreenChild, GreenElement, GreenNode, GreenToken, NodeFlags, SyntaxKind};
use smallvec::SmallVec;
use std::sync::Arc;

impl Engine<'_> {
    pub(super) fn recover(&mut self, index: usize) -> Result<Option<Arc<GreenNode>>, Cancelled> {
        if (self.versions[index].missing as usize) < self.config.max_missing_insertions && self.insert_missing(index)? {
            return Ok(None);
        }
        if self.skip_to_resume(index)? {
            return Ok(None);
        }
        self.wrap_remainder(index).map(Some)
    }

    fn insert_missing(&mut self, index: usize) -> Result<bool, Cancelled> {
        let table = self.table;
        let version = &self.versions[index];
        let Some(lookahead) = &version.lookahead else {
            return Ok(false);
        };
        let next = lookahead.token.kind();
        if next.is_error() {
            return Ok(false);
        }
        let state = version.head.state;

        let mut candidates: SmallVec<[SyntaxKind; 16]> = SmallVec::new();
        for kind in table.recover_tokens().iter().copied().chain(table.expected(state)) {
            let insertable = kind != SyntaxKind::END
                && !kind.is_error()
                && table.is_terminal(kind)
                && !table.is_external(kind)
                && !table.is_extra(kind)
                && !table.actions(state, kind).is_empty();
            if insertable && !candidates.contains(&kind) {
                candidates.push(kind);
            }
        }
        let found = candidates.into_iter().find(|&kind| {
            let mut sim = SimStack::new(&version.head);
            sim.advance(table, kind) && sim.advance(table, next)
        });
        let Some(kind) = found else {
            return Ok(false);
        };

        let head = version.head.clone();
        let mode = table.lex_mode(state);
        self.count_node()?;
        tracing::trace!(
            kind = table.symbol_name(kind),
            offset = head.position,
            before = table.symbol_name(next),
            "inserted missing token"
        );
        let token = GreenToken::missing(kind, mode, head.scanner_state.clone());
        let version = &mut self.versions[index];
        version.lookahead = Some(Lookahead {
            extras: Vec::new(),
            token: Lexed {
                token: Arc::new(token),
                start: head.position,
            },
            mode,
            scanner_before: head.scanner_state.clone(),
            allow_empty_external: true,
        });
        version.missing += 1;
        Ok(true)
    }

    fn skip_to_resume(&mut self, index: usize) -> Result<bool, Cancelled> {
        let table = self.table;
        let version = self.versions[index].clone();
        let Some(lookahead) = version.lookahead else {
            return Ok(false);
        };
        let entries = version.head.collect();
        let depths: Vec<usize> = (0..entries.len()).rev().filter(|&i| !entries[i].extra).collect();
        let Some(&top) = depths.first() else {
            return Ok(false);
        };

        let mut skipped: Vec<GreenChild> = lookahead.extras.iter().map(token_child).collect();
        let mut pending: Vec<Lexed> = Vec::new();
        let mut position = lookahead.token.start;
        let mut scanner_state = lookahead.scanner_before;
        let mut allow = lookahead.allow_empty_external;
        loop {
            let raw = self.lex(position, LexState::Error, &scanner_state, allow);
            let extra = self.is_extra(raw.kind);
            let token = self.make_token(&raw, ERROR_LEX_MODE, extra, allow)?;
            let lexed = Lexed { token, start: raw.start };
            let allow_here = allow;
            position = raw.end;
            allow = !raw.blocks_empty_external();
            scanner_state = raw.scanner_after;
            if extra {
                pending.push(lexed);
                continue;
            }

            let kind = lexed.kind();
            let resumable = kind == SyntaxKind::END || table.recover_tokens().contains(&kind);
            if !kind.is_error() {
                for &depth in &depths {
                    if depth != top && !resumable {
                        break;
                    }
                    let mut sim = SimStack::new(&entries[depth]);
                    if sim.advance(table, kind) {
                        self.resume(index, &entries, depth, skipped, pending, lexed, allow_here)?;
                        return Ok(true);
                    }
                }
            }
            if kind == SyntaxKind::END {
                return Ok(false);
            }
            skipped.extend(pending.drain(..).map(|extra| token_child(&extra)));
            skipped.push(token_child(&lexed));
        }
    }

    /// Replace everything above `depth` plus `skipped` with an `ERROR` node
    /// and continue with `next` as the lookahead.
    #[allow(clippy::too_many_arguments)]
    fn resume(
        &mut self,
        index: usize,
        entries: &[Arc<StackEntry>],
        depth: usize,
        skipped: Vec<GreenChild>,
        extras: Vec<Lexed>,
        next: Lexed,
        allow_empty_external: bool,
    ) -> Result<(), Cancelled> {
        let table = self.table;
        let base = &entries[depth];
        let mut children = Vec::new();
        for entry in &entries[depth + 1..] {
            push_spliced(&mut children, entry.element.as_ref());
        }
        children.extend(skipped);
        let children = flatten_hidden(table, children);

        let reset = base.scanner_state.clone();
        let head = if children.is_empty() {
            base.clone()
        } else {
            self.count_node()?;
            let error = GreenNode::error(children, base.state);
            tracing::trace!(
                offset = base.position,
                len = error.text_len().to_usize(),
                resume = table.symbol_name(next.kind()),
                "skipped input into error node"
            );
            StackEntry::push(base, base.state, GreenElement::Node(error), true, reset.clone())
        };

        let restamp = |lexed: Lexed| {
            if table.is_external(lexed.kind()) {
                return lexed;
            }
            let token = (*lexed.token).clone().with_lex_info(ERROR_LEX_MODE, lexed.token.examined(), reset.clone());
            Lexed {
                token: Arc::new(token),
                start: lexed.start,
            }
        };
        let lookahead = Lookahead {
            extras: extras.into_iter().map(restamp).collect(),
            token: restamp(next),
            mode: ERROR_LEX_MODE,
            scanner_before: reset.clone(),
            allow_empty_external,
        };
        let version = &mut self.versions[index];
        version.head = head;
        version.lookahead = Some(lookahead);
        version.reductions = 0;
        Ok(())
    }

    /// Last resort: the root holds one `ERROR` node with the whole stack and
    /// the rest of the input.
    pub(super) fn wrap_remainder(&mut self, index: usize) -> Result<Arc<GreenNode>, Cancelled> {
        let table = self.table;
        let version = self.versions[index].clone();
        let mut children = Vec::new();
        for entry in version.head.collect().iter().skip(1) {
            push_spliced(&mut children, entry.element.as_ref());
        }

        let (mut position, mut scanner_state, mut allow): (usize, ScannerState, bool) = match &version.lookahead {
            Some(lookahead) => {
                children.extend(lookahead.extras.iter().map(token_child));
                (
                    lookahead.token.start,
                    lookahead.scanner_before.clone(),
                    lookahead.allow_empty_external,
                )
            }
            None => (
                version.head.position,
                version.head.scanner_state.clone(),
                !version.head.ends_with_empty_external(table),
            ),
        };
        loop {
            let raw = self.lex(position, LexState::Error, &scanner_state, allow);
            if raw.kind == SyntaxKind::END {
                break;
            }
            let extra = self.is_extra(raw.kind);
            let token = self.make_token(&raw, ERROR_LEX_MODE, extra, allow)?;
            children.push(GreenChild::new(None, GreenElement::Token(token)));
            position = raw.end;
            allow = !raw.blocks_empty_external();
            scanner_state = raw.scanner_after;
        }

        let children = flatten_hidden(table, children);
        self.count_node()?;
        let error = GreenNode::error(children, 0);
        tracing::debug!(len = error.text_len().to_usize(), "no resume point before end of input");
        self.count_node()?;
        Ok(GreenNode::new(
            table.start_kind(),
            vec![GreenChild::new(None, GreenElement::Node(error))],
            NodeFlags::NONE,
            0,
        ))
    }
}

fn token_child(lexed: &Lexed) -> GreenChild {
    GreenChild::new(None, GreenElement::Token(lexed.token.clone()))
}

/// Append `element`, splicing the contents of an `ERROR` node so that
/// adjacent errors end up as one.
fn push_spliced(children: &mut Vec<GreenChild>, element: Option<&GreenElement>) {
    match element {
        Some(GreenElement::Node(node)) if node.kind().is_error() => children.extend(node.children().iter().cloned()),
        Some(element) => children.push(GreenChild::new(None, element.clone())),
        None => {}
    }
}
