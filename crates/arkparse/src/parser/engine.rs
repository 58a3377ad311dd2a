//! # Parser Engine
//!
//! Table-driven shift/reduce over a set of stack versions.
//!
//! With one version this is a plain LR parser. At a GLR split point the
//! version is forked once per action (up to [`ParserConfig::max_stacks`]);
//! versions then advance in lockstep, always moving the one furthest behind,
//! versions that reach the same state at the same offset are merged, and a
//! version without an action is dropped while others are alive. Recovery
//! (see [`recovery`](super::recovery)) only runs for a sole version.
//!
//! Each version lexes its own lookahead, so lexing follows the lex mode of
//! its current state. Lexing and reductions that happen while several
//! versions are alive mark their results `FRAGILE`, which keeps them out of
//! incremental reuse.

use super::ParserConfig;
use super::stack::{SimStack, StackEntry};
use crate::error::{CancelReason, Cancelled};
use crate::incremental::ReuseIndex;
use crate::lexer::{ExternalScanner, LexState, Lexer, ScannerState};
use crate::syntax::{GreenChild, GreenElement, GreenNode, GreenToken, NodeFlags, SyntaxKind, TextSize};
use crate::table::{Action, ParseTable, ProductionId, StateId};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Instant;

/// Reductions a version may perform without shifting before it is
/// considered stuck
const MAX_REDUCTIONS_WITHOUT_SHIFT: u32 = 10_000;

/// Lex mode recorded on tokens lexed with every terminal valid
pub(super) const ERROR_LEX_MODE: u16 = u16::MAX;

/// A token with its absolute start
#[derive(Debug, Clone)]
pub(super) struct Lexed {
    pub token: Arc<GreenToken>,
    pub start: usize,
}

impl Lexed {
    pub fn kind(&self) -> SyntaxKind {
        self.token.kind()
    }
}

/// Next token of a version plus the extras in front of it
#[derive(Debug, Clone)]
pub(super) struct Lookahead {
    pub extras: Vec<Lexed>,
    pub token: Lexed,
    /// Lex mode the token was lexed in
    pub mode: u16,
    /// Scanner state the token was lexed from
    pub scanner_before: ScannerState,
    /// Whether a zero-width external token was acceptable at the token
    pub allow_empty_external: bool,
}

#[derive(Debug, Clone)]
pub(super) struct Version {
    pub head: Arc<StackEntry>,
    pub lookahead: Option<Lookahead>,
    /// Lex mode for the next lookahead, set after pushing a reused subtree
    pub forced_mode: Option<u16>,
    pub reductions: u32,
    /// Missing tokens inserted since the last real shift
    pub missing: u32,
}

/// A lexed token before it becomes a [`GreenToken`]
#[derive(Debug)]
pub(super) struct RawToken {
    pub kind: SyntaxKind,
    pub start: usize,
    pub end: usize,
    pub examined: usize,
    pub external: bool,
    pub scanner_after: ScannerState,
    pub reused: Option<Arc<GreenToken>>,
}

impl RawToken {
    /// Whether the next token at this offset may not be a zero-width external.
    pub fn blocks_empty_external(&self) -> bool {
        self.external && self.start == self.end
    }
}

#[derive(Debug, Default)]
struct Stats {
    reused_tokens: usize,
    reused_nodes: usize,
    forks: usize,
    max_versions: usize,
}

pub(crate) struct Engine<'a> {
    pub(super) table: &'a ParseTable,
    lexer: &'a Lexer,
    pub(super) config: &'a ParserConfig,
    pub(super) text: &'a [u8],
    scanner: Option<Box<dyn ExternalScanner>>,
    /// State currently loaded into `scanner`
    loaded: Option<ScannerState>,
    reuse: Option<ReuseIndex>,
    pub(super) versions: Vec<Version>,
    nodes: usize,
    steps: u64,
    started: Instant,
    stats: Stats,
}

impl<'a> Engine<'a> {
    pub fn new(
        table: &'a ParseTable,
        lexer: &'a Lexer,
        config: &'a ParserConfig,
        text: &'a [u8],
        scanner: Option<Box<dyn ExternalScanner>>,
        reuse: Option<ReuseIndex>,
    ) -> Self {
        Self {
            table,
            lexer,
            config,
            text,
            scanner,
            loaded: None,
            reuse,
            versions: vec![Version {
                head: StackEntry::bottom(0),
                lookahead: None,
                forced_mode: None,
                reductions: 0,
                missing: 0,
            }],
            nodes: 0,
            steps: 0,
            started: Instant::now(),
            stats: Stats::default(),
        }
    }

    /// Parse to completion and return the root.
    pub fn run(mut self) -> Result<Arc<GreenNode>, Cancelled> {
        loop {
            self.tick()?;
            let index = self.next_version();
            if let Some(root) = self.step(index)? {
                tracing::debug!(
                    bytes = self.text.len(),
                    nodes = self.nodes,
                    forks = self.stats.forks,
                    max_versions = self.stats.max_versions,
                    reused_tokens = self.stats.reused_tokens,
                    reused_nodes = self.stats.reused_nodes,
                    "parse finished"
                );
                return Ok(root);
            }
            if self.versions.len() > 1 {
                self.merge_versions();
            }
        }
    }

    fn tick(&mut self) -> Result<(), Cancelled> {
        self.steps += 1;
        if self.steps % 256 == 0
            && let Some(limit) = self.config.time_budget
        {
            let elapsed = self.started.elapsed();
            if elapsed > limit {
                return Err(Cancelled {
                    reason: CancelReason::TimeBudget,
                    nodes: self.nodes,
                    elapsed,
                });
            }
        }
        Ok(())
    }

    /// Account for one newly built node or token.
    pub(super) fn count_node(&mut self) -> Result<(), Cancelled> {
        self.nodes += 1;
        match self.config.node_budget {
            Some(budget) if self.nodes > budget => Err(Cancelled {
                reason: CancelReason::NodeBudget,
                nodes: self.nodes,
                elapsed: self.started.elapsed(),
            }),
            _ => Ok(()),
        }
    }

    /// The version furthest behind; the first one on ties.
    fn next_version(&self) -> usize {
        let mut best = 0;
        for (index, version) in self.versions.iter().enumerate().skip(1) {
            if version.head.position < self.versions[best].head.position {
                best = index;
            }
        }
        best
    }

    fn step(&mut self, index: usize) -> Result<Option<Arc<GreenNode>>, Cancelled> {
        if self.versions[index].lookahead.is_none() {
            let lookahead = self.lex_lookahead(index)?;
            self.versions[index].lookahead = Some(lookahead);
        }
        if self.versions.len() == 1 && self.reuse_node(index) {
            return Ok(None);
        }

        let version = &self.versions[index];
        let kind = version.lookahead.as_ref().map_or(SyntaxKind::END, |l| l.token.kind());
        let actions: SmallVec<[Action; 4]> = self.table.actions(version.head.state, kind).iter().copied().collect();

        let stuck = version.reductions > MAX_REDUCTIONS_WITHOUT_SHIFT;
        if actions.is_empty() || stuck {
            if self.versions.len() > 1 {
                tracing::trace!(version = index, state = version.head.state, "dropping version without action");
                self.versions.remove(index);
                return Ok(None);
            }
            if stuck {
                return self.wrap_remainder(index).map(Some);
            }
            return self.recover(index);
        }

        let room = self.config.max_stacks.saturating_sub(self.versions.len());
        let taken = actions.len().min(room + 1);
        for offset in 1..taken {
            let fork = self.versions[index].clone();
            self.versions.insert(index + offset, fork);
        }
        if taken > 1 {
            self.stats.forks += taken - 1;
            self.stats.max_versions = self.stats.max_versions.max(self.versions.len());
            tracing::trace!(
                state = self.versions[index].head.state,
                lookahead = self.table.symbol_name(kind),
                forks = taken - 1,
                "forked at split point"
            );
        }

        // Apply the later actions first so that removing a dead fork does not
        // shift the indices still to be visited.
        for offset in (0..taken).rev() {
            let target = index + offset;
            match actions[offset] {
                Action::Shift(state) => self.shift(target, state),
                Action::Reduce(production) => {
                    if !self.reduce(target, production)? {
                        if self.versions.len() > 1 {
                            self.versions.remove(target);
                        } else {
                            return self.wrap_remainder(target).map(Some);
                        }
                    }
                }
                Action::Accept => {
                    if offset == 0 {
                        return self.accept(target).map(Some);
                    }
                    // A later fork accepting waits for its turn.
                }
            }
        }
        Ok(None)
    }

    fn merge_versions(&mut self) {
        let mut i = 0;
        while i < self.versions.len() {
            let mut j = i + 1;
            while j < self.versions.len() {
                if same_configuration(&self.versions[i], &self.versions[j]) {
                    tracing::trace!(kept = i, merged = j, state = self.versions[i].head.state, "merged versions");
                    self.versions.remove(j);
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
    }

    /// Lex the extras and token that follow version `index`'s head.
    fn lex_lookahead(&mut self, index: usize) -> Result<Lookahead, Cancelled> {
        let version = &mut self.versions[index];
        let head = version.head.clone();
        let mode = version.forced_mode.take().unwrap_or_else(|| self.table.lex_mode(head.state));

        let mut position = head.position;
        let mut scanner_state = head.scanner_state.clone();
        let mut allow = !head.ends_with_empty_external(self.table);
        let mut extras = Vec::new();
        loop {
            let mut raw = self.lex(position, LexState::Mode(mode), &scanner_state, allow);
            if raw.blocks_empty_external()
                && !self.is_extra(raw.kind)
                && !SimStack::new(&head).can_shift(self.table, raw.kind)
            {
                // Merged lookaheads let the scanner offer tokens this stack
                // cannot take; lex the same offset again without them.
                tracing::trace!(
                    version = index,
                    kind = self.table.symbol_name(raw.kind),
                    position,
                    "refused zero-width external"
                );
                allow = false;
                raw = self.lex(position, LexState::Mode(mode), &scanner_state, allow);
            }
            let extra = self.is_extra(raw.kind);
            let token = self.make_token(&raw, mode, extra, allow)?;
            let lexed = Lexed { token, start: raw.start };
            if extra {
                position = raw.end;
                allow = !raw.blocks_empty_external();
                scanner_state = raw.scanner_after;
                extras.push(lexed);
                continue;
            }
            return Ok(Lookahead {
                extras,
                token: lexed,
                mode,
                scanner_before: scanner_state,
                allow_empty_external: allow,
            });
        }
    }

    pub(super) fn is_extra(&self, kind: SyntaxKind) -> bool {
        kind != SyntaxKind::END && !kind.is_error() && self.table.is_extra(kind)
    }

    /// Lex one token at `position`, reusing an old token when the lexer
    /// would provably produce it again.
    pub(super) fn lex(&mut self, position: usize, state: LexState, scanner_state: &ScannerState, allow: bool) -> RawToken {
        if let LexState::Mode(mode) = state
            && self.versions.len() == 1
            && let Some(reused) = self.reuse.as_ref().and_then(|reuse| reuse.token_at(position))
        {
            let token = reused.token;
            let flags = token.flags();
            if token.lex_mode() == mode
                && token.scanner_state() == scanner_state
                && flags.contains(NodeFlags::NO_EMPTY_EXTERNAL) != allow
                && !flags.contains(NodeFlags::FRAGILE)
                && !self.table.is_external(token.kind())
            {
                self.stats.reused_tokens += 1;
                let end = position + token.text_len().to_usize();
                return RawToken {
                    kind: token.kind(),
                    start: position,
                    end,
                    examined: end + token.examined().to_usize(),
                    external: false,
                    scanner_after: scanner_state.clone(),
                    reused: Some(token),
                };
            }
        }

        let scanner = match self.scanner.as_mut() {
            Some(scanner) => {
                if self.loaded.as_ref() != Some(scanner_state) {
                    scanner.deserialize(scanner_state);
                    self.loaded = Some(scanner_state.clone());
                }
                Some(scanner.as_mut())
            }
            None => None,
        };
        let lexeme = self.lexer.next_token(self.text, position, state, scanner, allow);
        let scanner_after = match lexeme.scanner_state {
            Some(after) => {
                self.loaded = Some(after.clone());
                after
            }
            None => scanner_state.clone(),
        };
        RawToken {
            kind: lexeme.kind,
            start: lexeme.start,
            end: lexeme.end,
            examined: lexeme.examined,
            external: lexeme.external,
            scanner_after,
            reused: None,
        }
    }

    /// Turn a lexed token into a green token, sharing the reused one when its
    /// flags still fit.
    pub(super) fn make_token(&mut self, raw: &RawToken, mode: u16, extra: bool, allow: bool) -> Result<Arc<GreenToken>, Cancelled> {
        let mut flags = NodeFlags::NONE;
        if extra {
            flags = flags | NodeFlags::EXTRA;
        }
        if raw.kind.is_error() {
            flags = flags | NodeFlags::ERROR;
        }
        if !allow {
            flags = flags | NodeFlags::NO_EMPTY_EXTERNAL;
        }
        if self.versions.len() > 1 {
            flags = flags | NodeFlags::FRAGILE;
        }
        if let Some(token) = &raw.reused
            && token.flags() == flags
        {
            return Ok(token.clone());
        }
        self.count_node()?;
        let bytes = &self.text[raw.start..raw.end];
        let token = GreenToken::from_bytes_len(raw.kind, CompactString::from_utf8_lossy(bytes), TextSize::of(bytes.len()))
            .with_flags(flags)
            .with_lex_info(mode, TextSize::of(raw.examined.saturating_sub(raw.end)), raw.scanner_after.clone());
        Ok(Arc::new(token))
    }

    /// Push an old subtree in place of parsing it again.
    fn reuse_node(&mut self, index: usize) -> bool {
        let Some(reuse) = &self.reuse else {
            return false;
        };
        let version = &self.versions[index];
        let Some(lookahead) = &version.lookahead else {
            return false;
        };
        let token = &lookahead.token.token;
        if lookahead.mode == ERROR_LEX_MODE || token.flags().contains(NodeFlags::MISSING) {
            return false;
        }
        let state = version.head.state;
        let found = reuse.nodes_at(lookahead.token.start).find_map(|candidate| {
            if candidate.node.parse_state() != state {
                return None;
            }
            let goto = self.table.goto(state, candidate.node.kind())?;
            let first = candidate.node.first_token()?;
            let matches = first.kind() == token.kind()
                && first.text_len() == token.text_len()
                && !self.table.is_external(first.kind())
                && first.lex_mode() == lookahead.mode
                && *first.scanner_state() == lookahead.scanner_before
                && first.flags().contains(NodeFlags::NO_EMPTY_EXTERNAL) != lookahead.allow_empty_external;
            matches.then_some((candidate, goto))
        });
        let Some((candidate, goto)) = found else {
            return false;
        };

        let version = &mut self.versions[index];
        let Some(lookahead) = version.lookahead.take() else {
            return false;
        };
        let mut head = push_extras(&version.head, lookahead.extras);
        let scanner_after = candidate
            .node
            .last_token()
            .map_or_else(|| head.scanner_state.clone(), |token| token.scanner_state().clone());
        tracing::trace!(
            kind = self.table.symbol_name(candidate.node.kind()),
            offset = head.position,
            len = candidate.node.text_len().to_usize(),
            "reused subtree"
        );
        head = StackEntry::push(&head, goto, GreenElement::Node(candidate.node), false, scanner_after);
        version.head = head;
        version.forced_mode = candidate.next_lex_mode;
        version.reductions = 0;
        version.missing = 0;
        self.stats.reused_nodes += 1;
        true
    }

    fn shift(&mut self, index: usize, state: StateId) {
        let version = &mut self.versions[index];
        let Some(lookahead) = version.lookahead.take() else {
            return;
        };
        let head = push_extras(&version.head, lookahead.extras);
        let token = lookahead.token.token;
        if !token.flags().contains(NodeFlags::MISSING) {
            version.missing = 0;
        }
        let scanner_after = token.scanner_state().clone();
        version.head = StackEntry::push(&head, state, GreenElement::Token(token), false, scanner_after);
        version.reductions = 0;
    }

    /// Pop the right-hand side of `production` and push the node built from
    /// it. Returns `false` if the table has no goto for the result.
    fn reduce(&mut self, index: usize, production: ProductionId) -> Result<bool, Cancelled> {
        let table = self.table;
        let Some(production) = table.production(production) else {
            return Ok(false);
        };
        let fragile = self.versions.len() > 1;
        let head = self.versions[index].head.clone();

        let mut trailing = Vec::new();
        let mut popped = Vec::new();
        let mut remaining = production.len;
        let mut base = head.clone();
        while remaining > 0 {
            let Some(below) = base.prev.clone() else {
                break;
            };
            if base.extra && popped.is_empty() {
                trailing.push(base.clone());
            } else {
                if !base.extra {
                    remaining -= 1;
                }
                popped.push(base.clone());
            }
            base = below;
        }

        let mut children = Vec::with_capacity(popped.len());
        let mut position = 0;
        for entry in popped.iter().rev() {
            let Some(element) = entry.element.clone() else {
                continue;
            };
            let field = if entry.extra {
                None
            } else {
                position += 1;
                production.field_at(position - 1)
            };
            children.push(GreenChild::new(field, element));
        }
        if table.is_visible(production.lhs) {
            children = flatten_hidden(table, children);
        }

        let Some(state) = table.goto(base.state, production.lhs) else {
            return Ok(false);
        };
        self.count_node()?;
        let flags = if fragile { NodeFlags::FRAGILE } else { NodeFlags::NONE };
        let node = GreenNode::new(production.lhs, children, flags, base.state);
        let scanner_after = popped.first().map_or_else(|| head.scanner_state.clone(), |entry| entry.scanner_state.clone());

        let mut new_head = StackEntry::push(&base, state, GreenElement::Node(node), false, scanner_after);
        for entry in trailing.iter().rev() {
            if let Some(element) = entry.element.clone() {
                new_head = StackEntry::push(&new_head, state, element, true, entry.scanner_state.clone());
            }
        }
        let version = &mut self.versions[index];
        version.head = new_head;
        version.reductions += 1;
        Ok(true)
    }

    /// Build the root from an accepting version.
    fn accept(&mut self, index: usize) -> Result<Arc<GreenNode>, Cancelled> {
        let version = &self.versions[index];
        let start = self.table.start_kind();
        let mut children = Vec::new();
        for entry in version.head.collect().iter().skip(1) {
            match &entry.element {
                Some(GreenElement::Node(node)) if !entry.extra && node.kind() == start => {
                    children.extend(node.children().iter().cloned());
                }
                Some(element) => children.push(GreenChild::new(None, element.clone())),
                None => {}
            }
        }
        if let Some(lookahead) = &version.lookahead {
            children.extend(
                lookahead
                    .extras
                    .iter()
                    .map(|extra| GreenChild::new(None, GreenElement::Token(extra.token.clone()))),
            );
        }
        let children = flatten_hidden(self.table, children);
        self.count_node()?;
        Ok(GreenNode::new(start, children, NodeFlags::NONE, 0))
    }
}

fn same_configuration(a: &Version, b: &Version) -> bool {
    let lookaheads_agree = match (&a.lookahead, &b.lookahead) {
        (None, None) => true,
        (Some(x), Some(y)) => x.token.kind() == y.token.kind() && x.token.start == y.token.start,
        _ => false,
    };
    a.head.state == b.head.state
        && a.head.position == b.head.position
        && a.head.scanner_state == b.head.scanner_state
        && a.forced_mode == b.forced_mode
        && lookaheads_agree
}

pub(super) fn push_extras(head: &Arc<StackEntry>, extras: Vec<Lexed>) -> Arc<StackEntry> {
    let mut head = head.clone();
    for extra in extras {
        let scanner_after = extra.token.scanner_state().clone();
        head = StackEntry::push(&head, head.state, GreenElement::Token(extra.token), true, scanner_after);
    }
    head
}

/// Splice the children of hidden nodes into their parent, recursively.
/// A field on a hidden node carries over to those of its children that
/// have none.
pub(super) fn flatten_hidden(table: &ParseTable, children: Vec<GreenChild>) -> Vec<GreenChild> {
    let hidden = |child: &GreenChild| matches!(&child.element, GreenElement::Node(node) if !table.is_visible(node.kind()));
    if !children.iter().any(hidden) {
        return children;
    }
    let mut flat = Vec::with_capacity(children.len());
    let mut work: Vec<GreenChild> = children.into_iter().rev().collect();
    while let Some(child) = work.pop() {
        match &child.element {
            GreenElement::Node(node) if !table.is_visible(node.kind()) => {
                for inner in node.children().iter().rev() {
                    work.push(GreenChild::new(inner.field.or(child.field), inner.element.clone()));
                }
            }
            _ => flat.push(child),
        }
    }
    flat
}
