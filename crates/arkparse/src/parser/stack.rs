//! Graph-structured parse stack
//!
//! Each version's stack is a linked list of `Arc`ed entries, so forking a
//! version copies one pointer and the versions share everything below the
//! split.

use crate::lexer::ScannerState;
use crate::syntax::{GreenElement, GreenToken, NodeFlags, SyntaxKind, TextSize};
use crate::table::{Action, ParseTable, StateId};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct StackEntry {
    /// State after this entry; extras repeat the state below them
    pub state: StateId,
    /// `None` only for the bottom entry
    pub element: Option<GreenElement>,
    /// Trivia or an error node; not counted by reductions
    pub extra: bool,
    /// Byte offset just past this entry
    pub position: usize,
    /// External scanner state after this entry
    pub scanner_state: ScannerState,
    pub prev: Option<Arc<StackEntry>>,
}

impl StackEntry {
    pub fn bottom(state: StateId) -> Arc<Self> {
        Arc::new(Self {
            state,
            element: None,
            extra: false,
            position: 0,
            scanner_state: ScannerState::new(),
            prev: None,
        })
    }

    pub fn push(
        prev: &Arc<Self>,
        state: StateId,
        element: GreenElement,
        extra: bool,
        scanner_state: ScannerState,
    ) -> Arc<Self> {
        let position = prev.position + element.text_len().to_usize();
        Arc::new(Self {
            state,
            element: Some(element),
            extra,
            position,
            scanner_state,
            prev: Some(prev.clone()),
        })
    }

    /// Whether this entry ends with a zero-width external token, in which
    /// case another one must not follow at the same offset.
    pub fn ends_with_empty_external(&self, table: &ParseTable) -> bool {
        self.element
            .as_ref()
            .and_then(GreenElement::last_token)
            .is_some_and(|token| is_empty_external(token, table))
    }

    /// Entries from the bottom up.
    pub fn collect(self: &Arc<Self>) -> Vec<Arc<Self>> {
        let mut entries = Vec::new();
        let mut current = Some(self.clone());
        while let Some(entry) = current {
            current = entry.prev.clone();
            entries.push(entry);
        }
        entries.reverse();
        entries
    }
}

impl Drop for StackEntry {
    fn drop(&mut self) {
        let mut prev = self.prev.take();
        while let Some(entry) = prev {
            match Arc::try_unwrap(entry) {
                Ok(mut entry) => prev = entry.prev.take(),
                Err(_) => break,
            }
        }
    }
}

fn is_empty_external(token: &GreenToken, table: &ParseTable) -> bool {
    token.text_len() == TextSize::zero()
        && table.is_external(token.kind())
        && !token.flags().contains(NodeFlags::MISSING)
}

/// Parse states only, for trying actions without building anything.
///
/// Starts as a view of a real stack's non-extra entries and copies states
/// as they are popped and pushed.
#[derive(Debug, Clone)]
pub(crate) struct SimStack {
    pushed: Vec<StateId>,
    rest: Option<Arc<StackEntry>>,
}

/// Bound on simulated reductions for one lookahead
const MAX_SIMULATED_STEPS: usize = 4096;

impl SimStack {
    pub fn new(top: &Arc<StackEntry>) -> Self {
        Self {
            pushed: Vec::new(),
            rest: skip_extras(Some(top.clone())),
        }
    }

    pub fn top(&self) -> Option<StateId> {
        self.pushed.last().copied().or_else(|| self.rest.as_ref().map(|entry| entry.state))
    }

    fn pop(&mut self, count: usize) {
        for _ in 0..count {
            if self.pushed.pop().is_none() {
                let below = self.rest.as_ref().and_then(|entry| entry.prev.clone());
                self.rest = skip_extras(below);
            }
        }
    }

    /// Run `kind`'s first actions until it is shifted or accepted. Returns
    /// `false` if some state on the way has no action for it.
    pub fn advance(&mut self, table: &ParseTable, kind: SyntaxKind) -> bool {
        for _ in 0..MAX_SIMULATED_STEPS {
            let Some(state) = self.top() else {
                return false;
            };
            let Some(action) = table.actions(state, kind).first() else {
                return false;
            };
            match self.apply(table, *action) {
                Step::Consumed => return true,
                Step::Reduced => {}
                Step::Dead => return false,
            }
        }
        false
    }

    /// Whether `kind` is eventually shifted or accepted along any path
    /// through the split points on the way.
    pub fn can_shift(&self, table: &ParseTable, kind: SyntaxKind) -> bool {
        let mut pending = vec![self.clone()];
        let mut steps = 0;
        while let Some(mut sim) = pending.pop() {
            while steps < MAX_SIMULATED_STEPS {
                steps += 1;
                let Some(state) = sim.top() else {
                    break;
                };
                let Some((first, rest)) = table.actions(state, kind).split_first() else {
                    break;
                };
                for action in rest {
                    let mut fork = sim.clone();
                    match fork.apply(table, *action) {
                        Step::Consumed => return true,
                        Step::Reduced => pending.push(fork),
                        Step::Dead => {}
                    }
                }
                match sim.apply(table, *first) {
                    Step::Consumed => return true,
                    Step::Reduced => {}
                    Step::Dead => break,
                }
            }
        }
        false
    }

    fn apply(&mut self, table: &ParseTable, action: Action) -> Step {
        match action {
            Action::Shift(next) => {
                self.pushed.push(next);
                Step::Consumed
            }
            Action::Accept => Step::Consumed,
            Action::Reduce(id) => {
                let Some(production) = table.production(id) else {
                    return Step::Dead;
                };
                self.pop(production.len as usize);
                let Some(next) = self.top().and_then(|base| table.goto(base, production.lhs)) else {
                    return Step::Dead;
                };
                self.pushed.push(next);
                Step::Reduced
            }
        }
    }
}

enum Step {
    Consumed,
    Reduced,
    Dead,
}

fn skip_extras(mut entry: Option<Arc<StackEntry>>) -> Option<Arc<StackEntry>> {
    while let Some(current) = &entry {
        if !current.extra {
            break;
        }
        entry = current.prev.clone();
    }
    entry
}
