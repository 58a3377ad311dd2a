//! LALR(1) automaton
//!
//! Builds the LR(0) item-set automaton, then computes LALR lookaheads by
//! spontaneous generation and propagation over kernel items.

use crate::error::GrammarError;
use crate::table::TokenSet;
use crate::table::analysis::FirstSets;
use crate::table::lower::LoweredGrammar;
use hashbrown::HashMap;
use std::collections::BTreeMap;

/// Production with a position marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Item {
    pub production: u32,
    pub dot: u16,
}

impl Item {
    const fn advance(self) -> Self {
        Self {
            production: self.production,
            dot: self.dot + 1,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LrState {
    pub kernel: Vec<Item>,
    /// LR(0) closure of the kernel, kernel items first
    pub items: Vec<Item>,
    /// Sorted by symbol
    pub transitions: Vec<(u16, u32)>,
    /// Completed items and their lookaheads
    pub reductions: Vec<(u32, TokenSet)>,
}

impl LrState {
    pub fn transition(&self, symbol: u16) -> Option<u32> {
        self.transitions
            .binary_search_by_key(&symbol, |(s, _)| *s)
            .ok()
            .map(|i| self.transitions[i].1)
    }
}

struct Builder<'a> {
    grammar: &'a LoweredGrammar,
    sets: &'a FirstSets,
}

pub(crate) fn build(grammar: &LoweredGrammar, sets: &FirstSets) -> Result<Vec<LrState>, GrammarError> {
    let builder = Builder { grammar, sets };
    let mut states = builder.lr0_states()?;
    builder.lookaheads(&mut states);
    tracing::debug!(states = states.len(), "built LALR automaton");
    Ok(states)
}

impl Builder<'_> {
    fn next_symbol(&self, item: Item) -> Option<u16> {
        self.grammar.productions[item.production as usize]
            .steps
            .get(item.dot as usize)
            .map(|s| s.symbol)
    }

    fn lr0_closure(&self, kernel: &[Item]) -> Vec<Item> {
        let mut items = kernel.to_vec();
        let mut expanded = vec![false; self.grammar.symbols.len()];
        let mut i = 0;
        while i < items.len() {
            if let Some(symbol) = self.next_symbol(items[i])
                && !self.grammar.is_terminal(symbol)
                && !std::mem::replace(&mut expanded[symbol as usize], true)
            {
                for production in &self.grammar.by_lhs[symbol as usize] {
                    items.push(Item {
                        production: *production,
                        dot: 0,
                    });
                }
            }
            i += 1;
        }
        items
    }

    fn lr0_states(&self) -> Result<Vec<LrState>, GrammarError> {
        let initial = vec![Item { production: 0, dot: 0 }];
        let mut index: HashMap<Vec<Item>, u32, ahash::RandomState> = HashMap::default();
        index.insert(initial.clone(), 0);
        let mut states = vec![LrState {
            kernel: initial,
            items: Vec::new(),
            transitions: Vec::new(),
            reductions: Vec::new(),
        }];

        let mut current = 0;
        while current < states.len() {
            let items = self.lr0_closure(&states[current].kernel);
            let mut successors: BTreeMap<u16, Vec<Item>> = BTreeMap::new();
            for item in &items {
                if let Some(symbol) = self.next_symbol(*item) {
                    successors.entry(symbol).or_default().push(item.advance());
                }
            }
            let mut transitions = Vec::with_capacity(successors.len());
            for (symbol, mut kernel) in successors {
                kernel.sort_unstable();
                kernel.dedup();
                let target = if let Some(existing) = index.get(&kernel) {
                    *existing
                } else {
                    let id = u32::try_from(states.len()).map_err(|_| GrammarError::TooLarge {
                        what: "too many parse states".into(),
                    })?;
                    index.insert(kernel.clone(), id);
                    states.push(LrState {
                        kernel,
                        items: Vec::new(),
                        transitions: Vec::new(),
                        reductions: Vec::new(),
                    });
                    id
                };
                transitions.push((symbol, target));
            }
            states[current].items = items;
            states[current].transitions = transitions;
            current += 1;
        }
        Ok(states)
    }

    /// LR(1) closure of `seeds`; items are merged by core.
    fn lr1_closure(&self, seeds: Vec<(Item, TokenSet)>) -> Vec<(Item, TokenSet)> {
        let mut items = seeds;
        let mut position: HashMap<Item, usize, ahash::RandomState> = HashMap::default();
        for (i, (item, _)) in items.iter().enumerate() {
            position.insert(*item, i);
        }
        let mut worklist: Vec<usize> = (0..items.len()).collect();
        while let Some(i) = worklist.pop() {
            let (item, lookahead) = (items[i].0, items[i].1.clone());
            let Some(symbol) = self.next_symbol(item) else { continue };
            if self.grammar.is_terminal(symbol) {
                continue;
            }
            let rest = &self.grammar.productions[item.production as usize].steps[item.dot as usize + 1..];
            let follow = self.sets.first_of(rest, &lookahead);
            for production in &self.grammar.by_lhs[symbol as usize] {
                let child = Item {
                    production: *production,
                    dot: 0,
                };
                if let Some(&j) = position.get(&child) {
                    if items[j].1.union_with(&follow) {
                        worklist.push(j);
                    }
                } else {
                    position.insert(child, items.len());
                    worklist.push(items.len());
                    items.push((child, follow.clone()));
                }
            }
        }
        items
    }

    fn lookaheads(&self, states: &mut [LrState]) {
        let dummy = self.grammar.terminal_count as usize;
        let mut lookaheads: Vec<Vec<TokenSet>> = states
            .iter()
            .map(|s| vec![TokenSet::with_capacity(dummy + 1); s.kernel.len()])
            .collect();
        lookaheads[0][0].insert(0);

        let mut propagation: Vec<((usize, usize), (usize, usize))> = Vec::new();
        for (state_id, state) in states.iter().enumerate() {
            for (k, kernel_item) in state.kernel.iter().enumerate() {
                let seed: TokenSet = std::iter::once(dummy).collect();
                for (item, lookahead) in self.lr1_closure(vec![(*kernel_item, seed)]) {
                    let Some(symbol) = self.next_symbol(item) else { continue };
                    let Some(target) = state.transition(symbol) else { continue };
                    let target = target as usize;
                    let Ok(target_index) = states[target].kernel.binary_search(&item.advance()) else {
                        continue;
                    };
                    let mut spontaneous = lookahead.clone();
                    spontaneous.remove(dummy);
                    lookaheads[target][target_index].union_with(&spontaneous);
                    if lookahead.contains(dummy) {
                        propagation.push(((state_id, k), (target, target_index)));
                    }
                }
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &((from_state, from_item), (to_state, to_item)) in &propagation {
                if from_state == to_state && from_item == to_item {
                    continue;
                }
                let source = lookaheads[from_state][from_item].clone();
                changed |= lookaheads[to_state][to_item].union_with(&source);
            }
        }

        for (state, kernel_lookaheads) in states.iter_mut().zip(lookaheads) {
            let seeds = state.kernel.iter().copied().zip(kernel_lookaheads).collect();
            state.reductions = self
                .lr1_closure(seeds)
                .into_iter()
                .filter(|(item, _)| self.next_symbol(*item).is_none())
                .map(|(item, lookahead)| (item.production, lookahead))
                .collect();
            state.reductions.sort_unstable_by_key(|(production, _)| *production);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, TokenPattern};
    use crate::table::lower::lower;

    /// The classic LALR-but-not-SLR grammar:
    /// S -> L = R | R; L -> * R | id; R -> L
    #[test]
    fn test_lalr_lookaheads_avoid_slr_conflict() {
        let grammar = GrammarBuilder::new("t")
            .start("s")
            .token("id", TokenPattern::regex("[a-z]+"))
            .rule(
                "s",
                Expr::choice([Expr::seq([Expr::sym("l"), Expr::lit("="), Expr::sym("r")]), Expr::sym("r")]),
            )
            .rule(
                "l",
                Expr::choice([Expr::seq([Expr::lit("*"), Expr::sym("r")]), Expr::sym("id")]),
            )
            .rule("r", Expr::sym("l"))
            .build()
            .unwrap();
        let lowered = lower(&grammar, 256).unwrap();
        let sets = FirstSets::compute(&lowered);
        let states = build(&lowered, &sets).unwrap();

        let equals = lowered.symbols.iter().position(|s| s.name == "=").unwrap();
        for state in &states {
            let shifts_equals = state.transition(equals as u16).is_some();
            let reduces_on_equals = state.reductions.iter().any(|(_, la)| la.contains(equals));
            assert!(!(shifts_equals && reduces_on_equals), "shift/reduce conflict on `=`");
        }
    }

    #[test]
    fn test_accept_state_reduces_on_end() {
        let grammar = GrammarBuilder::new("t")
            .start("s")
            .rule("s", Expr::lit("x"))
            .build()
            .unwrap();
        let lowered = lower(&grammar, 256).unwrap();
        let sets = FirstSets::compute(&lowered);
        let states = build(&lowered, &sets).unwrap();
        let after_start = states[0].transition(lowered.start).unwrap() as usize;
        let reduction = states[after_start]
            .reductions
            .iter()
            .find(|(production, _)| *production == 0)
            .unwrap();
        assert_eq!(reduction.1.iter().collect::<Vec<_>>(), vec![0]);
    }
}
