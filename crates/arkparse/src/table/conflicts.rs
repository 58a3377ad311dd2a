//! Conflict resolution
//!
//! Candidates for one `(state, terminal)` pair are narrowed by each strategy
//! in the configured order. Whatever remains after all strategies is either
//! kept as a GLR split point or reported as an error.

use crate::error::GrammarError;
use crate::grammar::{Assoc, Precedence};
use crate::table::compile::{CompileOptions, ConflictStrategy};
use crate::table::lower::LoweredGrammar;
use crate::table::Action;
use smallvec::SmallVec;

#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub action: Action,
    pub prec: Option<Precedence>,
    /// User rules the action continues or completes
    pub rules: SmallVec<[u16; 2]>,
}

impl Candidate {
    const fn is_shift(&self) -> bool {
        matches!(self.action, Action::Shift(_))
    }

    /// Shift first, then reduces by production
    const fn order(&self) -> (u8, u32) {
        match self.action {
            Action::Shift(_) => (0, 0),
            Action::Reduce(id) => (1, id),
            Action::Accept => (2, 0),
        }
    }

    fn level(&self) -> i32 {
        self.prec.map_or(0, |p| p.level)
    }
}

pub(crate) struct ConflictResolver<'a> {
    grammar: &'a LoweredGrammar,
    options: &'a CompileOptions,
    /// Rank of each user rule in the preference list
    ranks: Vec<Option<usize>>,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(grammar: &'a LoweredGrammar, options: &'a CompileOptions, preferences: &[String]) -> Self {
        let ranks = grammar
            .symbols
            .iter()
            .map(|symbol| preferences.iter().position(|p| *p == symbol.name))
            .collect();
        Self {
            grammar,
            options,
            ranks,
        }
    }

    /// Narrow `candidates` (shift first, then reduces by production).
    ///
    /// Returns the surviving actions and whether they form a split point.
    pub fn resolve(
        &self,
        state: u32,
        symbol: u16,
        mut candidates: Vec<Candidate>,
    ) -> Result<(SmallVec<[Action; 1]>, bool), GrammarError> {
        for strategy in &self.options.conflict_order {
            if candidates.len() <= 1 {
                break;
            }
            let before = candidates.len();
            candidates = match strategy {
                ConflictStrategy::Precedence => by_precedence(candidates),
                ConflictStrategy::Directives => self.by_directive(candidates),
            };
            if candidates.len() < before {
                tracing::trace!(
                    state,
                    symbol = self.grammar.name(symbol),
                    ?strategy,
                    remaining = candidates.len(),
                    "narrowed conflict"
                );
            }
        }

        let actions: SmallVec<[Action; 1]> = candidates.iter().map(|c| c.action).collect();
        if actions.len() <= 1 {
            return Ok((actions, false));
        }
        if self.options.glr_fallback {
            tracing::trace!(state, symbol = self.grammar.name(symbol), "GLR split point");
            return Ok((actions, true));
        }

        let mut rules: Vec<String> = Vec::new();
        for candidate in &candidates {
            for rule in &candidate.rules {
                let name = self.grammar.origin_name(*rule);
                if !rules.iter().any(|r| r == name) {
                    rules.push(name.to_string());
                }
            }
        }
        Err(GrammarError::ConflictWithoutResolution {
            rules,
            symbol: self.grammar.name(symbol).to_string(),
            state,
        })
    }

    fn rank(&self, candidate: &Candidate) -> Option<usize> {
        candidate
            .rules
            .iter()
            .filter_map(|rule| {
                let origin = self.grammar.origin.get(*rule as usize).copied().unwrap_or(*rule);
                self.ranks.get(origin as usize).copied().flatten()
            })
            .min()
    }

    fn by_directive(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let ranks: Vec<Option<usize>> = candidates.iter().map(|c| self.rank(c)).collect();
        let Some(best) = ranks.iter().flatten().min().copied() else {
            return candidates;
        };
        candidates
            .into_iter()
            .zip(ranks)
            .filter(|(_, rank)| *rank == Some(best))
            .map(|(candidate, _)| candidate)
            .collect()
    }
}

/// Compare annotated candidates among themselves. Unannotated candidates
/// have no level to compare and always survive.
fn by_precedence(candidates: Vec<Candidate>) -> Vec<Candidate> {
    if candidates.iter().filter(|c| c.prec.is_some()).count() < 2 {
        return candidates;
    }
    let (annotated, mut kept): (Vec<Candidate>, Vec<Candidate>) =
        candidates.into_iter().partition(|c| c.prec.is_some());
    let max = annotated.iter().map(Candidate::level).max().unwrap_or(0);
    let mut winners: Vec<Candidate> = annotated.into_iter().filter(|c| c.level() == max).collect();

    let has_shift = winners.iter().any(Candidate::is_shift);
    let assocs: Vec<Assoc> = winners
        .iter()
        .filter(|c| !c.is_shift())
        .map(|c| c.prec.map_or(Assoc::None, |p| p.assoc))
        .collect();
    if has_shift && !assocs.is_empty() {
        if assocs.iter().all(|a| *a == Assoc::Left) {
            winners.retain(|c| !c.is_shift());
        } else if assocs.iter().all(|a| *a == Assoc::Right) {
            winners.retain(Candidate::is_shift);
        }
    }
    winners.append(&mut kept);
    winners.sort_by_key(Candidate::order);
    winners
}
