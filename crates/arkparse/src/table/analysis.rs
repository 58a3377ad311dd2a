//! Grammar analysis over lowered productions: nullability, FIRST sets and
//! the structural checks that reject grammars the automaton cannot handle.

use crate::error::GrammarError;
use crate::table::TokenSet;
use crate::table::lower::{LoweredGrammar, Step};

pub(crate) struct FirstSets {
    pub nullable: Vec<bool>,
    pub first: Vec<TokenSet>,
}

impl FirstSets {
    pub fn compute(grammar: &LoweredGrammar) -> Self {
        let count = grammar.symbols.len();
        let terminals = grammar.terminal_count as usize;
        let mut nullable = vec![false; count];
        let mut first = vec![TokenSet::with_capacity(terminals + 1); count];
        for (t, set) in first.iter_mut().enumerate().take(terminals) {
            set.insert(t);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for production in &grammar.productions {
                let lhs = production.lhs as usize;
                let mut all_nullable = true;
                for step in &production.steps {
                    let symbol = step.symbol as usize;
                    if symbol != lhs {
                        let (head, tail) = split_pair(&mut first, lhs, symbol);
                        changed |= head.union_with(tail);
                    }
                    if !nullable[symbol] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !nullable[lhs] {
                    nullable[lhs] = true;
                    changed = true;
                }
            }
        }

        Self { nullable, first }
    }

    /// FIRST of `steps`, plus `lookahead` when every step is nullable.
    pub fn first_of(&self, steps: &[Step], lookahead: &TokenSet) -> TokenSet {
        let mut result = TokenSet::new();
        for step in steps {
            result.union_with(&self.first[step.symbol as usize]);
            if !self.nullable[step.symbol as usize] {
                return result;
            }
        }
        result.union_with(lookahead);
        result
    }

    pub fn all_nullable(&self, steps: &[Step]) -> bool {
        steps.iter().all(|s| self.nullable[s.symbol as usize])
    }
}

/// Borrow `sets[a]` mutably and `sets[b]` shared, `a != b`.
fn split_pair(sets: &mut [TokenSet], a: usize, b: usize) -> (&mut TokenSet, &TokenSet) {
    if a < b {
        let (left, right) = sets.split_at_mut(b);
        (&mut left[a], &right[0])
    } else {
        let (left, right) = sets.split_at_mut(a);
        (&mut right[0], &left[b])
    }
}

/// Reject grammars with left recursion that has no base case, rules that
/// derive no finite input, derivation cycles, and unreachable rules.
pub(crate) fn check(grammar: &LoweredGrammar, sets: &FirstSets) -> Result<(), GrammarError> {
    let count = grammar.symbols.len();
    let is_nonterminal = |s: u16| !grammar.is_terminal(s);

    let mut productive = vec![false; count];
    for flag in productive.iter_mut().take(grammar.terminal_count as usize) {
        *flag = true;
    }
    let mut changed = true;
    while changed {
        changed = false;
        for production in &grammar.productions {
            let lhs = production.lhs as usize;
            if !productive[lhs] && production.steps.iter().all(|s| productive[s.symbol as usize]) {
                productive[lhs] = true;
                changed = true;
            }
        }
    }

    // A -> B when B can begin A (left edges) or A can derive B alone (unit edges).
    let mut left_edges = vec![Vec::new(); count];
    let mut unit_edges = vec![Vec::new(); count];
    for production in &grammar.productions {
        let lhs = production.lhs as usize;
        for (i, step) in production.steps.iter().enumerate() {
            if is_nonterminal(step.symbol) {
                left_edges[lhs].push(step.symbol as usize);
                let (before, after) = (&production.steps[..i], &production.steps[i + 1..]);
                if sets.all_nullable(before) && sets.all_nullable(after) {
                    unit_edges[lhs].push(step.symbol as usize);
                }
            }
            if !sets.nullable[step.symbol as usize] {
                break;
            }
        }
    }

    let mut left_recursive = Vec::new();
    let mut unproductive = Vec::new();
    for symbol in grammar.user_rules.clone() {
        let index = symbol as usize;
        if productive[index] {
            continue;
        }
        if reaches(&left_edges, index, index) {
            left_recursive.push(symbol);
        } else {
            unproductive.push(symbol);
        }
    }
    if !left_recursive.is_empty() {
        return Err(GrammarError::UnresolvedLeftRecursion {
            rules: origin_names(grammar, &left_recursive),
        });
    }

    let cyclic: Vec<u16> = (grammar.terminal_count..count as u16)
        .filter(|s| reaches(&unit_edges, *s as usize, *s as usize))
        .collect();
    if !cyclic.is_empty() {
        return Err(GrammarError::UnresolvedLeftRecursion {
            rules: origin_names(grammar, &cyclic),
        });
    }
    if !unproductive.is_empty() {
        return Err(GrammarError::UnproductiveRule {
            rules: origin_names(grammar, &unproductive),
        });
    }

    let mut reachable = vec![false; count];
    let mut stack = vec![grammar.start as usize];
    reachable[grammar.start as usize] = true;
    while let Some(symbol) = stack.pop() {
        for id in &grammar.by_lhs[symbol] {
            for step in &grammar.productions[*id as usize].steps {
                let target = step.symbol as usize;
                if !reachable[target] {
                    reachable[target] = true;
                    stack.push(target);
                }
            }
        }
    }
    let unreachable: Vec<u16> = grammar
        .user_rules
        .clone()
        .filter(|s| !reachable[*s as usize])
        .collect();
    if !unreachable.is_empty() {
        return Err(GrammarError::UnreachableRule {
            rules: origin_names(grammar, &unreachable),
        });
    }
    Ok(())
}

/// Whether `to` is reachable from `from` by at least one edge.
fn reaches(edges: &[Vec<usize>], from: usize, to: usize) -> bool {
    let mut seen = vec![false; edges.len()];
    let mut stack: Vec<usize> = edges[from].clone();
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !std::mem::replace(&mut seen[node], true) {
            stack.extend_from_slice(&edges[node]);
        }
    }
    false
}

fn origin_names(grammar: &LoweredGrammar, symbols: &[u16]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for symbol in symbols {
        let name = grammar.origin_name(*symbol);
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, TokenPattern};
    use crate::table::lower::lower;

    fn analyze(builder: GrammarBuilder) -> Result<(), GrammarError> {
        let lowered = lower(&builder.build().unwrap(), 256)?;
        let sets = FirstSets::compute(&lowered);
        check(&lowered, &sets)
    }

    fn base() -> GrammarBuilder {
        GrammarBuilder::new("t")
            .start("s")
            .token("x", TokenPattern::literal("x"))
    }

    #[test]
    fn test_nullable_and_first() {
        let lowered = lower(
            &base()
                .rule("s", Expr::seq([Expr::optional(Expr::sym("a")), Expr::lit("y")]))
                .rule("a", Expr::sym("x"))
                .build()
                .unwrap(),
            256,
        )
        .unwrap();
        let sets = FirstSets::compute(&lowered);
        let s = lowered.start as usize;
        assert!(!sets.nullable[s]);
        let first: Vec<&str> = sets.first[s].iter().map(|t| lowered.name(t as u16)).collect();
        assert_eq!(first, vec!["x", "y"]);
    }

    #[test]
    fn test_left_recursion_with_base_case_is_accepted() {
        let result = analyze(base().rule(
            "s",
            Expr::choice([Expr::seq([Expr::sym("s"), Expr::lit("+"), Expr::sym("x")]), Expr::sym("x")]),
        ));
        assert!(result.is_ok());
    }

    #[test]
    fn test_left_recursion_without_base_case() {
        let err = analyze(
            base()
                .rule("s", Expr::seq([Expr::sym("a"), Expr::sym("x")]))
                .rule("a", Expr::seq([Expr::sym("a"), Expr::lit("+")])),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GrammarError::UnresolvedLeftRecursion {
                rules: vec!["a".into()]
            }
        );
    }

    #[test]
    fn test_unit_cycle_rejected() {
        let err = analyze(
            base()
                .rule("s", Expr::choice([Expr::sym("a"), Expr::sym("x")]))
                .rule("a", Expr::choice([Expr::sym("s"), Expr::lit("y")])),
        )
        .unwrap_err();
        assert!(matches!(err, GrammarError::UnresolvedLeftRecursion { .. }));
    }

    #[test]
    fn test_unreachable_rule() {
        let err = analyze(
            base()
                .rule("s", Expr::sym("x"))
                .rule("orphan", Expr::lit("y")),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GrammarError::UnreachableRule {
                rules: vec!["orphan".into()]
            }
        );
    }

    #[test]
    fn test_unproductive_rule() {
        let err = analyze(
            base()
                .rule("s", Expr::choice([Expr::sym("x"), Expr::sym("b")]))
                .rule("b", Expr::seq([Expr::lit("("), Expr::sym("b"), Expr::lit(")")])),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GrammarError::UnproductiveRule {
                rules: vec!["b".into()]
            }
        );
    }
}
