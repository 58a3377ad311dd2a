use crate::error::GrammarError;
use crate::grammar::{Grammar, Precedence, TokenPattern};
use crate::lexer::check_pattern;
use crate::syntax::SyntaxKind;
use crate::table::analysis::{self, FirstSets};
use crate::table::automaton::{self, LrState};
use crate::table::conflicts::{Candidate, ConflictResolver};
use crate::table::lower::{LoweredGrammar, lower};
use crate::table::serial::FORMAT_VERSION;
use crate::table::{Action, ParseTable, Production, TableState, TokenSet};
use hashbrown::HashMap;
use smallvec::{SmallVec, smallvec};
use std::collections::BTreeMap;

/// A way of settling a shift/reduce or reduce/reduce conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ConflictStrategy {
    /// Compare precedence levels, then associativity
    Precedence,
    /// Prefer the rule listed earliest in `#![prefer(...)]`
    Directives,
}

/// Table compiler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CompileOptions {
    /// Strategies tried in order before falling back to GLR
    pub conflict_order: Vec<ConflictStrategy>,
    /// Keep unresolved conflicts as split points instead of failing
    pub glr_fallback: bool,
    /// Expansion limit before a choice is moved into an auxiliary rule
    pub max_inline_alternatives: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            conflict_order: vec![ConflictStrategy::Precedence, ConflictStrategy::Directives],
            glr_fallback: true,
            max_inline_alternatives: 256,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn with_conflict_order(mut self, order: impl Into<Vec<ConflictStrategy>>) -> Self {
        self.conflict_order = order.into();
        self
    }

    #[must_use]
    pub const fn with_glr_fallback(mut self, enabled: bool) -> Self {
        self.glr_fallback = enabled;
        self
    }

    #[must_use]
    pub const fn with_max_inline_alternatives(mut self, limit: usize) -> Self {
        self.max_inline_alternatives = limit;
        self
    }
}

/// Compile `grammar` with default options.
///
/// # Errors
///
/// See [`compile_with_options`].
pub fn compile(grammar: &Grammar) -> Result<ParseTable, GrammarError> {
    compile_with_options(grammar, &CompileOptions::default())
}

/// Compile `grammar` into a parse table.
///
/// # Errors
///
/// Returns [`GrammarError::InvalidPattern`] for a token regex the lexer
/// cannot compile, [`GrammarError::UnresolvedLeftRecursion`],
/// [`GrammarError::UnproductiveRule`] or [`GrammarError::UnreachableRule`]
/// for structurally broken grammars, and
/// [`GrammarError::ConflictWithoutResolution`] when a conflict survives every
/// strategy and GLR fallback is disabled.
pub fn compile_with_options(grammar: &Grammar, options: &CompileOptions) -> Result<ParseTable, GrammarError> {
    for token in grammar.tokens() {
        if let Some(TokenPattern::Regex(regex)) = &token.pattern {
            check_pattern(regex).map_err(|message| GrammarError::InvalidPattern {
                token: grammar.resolve(token.name).to_owned(),
                message,
            })?;
        }
    }
    let lowered = lower(grammar, options.max_inline_alternatives)?;
    tracing::debug!(
        grammar = grammar.name(),
        symbols = lowered.symbols.len(),
        terminals = lowered.terminal_count,
        productions = lowered.productions.len(),
        "lowered grammar"
    );
    let sets = FirstSets::compute(&lowered);
    analysis::check(&lowered, &sets)?;
    let states = automaton::build(&lowered, &sets)?;
    let resolver = ConflictResolver::new(&lowered, options, grammar.preferences());

    let mut table_states = Vec::with_capacity(states.len());
    let mut lex_modes: Vec<TokenSet> = Vec::new();
    let mut lex_mode_index: HashMap<TokenSet, u16, ahash::RandomState> = HashMap::default();
    let mut split_points = 0u32;

    for (id, state) in states.iter().enumerate() {
        let id = id as u32;
        let (actions, splits) = state_actions(&lowered, &resolver, id, state)?;
        split_points += splits;

        let mut valid = TokenSet::with_capacity(lowered.terminal_count as usize);
        for (kind, _) in &actions {
            valid.insert(kind.index());
        }
        let lex_mode = if let Some(existing) = lex_mode_index.get(&valid) {
            *existing
        } else {
            let mode = u16::try_from(lex_modes.len()).map_err(|_| GrammarError::TooLarge {
                what: "too many lexer modes".into(),
            })?;
            lex_mode_index.insert(valid.clone(), mode);
            lex_modes.push(valid);
            mode
        };

        let gotos = state
            .transitions
            .iter()
            .filter(|(symbol, _)| !lowered.is_terminal(*symbol))
            .map(|(symbol, target)| (SyntaxKind(*symbol), *target))
            .collect();
        table_states.push(TableState {
            actions,
            gotos,
            lex_mode,
        });
    }

    if split_points > 0 {
        tracing::warn!(
            grammar = grammar.name(),
            split_points,
            "unresolved conflicts kept as GLR split points"
        );
    }
    tracing::debug!(
        states = table_states.len(),
        lex_modes = lex_modes.len(),
        "compiled parse table"
    );

    let productions = lowered
        .productions
        .iter()
        .map(|p| Production {
            lhs: SyntaxKind(p.lhs),
            len: p.steps.len() as u16,
            fields: if p.steps.iter().any(|s| s.field.is_some()) {
                p.steps.iter().map(|s| s.field).collect()
            } else {
                SmallVec::new()
            },
        })
        .collect();

    let kinds = |ids: &[u16]| ids.iter().copied().map(SyntaxKind).collect::<Vec<_>>();
    Ok(ParseTable {
        format: FORMAT_VERSION,
        grammar_name: lowered.name.clone(),
        fields: lowered.fields.clone(),
        terminal_count: lowered.terminal_count,
        start_kind: SyntaxKind(lowered.start),
        productions,
        states: table_states,
        lex_modes,
        patterns: lowered.patterns.clone(),
        extras: kinds(&lowered.extras),
        externals: kinds(&lowered.externals),
        word: lowered.word.map(SyntaxKind),
        recover: kinds(&lowered.recover),
        split_points,
        symbols: lowered.symbols,
    })
}

type StateActions = Vec<(SyntaxKind, SmallVec<[Action; 1]>)>;

fn state_actions(
    grammar: &LoweredGrammar,
    resolver: &ConflictResolver<'_>,
    id: u32,
    state: &LrState,
) -> Result<(StateActions, u32), GrammarError> {
    let mut candidates: BTreeMap<u16, Vec<Candidate>> = BTreeMap::new();

    for &(symbol, target) in &state.transitions {
        if !grammar.is_terminal(symbol) {
            continue;
        }
        let mut prec: Option<Precedence> = None;
        let mut rules: SmallVec<[u16; 2]> = SmallVec::new();
        for item in &state.items {
            let production = &grammar.productions[item.production as usize];
            let Some(step) = production.steps.get(item.dot as usize) else { continue };
            if step.symbol != symbol {
                continue;
            }
            if let Some(step_prec) = step.prec
                && prec.is_none_or(|p| step_prec.level > p.level)
            {
                prec = Some(step_prec);
            }
            if !rules.contains(&production.lhs) {
                rules.push(production.lhs);
            }
        }
        candidates.entry(symbol).or_default().push(Candidate {
            action: Action::Shift(target),
            prec,
            rules,
        });
    }

    for (production_id, lookahead) in &state.reductions {
        let production = &grammar.productions[*production_id as usize];
        let action = if *production_id == 0 {
            Action::Accept
        } else {
            Action::Reduce(*production_id)
        };
        for terminal in lookahead.iter() {
            let Ok(terminal) = u16::try_from(terminal) else { continue };
            if terminal >= grammar.terminal_count {
                continue;
            }
            candidates.entry(terminal).or_default().push(Candidate {
                action,
                prec: production.prec(),
                rules: smallvec![production.lhs],
            });
        }
    }

    let mut actions = Vec::with_capacity(candidates.len());
    let mut splits = 0;
    for (symbol, list) in candidates {
        let (resolved, split) = resolver.resolve(id, symbol, list)?;
        splits += u32::from(split);
        if !resolved.is_empty() {
            actions.push((SyntaxKind(symbol), resolved));
        }
    }
    Ok((actions, splits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, TokenPattern};

    fn expression_grammar(with_prec: bool) -> Grammar {
        let binary = |op: &str, level: i32| {
            let body = Expr::seq([Expr::sym("_expr"), Expr::lit(op), Expr::sym("_expr")]);
            if with_prec { Expr::prec_left(level, body) } else { body }
        };
        GrammarBuilder::new("expr")
            .start("program")
            .token("number", TokenPattern::regex("[0-9]+"))
            .extra("whitespace", TokenPattern::regex(r"\s+"))
            .rule("program", Expr::sym("_expr"))
            .rule("_expr", Expr::choice([Expr::sym("number"), Expr::sym("binary")]))
            .rule("binary", Expr::choice([binary("+", 1), binary("*", 2)]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_precedence_resolves_all_conflicts() {
        let table = compile(&expression_grammar(true)).unwrap();
        assert_eq!(table.split_point_count(), 0);
        assert_eq!(table.symbol_name(table.start_kind()), "program");
    }

    #[test]
    fn test_unannotated_conflicts_become_split_points() {
        let table = compile(&expression_grammar(false)).unwrap();
        assert!(table.split_point_count() > 0);
        let split = (0..table.state_count() as u32).any(|state| {
            (0..table.terminal_count() as u16).any(|t| {
                let actions = table.actions(state, SyntaxKind(t));
                actions.len() > 1 && matches!(actions[0], Action::Shift(_))
            })
        });
        assert!(split, "split points list the shift first");
    }

    #[test]
    fn test_conflict_without_glr_fallback_fails() {
        let options = CompileOptions::default().with_glr_fallback(false);
        let err = compile_with_options(&expression_grammar(false), &options).unwrap_err();
        match err {
            GrammarError::ConflictWithoutResolution { rules, .. } => {
                assert!(rules.contains(&"binary".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_directives_resolve_reduce_reduce() {
        let grammar = GrammarBuilder::new("t")
            .start("s")
            .token("id", TokenPattern::regex("[a-z]+"))
            .rule("s", Expr::choice([Expr::sym("type_ref"), Expr::sym("value_ref")]))
            .rule("type_ref", Expr::sym("id"))
            .rule("value_ref", Expr::sym("id"))
            .prefer(["value_ref", "type_ref"])
            .build()
            .unwrap();
        let options = CompileOptions::default().with_glr_fallback(false);
        let table = compile_with_options(&grammar, &options).unwrap();
        let value_ref = table.kind_for_name("value_ref").unwrap();
        let reduces_value_ref = (0..table.state_count() as u32).any(|state| {
            table.actions(state, SyntaxKind::END).iter().any(|action| {
                matches!(action, Action::Reduce(p) if table.production(*p).unwrap().lhs == value_ref)
            })
        });
        assert!(reduces_value_ref);

        let directives_off = options.with_conflict_order([ConflictStrategy::Precedence]);
        assert!(compile_with_options(&grammar, &directives_off).is_err());
    }

    #[test]
    fn test_invalid_token_pattern_is_reported() {
        let grammar = GrammarBuilder::new("t")
            .start("s")
            .token("word", TokenPattern::regex(r"\bfoo"))
            .rule("s", Expr::sym("word"))
            .build()
            .unwrap();
        match compile(&grammar).unwrap_err() {
            GrammarError::InvalidPattern { token, .. } => assert_eq!(token, "word"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_lex_modes_follow_state_actions() {
        let table = compile(&expression_grammar(true)).unwrap();
        let number = table.kind_for_name("number").unwrap();
        let initial = table.valid_tokens(table.lex_mode(0)).unwrap();
        assert!(initial.contains(number.index()));
        let plus = table.kind_for_name("+").unwrap();
        assert!(!initial.contains(plus.index()));
    }
}
