//! Grammar lowering
//!
//! Flattens rule expressions into plain productions over numbered symbols.
//! Choices and optionals are expanded in place; repetitions become hidden
//! left-recursive auxiliary rules.

use crate::error::GrammarError;
use crate::grammar::{Expr, Grammar, Precedence, TokenPattern};
use crate::syntax::FieldId;
use crate::table::SymbolInfo;
use hashbrown::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    pub symbol: u16,
    pub field: Option<FieldId>,
    pub prec: Option<Precedence>,
}

#[derive(Debug, Clone)]
pub(crate) struct LoweredProduction {
    pub lhs: u16,
    pub steps: Vec<Step>,
}

impl LoweredProduction {
    /// Precedence used when reducing: that of the last step.
    pub fn prec(&self) -> Option<Precedence> {
        self.steps.last().and_then(|s| s.prec)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoweredGrammar {
    pub name: String,
    pub symbols: Vec<SymbolInfo>,
    pub patterns: Vec<Option<TokenPattern>>,
    pub terminal_count: u16,
    pub fields: Vec<String>,
    /// Production 0 is the augmented `_accept -> start` production.
    pub productions: Vec<LoweredProduction>,
    pub by_lhs: Vec<Vec<u32>>,
    pub start: u16,
    /// User rule each non-terminal was generated from
    pub origin: Vec<u16>,
    pub user_rules: std::ops::Range<u16>,
    pub extras: Vec<u16>,
    pub externals: Vec<u16>,
    pub word: Option<u16>,
    pub recover: Vec<u16>,
}

impl LoweredGrammar {
    pub fn is_terminal(&self, symbol: u16) -> bool {
        symbol < self.terminal_count
    }

    pub fn name(&self, symbol: u16) -> &str {
        &self.symbols[symbol as usize].name
    }

    /// Name of the user rule `symbol` belongs to.
    pub fn origin_name(&self, symbol: u16) -> &str {
        self.name(self.origin.get(symbol as usize).copied().unwrap_or(symbol))
    }
}

#[derive(Clone, Copy, Default)]
struct Context {
    field: Option<FieldId>,
    prec: Option<Precedence>,
}

type Alternatives = Vec<Vec<Step>>;

struct Lowerer<'g> {
    grammar: &'g Grammar,
    max_alternatives: usize,
    symbols: Vec<SymbolInfo>,
    names: HashMap<&'g str, u16, ahash::RandomState>,
    literals: HashMap<String, u16, ahash::RandomState>,
    fields: Vec<String>,
    productions: Vec<LoweredProduction>,
    origin: Vec<u16>,
    current_rule: u16,
    aux_counter: usize,
}

pub(crate) fn lower(grammar: &Grammar, max_alternatives: usize) -> Result<LoweredGrammar, GrammarError> {
    let lowerer = Lowerer {
        grammar,
        max_alternatives: max_alternatives.max(2),
        symbols: Vec::new(),
        names: HashMap::default(),
        literals: HashMap::default(),
        fields: Vec::new(),
        productions: Vec::new(),
        origin: Vec::new(),
        current_rule: 0,
        aux_counter: 0,
    };
    lowerer.run()
}

impl<'g> Lowerer<'g> {
    fn run(mut self) -> Result<LoweredGrammar, GrammarError> {
        let grammar = self.grammar;
        let mut patterns = Vec::new();

        self.push_symbol(terminal("end", false, false))?;
        patterns.push(None);

        let mut externals = Vec::new();
        let mut extras = Vec::new();
        for token in grammar.tokens() {
            let name = grammar.resolve(token.name);
            let hidden = Grammar::is_hidden(name);
            let id = self.push_symbol(SymbolInfo {
                name: name.to_string(),
                named: !hidden,
                visible: !hidden,
                terminal: true,
                extra: token.extra,
                external: token.is_external(),
            })?;
            self.names.insert(name, id);
            patterns.push(token.pattern.clone());
            if token.is_external() {
                externals.push(id);
            }
            if token.extra {
                extras.push(id);
            }
            if let Some(TokenPattern::Literal(text)) = &token.pattern {
                self.literals.entry(text.clone()).or_insert(id);
            }
        }

        let mut anonymous = Vec::new();
        for rule in grammar.rules() {
            rule.expr.for_each_literal(&mut |text| {
                if !self.literals.contains_key(text) && !anonymous.iter().any(|a: &String| a == text) {
                    anonymous.push(text.to_string());
                }
            });
        }
        for text in anonymous {
            let id = self.push_symbol(terminal(&text, false, true))?;
            patterns.push(Some(TokenPattern::Literal(text.clone())));
            self.literals.insert(text, id);
        }
        let terminal_count = u16::try_from(self.symbols.len()).map_err(|_| too_large("terminals"))?;

        let mut fields = Vec::new();
        for rule in grammar.rules() {
            collect_fields(&rule.expr, &mut fields);
        }
        fields.sort_unstable();
        fields.dedup();
        self.fields = fields;

        let first_rule = u16::try_from(self.symbols.len()).map_err(|_| too_large("symbols"))?;
        for rule in grammar.rules() {
            let name = grammar.resolve(rule.name);
            let hidden = Grammar::is_hidden(name) && name != grammar.start_rule();
            let id = self.push_symbol(SymbolInfo {
                name: name.to_string(),
                named: !hidden,
                visible: !hidden,
                terminal: false,
                extra: false,
                external: false,
            })?;
            self.names.insert(name, id);
        }
        let user_rules = first_rule..first_rule + u16::try_from(grammar.rules().len()).map_err(|_| too_large("rules"))?;
        self.origin = (0..self.symbols.len()).map(|i| i as u16).collect();

        // Production 0 is patched once the augmented symbol exists.
        self.productions.push(LoweredProduction { lhs: 0, steps: Vec::new() });

        for (offset, rule) in grammar.rules().iter().enumerate() {
            let lhs = first_rule + offset as u16;
            self.current_rule = lhs;
            let alternatives = self.expand(&rule.expr, Context::default())?;
            for steps in alternatives {
                self.productions.push(LoweredProduction { lhs, steps });
            }
        }

        let start = self.lookup(grammar.start_rule())?;
        let augmented = self.push_symbol(SymbolInfo {
            name: "_accept".into(),
            named: false,
            visible: false,
            terminal: false,
            extra: false,
            external: false,
        })?;
        self.origin.push(start);
        self.productions[0] = LoweredProduction {
            lhs: augmented,
            steps: vec![Step {
                symbol: start,
                field: None,
                prec: None,
            }],
        };
        if u32::try_from(self.productions.len()).is_err() {
            return Err(too_large("productions"));
        }

        let mut by_lhs = vec![Vec::new(); self.symbols.len()];
        for (id, production) in self.productions.iter().enumerate() {
            by_lhs[production.lhs as usize].push(id as u32);
        }

        let word = grammar.word_token().map(|w| self.lookup(w)).transpose()?;
        let mut recover = Vec::new();
        for name in grammar.recover_tokens() {
            let id = self
                .names
                .get(name.as_str())
                .filter(|id| **id < terminal_count)
                .or_else(|| self.literals.get(name))
                .copied();
            if let Some(id) = id
                && !recover.contains(&id)
            {
                recover.push(id);
            }
        }

        Ok(LoweredGrammar {
            name: grammar.name().to_string(),
            symbols: self.symbols,
            patterns,
            terminal_count,
            fields: self.fields,
            productions: self.productions,
            by_lhs,
            start,
            origin: self.origin,
            user_rules,
            extras,
            externals,
            word,
            recover,
        })
    }

    fn push_symbol(&mut self, info: SymbolInfo) -> Result<u16, GrammarError> {
        let id = u16::try_from(self.symbols.len())
            .ok()
            .filter(|id| *id < u16::MAX)
            .ok_or_else(|| too_large("symbols"))?;
        self.symbols.push(info);
        Ok(id)
    }

    fn lookup(&self, name: &str) -> Result<u16, GrammarError> {
        self.names.get(name).copied().ok_or_else(|| GrammarError::UndefinedSymbol {
            name: name.to_string(),
            referenced_by: self.symbols[self.current_rule as usize].name.clone(),
            suggestion: None,
        })
    }

    fn step(&self, symbol: u16, ctx: Context) -> Step {
        Step {
            symbol,
            field: ctx.field,
            prec: ctx.prec,
        }
    }

    fn expand(&mut self, expr: &Expr, ctx: Context) -> Result<Alternatives, GrammarError> {
        Ok(match expr {
            Expr::Blank => vec![Vec::new()],
            Expr::Symbol(name) => vec![vec![self.step(self.lookup(name)?, ctx)]],
            Expr::Literal(text) => {
                let symbol = match self.literals.get(text.as_str()) {
                    Some(symbol) => *symbol,
                    None => self.lookup(text)?,
                };
                vec![vec![self.step(symbol, ctx)]]
            }
            Expr::Seq(items) => {
                let mut acc: Alternatives = vec![Vec::new()];
                for item in items {
                    let mut alternatives = self.expand(item, ctx)?;
                    if acc.len() * alternatives.len() > self.max_alternatives {
                        let aux = self.aux_rule("group", alternatives)?;
                        alternatives = vec![vec![self.step(aux, ctx)]];
                    }
                    acc = acc
                        .iter()
                        .flat_map(|prefix| {
                            alternatives.iter().map(move |suffix| {
                                let mut steps = prefix.clone();
                                steps.extend_from_slice(suffix);
                                steps
                            })
                        })
                        .collect();
                }
                acc
            }
            Expr::Choice(items) => {
                let mut acc = Vec::new();
                for item in items {
                    acc.extend(self.expand(item, ctx)?);
                }
                if acc.len() > self.max_alternatives {
                    let aux = self.aux_rule("choice", acc)?;
                    vec![vec![self.step(aux, ctx)]]
                } else {
                    acc
                }
            }
            Expr::Optional(inner) => {
                let mut acc = self.expand(inner, ctx)?;
                if !acc.iter().any(Vec::is_empty) {
                    acc.push(Vec::new());
                }
                acc
            }
            Expr::Repeat(inner) => {
                let repeat = self.repeat_rule(inner, ctx)?;
                match repeat {
                    Some(aux) => vec![vec![self.step(aux, ctx)], Vec::new()],
                    None => vec![Vec::new()],
                }
            }
            Expr::Repeat1(inner) => match self.repeat_rule(inner, ctx)? {
                Some(aux) => vec![vec![self.step(aux, ctx)]],
                None => vec![Vec::new()],
            },
            Expr::Field { name, expr } => {
                let field = self
                    .fields
                    .binary_search(name)
                    .ok()
                    .and_then(|i| u16::try_from(i).ok())
                    .map(FieldId);
                self.expand(expr, Context { field, ..ctx })?
            }
            Expr::Prec { prec, expr } => self.expand(expr, Context { prec: Some(*prec), ..ctx })?,
        })
    }

    /// `aux -> aux body | body`; `None` if the body only matches nothing.
    fn repeat_rule(&mut self, body: &Expr, ctx: Context) -> Result<Option<u16>, GrammarError> {
        let alternatives: Alternatives = self
            .expand(body, ctx)?
            .into_iter()
            .filter(|steps| !steps.is_empty())
            .collect();
        if alternatives.is_empty() {
            return Ok(None);
        }
        let aux = self.new_aux("repeat")?;
        let recursive = Step {
            symbol: aux,
            field: None,
            prec: ctx.prec,
        };
        for steps in alternatives {
            let mut left = Vec::with_capacity(steps.len() + 1);
            left.push(recursive);
            left.extend_from_slice(&steps);
            self.productions.push(LoweredProduction { lhs: aux, steps: left });
            self.productions.push(LoweredProduction { lhs: aux, steps });
        }
        Ok(Some(aux))
    }

    fn aux_rule(&mut self, kind: &str, alternatives: Alternatives) -> Result<u16, GrammarError> {
        let aux = self.new_aux(kind)?;
        for steps in alternatives {
            self.productions.push(LoweredProduction { lhs: aux, steps });
        }
        Ok(aux)
    }

    fn new_aux(&mut self, kind: &str) -> Result<u16, GrammarError> {
        self.aux_counter += 1;
        let owner = self.symbols[self.current_rule as usize].name.trim_start_matches('_').to_string();
        let id = self.push_symbol(SymbolInfo {
            name: format!("_{owner}_{kind}{}", self.aux_counter),
            named: false,
            visible: false,
            terminal: false,
            extra: false,
            external: false,
        })?;
        self.origin.push(self.current_rule);
        Ok(id)
    }
}

fn terminal(name: &str, named: bool, visible: bool) -> SymbolInfo {
    SymbolInfo {
        name: name.to_string(),
        named,
        visible,
        terminal: true,
        extra: false,
        external: false,
    }
}

fn too_large(what: &str) -> GrammarError {
    GrammarError::TooLarge {
        what: format!("too many {what}"),
    }
}

fn collect_fields(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Field { name, expr } => {
            out.push(name.clone());
            collect_fields(expr, out);
        }
        Expr::Seq(items) | Expr::Choice(items) => {
            for item in items {
                collect_fields(item, out);
            }
        }
        Expr::Optional(expr) | Expr::Repeat(expr) | Expr::Repeat1(expr) | Expr::Prec { expr, .. } => {
            collect_fields(expr, out);
        }
        Expr::Blank | Expr::Symbol(_) | Expr::Literal(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Assoc, GrammarBuilder};

    fn grammar() -> Grammar {
        GrammarBuilder::new("t")
            .start("list")
            .token("id", TokenPattern::regex("[a-z]+"))
            .token("semi", TokenPattern::literal(";"))
            .extra("ws", TokenPattern::regex(r"\s+"))
            .rule(
                "list",
                Expr::repeat(Expr::seq([Expr::field("item", Expr::sym("id")), Expr::lit(";")])),
            )
            .rule("pair", Expr::prec_left(3, Expr::seq([Expr::sym("id"), Expr::lit(","), Expr::optional(Expr::sym("id"))])))
            .build()
            .unwrap()
    }

    #[test]
    fn test_symbol_layout() {
        let lowered = lower(&grammar(), 256).unwrap();
        let names: Vec<&str> = lowered.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names[..5], ["end", "id", "semi", "ws", ","]);
        assert_eq!(lowered.terminal_count, 5);
        assert_eq!(lowered.extras, vec![3]);
        assert_eq!(lowered.name(lowered.start), "list");
        assert_eq!(lowered.name(lowered.productions[0].lhs), "_accept");
    }

    #[test]
    fn test_literal_resolves_to_named_token() {
        let lowered = lower(&grammar(), 256).unwrap();
        let list = lowered.start;
        let aux = lowered.productions[lowered.by_lhs[list as usize][0] as usize].steps[0].symbol;
        let body = &lowered.productions[lowered.by_lhs[aux as usize][1] as usize];
        assert_eq!(body.steps.iter().map(|s| s.symbol).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(body.steps[0].field, Some(FieldId(0)));
        assert_eq!(lowered.origin_name(aux), "list");
    }

    #[test]
    fn test_optional_expands_inline_with_precedence() {
        let lowered = lower(&grammar(), 256).unwrap();
        let pair = lowered.symbols.iter().position(|s| s.name == "pair").unwrap();
        let productions = &lowered.by_lhs[pair];
        assert_eq!(productions.len(), 2);
        for id in productions {
            let production = &lowered.productions[*id as usize];
            assert_eq!(production.prec(), Some(Precedence::new(3, Assoc::Left)));
        }
    }

    #[test]
    fn test_choice_over_limit_becomes_aux_rule() {
        let many = Expr::choice((0..6).map(|i| Expr::lit(format!("k{i}"))));
        let grammar = GrammarBuilder::new("t")
            .start("s")
            .rule("s", Expr::seq([many.clone(), many]))
            .build()
            .unwrap();
        let lowered = lower(&grammar, 8).unwrap();
        let s = lowered.start as usize;
        assert!(lowered.by_lhs[s].len() <= 8);
        assert!(lowered.symbols.iter().any(|s| s.name.starts_with("_s_group")));
    }
}
