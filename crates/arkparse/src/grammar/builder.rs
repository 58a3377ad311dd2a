use crate::error::GrammarError;
use crate::error::diagnostics::did_you_mean;
use crate::grammar::{Expr, Grammar, Rule, TokenDef, TokenPattern};
use hashbrown::HashSet;
use lasso::Rodeo;

/// Builder for [`Grammar`].
///
/// Declarations are collected in order; [`GrammarBuilder::build`] checks
/// that every referenced name is defined exactly once.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    name: String,
    start: Option<String>,
    rules: Vec<(String, Expr)>,
    tokens: Vec<(String, Option<TokenPattern>, bool)>,
    word: Option<String>,
    preferences: Vec<String>,
    recover: Vec<String>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn start(mut self, rule: impl Into<String>) -> Self {
        self.start = Some(rule.into());
        self
    }

    #[must_use]
    pub fn rule(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.rules.push((name.into(), expr));
        self
    }

    #[must_use]
    pub fn token(mut self, name: impl Into<String>, pattern: TokenPattern) -> Self {
        self.tokens.push((name.into(), Some(pattern), false));
        self
    }

    /// Declare a token that may appear between any two tokens
    #[must_use]
    pub fn extra(mut self, name: impl Into<String>, pattern: TokenPattern) -> Self {
        self.tokens.push((name.into(), Some(pattern), true));
        self
    }

    /// Declare a token produced by the external scanner.
    ///
    /// External tokens are numbered in declaration order; the scanner
    /// refers to them by that index.
    #[must_use]
    pub fn external(mut self, name: impl Into<String>) -> Self {
        self.tokens.push((name.into(), None, false));
        self
    }

    #[must_use]
    pub fn word(mut self, token: impl Into<String>) -> Self {
        self.word = Some(token.into());
        self
    }

    #[must_use]
    pub fn prefer<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferences.extend(rules.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn recover<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recover.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Build the grammar.
    ///
    /// # Errors
    ///
    /// Returns an error if the start rule is missing, a name is defined
    /// twice, a referenced name is undefined, or a literal token is empty.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        let mut interner = Rodeo::new();
        let mut defined: HashSet<&str, ahash::RandomState> = HashSet::default();

        for name in self
            .tokens
            .iter()
            .map(|(n, ..)| n.as_str())
            .chain(self.rules.iter().map(|(n, _)| n.as_str()))
        {
            if !defined.insert(name) {
                return Err(GrammarError::DuplicateSymbol { name: name.to_string() });
            }
        }

        let start = self.start.clone().ok_or(GrammarError::MissingStartRule)?;
        if !self.rules.iter().any(|(n, _)| *n == start) {
            return Err(GrammarError::MissingStartRule);
        }

        let rule_names: Vec<String> = self.rules.iter().map(|(n, _)| n.clone()).collect();
        let all_names: Vec<String> = defined.iter().map(|s| (*s).to_string()).collect();
        let undefined = |name: &str, referenced_by: &str, candidates: &[String]| {
            GrammarError::UndefinedSymbol {
                name: name.to_string(),
                referenced_by: referenced_by.to_string(),
                suggestion: did_you_mean(name, candidates),
            }
        };

        let mut literals: HashSet<&str, ahash::RandomState> = HashSet::default();
        for (rule, expr) in &self.rules {
            let mut missing = None;
            expr.for_each_symbol(&mut |name| {
                if missing.is_none() && !defined.contains(name) {
                    missing = Some(name.to_string());
                }
            });
            if let Some(name) = missing {
                return Err(undefined(&name, rule, &all_names));
            }
            let mut empty = false;
            expr.for_each_literal(&mut |text| {
                empty |= text.is_empty();
                literals.insert(text);
            });
            if empty {
                return Err(GrammarError::EmptyToken {
                    token: format!("{rule} (\"\")"),
                });
            }
        }

        for (name, pattern, _) in &self.tokens {
            if pattern.as_ref().is_some_and(|p| p.as_str().is_empty()) {
                return Err(GrammarError::EmptyToken { token: name.clone() });
            }
        }

        let token_names: Vec<String> = self.tokens.iter().map(|(n, ..)| n.clone()).collect();
        if let Some(word) = &self.word
            && !token_names.contains(word)
        {
            return Err(undefined(word, "#![word]", &token_names));
        }
        for name in &self.preferences {
            if !rule_names.contains(name) {
                return Err(undefined(name, "#![prefer]", &rule_names));
            }
        }
        for name in &self.recover {
            let is_literal_token = self.tokens.iter().any(|(_, p, _)| {
                matches!(p, Some(TokenPattern::Literal(text)) if text == name)
            });
            if !token_names.contains(name) && !literals.contains(name.as_str()) && !is_literal_token
            {
                return Err(undefined(name, "#![recover]", &token_names));
            }
        }
        drop(literals);
        drop(defined);

        let tokens = self
            .tokens
            .into_iter()
            .map(|(name, pattern, extra)| TokenDef {
                name: interner.get_or_intern(name),
                pattern,
                extra,
            })
            .collect();
        let rules = self
            .rules
            .into_iter()
            .map(|(name, expr)| Rule {
                name: interner.get_or_intern(name),
                expr,
            })
            .collect();
        let start = interner.get_or_intern(start);
        let word = self.word.map(|w| interner.get_or_intern(w));

        Ok(Grammar {
            name: self.name,
            start,
            rules,
            tokens,
            word,
            preferences: self.preferences,
            recover: self.recover,
            interner,
        })
    }
}
