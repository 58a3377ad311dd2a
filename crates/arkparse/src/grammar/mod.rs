//! # Grammar Model
//!
//! In-memory representation of a grammar: named rules whose bodies are
//! [`Expr`] trees, token definitions, and the directives the table compiler
//! consults (start rule, word token, preference list, recovery set).
//!
//! Grammars are built with [`GrammarBuilder`] or parsed from the textual
//! format with [`parse_grammar`].
//!
//! ```rust
//! use arkparse::grammar::{Expr, GrammarBuilder, TokenPattern};
//!
//! let grammar = GrammarBuilder::new("sum")
//!     .start("sum")
//!     .token("number", TokenPattern::regex("[0-9]+"))
//!     .extra("whitespace", TokenPattern::regex(r"\s+"))
//!     .rule("sum", Expr::prec_left(1, Expr::seq([
//!         Expr::field("left", Expr::sym("_operand")),
//!         Expr::lit("+"),
//!         Expr::field("right", Expr::sym("_operand")),
//!     ])))
//!     .rule("_operand", Expr::choice([Expr::sym("number"), Expr::sym("sum")]))
//!     .build()
//!     .unwrap();
//! assert_eq!(grammar.start_rule(), "sum");
//! ```

mod builder;
mod expr;
mod source;

pub use builder::GrammarBuilder;
pub use expr::{Assoc, Expr, Precedence};
pub use source::{parse_grammar, parse_grammar_source};

use lasso::{Rodeo, Spur};

/// How a token is recognized by the lexer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenPattern {
    /// Exact text
    Literal(String),
    /// Regular expression in `regex-syntax` dialect
    Regex(String),
}

impl TokenPattern {
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    #[must_use]
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex(pattern.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Regex(s) => s,
        }
    }
}

/// A named token declaration
#[derive(Debug, Clone)]
pub struct TokenDef {
    pub name: Spur,
    /// `None` for tokens produced by the external scanner
    pub pattern: Option<TokenPattern>,
    /// Extras may appear between any two tokens and are attached as trivia
    pub extra: bool,
}

impl TokenDef {
    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.pattern.is_none()
    }
}

/// Production rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: Spur,
    pub expr: Expr,
}

/// A validated grammar, ready for the table compiler
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) name: String,
    pub(crate) start: Spur,
    pub(crate) rules: Vec<Rule>,
    pub(crate) tokens: Vec<TokenDef>,
    pub(crate) word: Option<Spur>,
    pub(crate) preferences: Vec<String>,
    pub(crate) recover: Vec<String>,
    pub(crate) interner: Rodeo,
}

impl Grammar {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn start_rule(&self) -> &str {
        self.interner.resolve(&self.start)
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn tokens(&self) -> &[TokenDef] {
        &self.tokens
    }

    /// The identifier-like token used to tell keywords apart from words
    #[must_use]
    pub fn word_token(&self) -> Option<&str> {
        self.word.as_ref().map(|w| self.interner.resolve(w))
    }

    /// Rule names in preference order; earlier names win conflicts
    #[must_use]
    pub fn preferences(&self) -> &[String] {
        &self.preferences
    }

    /// Token names or literal texts at which error recovery may resume
    #[must_use]
    pub fn recover_tokens(&self) -> &[String] {
        &self.recover
    }

    #[must_use]
    pub fn resolve(&self, spur: Spur) -> &str {
        self.interner.resolve(&spur)
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        let spur = self.interner.get(name)?;
        self.rules.iter().find(|r| r.name == spur)
    }

    #[must_use]
    pub fn token(&self, name: &str) -> Option<&TokenDef> {
        let spur = self.interner.get(name)?;
        self.tokens.iter().find(|t| t.name == spur)
    }

    /// Hidden symbols have their children spliced into the parent node.
    #[must_use]
    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('_')
    }
}
