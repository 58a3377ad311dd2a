//! # Error Types
//!
//! Two families of errors exist:
//!
//! - **Build-time**: [`GrammarSourceError`] for malformed grammar files and
//!   [`GrammarError`] for grammars that cannot be compiled. Both name the
//!   offending rules and are fatal to the compile step.
//! - **Run-time**: parsing never fails on malformed source; problems are
//!   recorded as `ERROR` and missing nodes in the tree. The only failure is
//!   [`Cancelled`], returned when a node or time budget runs out.
//!
//! [`TableLoadError`] and [`LanguageError`] cover loading a serialized table
//! and turning it into a runnable language.
//!
//! ## Diagnostics Support
//!
//! With the `diagnostics` feature, errors implement [`miette::Diagnostic`].

pub mod diagnostics;

use crate::syntax::TextRange;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// A grammar that cannot be turned into a parse table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("grammar has no start rule")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(grammar::missing_start), help("declare one with `#![start(rule)]`"))
    )]
    MissingStartRule,

    #[error(
        "`{name}` referenced by `{referenced_by}` is not defined{}",
        suggestion.as_ref().map(|s| format!(" (did you mean `{s}`?)")).unwrap_or_default()
    )]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::undefined_symbol)))]
    UndefinedSymbol {
        name: String,
        referenced_by: String,
        suggestion: Option<String>,
    },

    #[error("`{name}` is defined more than once")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::duplicate_symbol)))]
    DuplicateSymbol { name: String },

    #[error("rules not reachable from the start rule: {}", rules.join(", "))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::unreachable_rule)))]
    UnreachableRule { rules: Vec<String> },

    #[error("left recursion without a base case in: {}", rules.join(", "))]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grammar::unresolved_left_recursion),
            help("add an alternative that does not start with the rule itself")
        )
    )]
    UnresolvedLeftRecursion { rules: Vec<String> },

    #[error("rules that can never match a finite input: {}", rules.join(", "))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::unproductive_rule)))]
    UnproductiveRule { rules: Vec<String> },

    #[error("unresolved conflict between {} on `{symbol}` in state {state}", rules.join(" and "))]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grammar::conflict),
            help("add precedence, a `#![prefer(...)]` directive, or enable GLR fallback")
        )
    )]
    ConflictWithoutResolution {
        rules: Vec<String>,
        symbol: String,
        state: u32,
    },

    #[error("token `{token}` has an invalid pattern: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::invalid_pattern)))]
    InvalidPattern { token: String, message: String },

    #[error("token `{token}` matches the empty string")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::empty_token)))]
    EmptyToken { token: String },

    #[error("grammar is too large: {what}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::too_large)))]
    TooLarge { what: String },
}

impl GrammarError {
    /// Rule or token names the error is about.
    #[must_use]
    pub fn rules(&self) -> Vec<&str> {
        match self {
            Self::MissingStartRule | Self::TooLarge { .. } => Vec::new(),
            Self::UndefinedSymbol { name, referenced_by, .. } => vec![name, referenced_by],
            Self::UnreachableRule { rules }
            | Self::UnresolvedLeftRecursion { rules }
            | Self::UnproductiveRule { rules }
            | Self::ConflictWithoutResolution { rules, .. } => rules.iter().map(String::as_str).collect(),
            Self::InvalidPattern { token, .. } | Self::EmptyToken { token } => vec![token],
            Self::DuplicateSymbol { name } => vec![name],
        }
    }
}

/// Syntax error in grammar source text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::syntax)))]
#[error("{message}")]
pub struct GrammarSourceError {
    pub message: String,
    #[cfg_attr(feature = "diagnostics", help)]
    pub help: Option<String>,
    #[cfg_attr(feature = "diagnostics", label("here"))]
    pub span: TextRange,
}

impl GrammarSourceError {
    #[must_use]
    pub fn new(message: impl Into<String>, span: TextRange) -> Self {
        Self {
            message: message.into(),
            help: None,
            span,
        }
    }

    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Either stage of turning grammar text into a table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum BuildError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Source(#[from] GrammarSourceError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Grammar(#[from] GrammarError),
}

/// Failure to load a serialized parse table
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum TableLoadError {
    #[error("table format {found} is incompatible with this runtime (expects {expected}.x)")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::incompatible_version)))]
    IncompatibleVersion { found: String, expected: u16 },

    #[error("malformed table: {0}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::malformed)))]
    Malformed(String),
}

/// Failure to build a runnable language from a table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum LanguageError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Build(#[from] BuildError),

    #[error("token `{token}` has an invalid pattern: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(language::pattern)))]
    Pattern { token: String, message: String },

    #[error("grammar declares {externals} external tokens but no external scanner was supplied")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(language::missing_scanner)))]
    MissingScanner { externals: usize },
}

/// Why a parse was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    NodeBudget,
    TimeBudget,
}

/// The parse exceeded a caller-imposed budget
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(parser::cancelled)))]
#[error("parse cancelled ({reason:?}) after {nodes} nodes in {elapsed:?}")]
pub struct Cancelled {
    pub reason: CancelReason,
    pub nodes: usize,
    pub elapsed: Duration,
}
