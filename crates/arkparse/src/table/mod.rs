//! # Parse Tables
//!
//! A [`ParseTable`] maps `(state, lookahead)` pairs to [`Action`]s. It is the
//! output of [`compile`] and is immutable afterwards; every parser shares it
//! through an `Arc`.
//!
//! A pair with more than one action is a GLR split point: the parser forks
//! and follows each action in order. The table also carries the symbol
//! metadata the syntax tree needs (names, visibility, field names) and the
//! token patterns the lexer is built from.

mod analysis;
mod automaton;
mod compile;
mod conflicts;
mod lower;
mod serial;
mod sets;

pub use compile::{CompileOptions, ConflictStrategy, compile, compile_with_options};
pub use serial::{FORMAT_VERSION, FormatVersion};
pub use sets::TokenSet;

use crate::grammar::TokenPattern;
use crate::syntax::{FieldId, SyntaxKind};
use smallvec::SmallVec;

pub type StateId = u32;
pub type ProductionId = u32;

/// Parser action for a state and lookahead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
}

/// A production as the runtime sees it
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Production {
    pub lhs: SyntaxKind,
    /// Number of right-hand-side symbols
    pub len: u16,
    /// Field for each right-hand-side position; empty when there are none
    pub fields: SmallVec<[Option<FieldId>; 4]>,
}

impl Production {
    #[must_use]
    pub fn field_at(&self, index: usize) -> Option<FieldId> {
        self.fields.get(index).copied().flatten()
    }
}

/// Per-symbol metadata
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolInfo {
    pub name: String,
    /// Named symbols appear in S-expressions and `named_children`
    pub named: bool,
    /// Invisible symbols are spliced into their parent
    pub visible: bool,
    pub terminal: bool,
    pub extra: bool,
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TableState {
    /// Sorted by lookahead kind
    actions: Vec<(SyntaxKind, SmallVec<[Action; 1]>)>,
    /// Sorted by non-terminal kind
    gotos: Vec<(SyntaxKind, StateId)>,
    lex_mode: u16,
}

/// Compiled parse table
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseTable {
    pub(crate) format: FormatVersion,
    pub(crate) grammar_name: String,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) fields: Vec<String>,
    pub(crate) terminal_count: u16,
    pub(crate) start_kind: SyntaxKind,
    pub(crate) productions: Vec<Production>,
    pub(crate) states: Vec<TableState>,
    pub(crate) lex_modes: Vec<TokenSet>,
    /// Pattern for each terminal; `None` for END and external tokens
    pub(crate) patterns: Vec<Option<TokenPattern>>,
    pub(crate) extras: Vec<SyntaxKind>,
    pub(crate) externals: Vec<SyntaxKind>,
    pub(crate) word: Option<SyntaxKind>,
    pub(crate) recover: Vec<SyntaxKind>,
    pub(crate) split_points: u32,
}

const NO_ACTIONS: &[Action] = &[];

impl ParseTable {
    #[must_use]
    pub fn grammar_name(&self) -> &str {
        &self.grammar_name
    }

    #[must_use]
    pub const fn format_version(&self) -> FormatVersion {
        self.format
    }

    /// Actions for `kind` in `state`; empty means a syntax error.
    #[must_use]
    pub fn actions(&self, state: StateId, kind: SyntaxKind) -> &[Action] {
        let Some(entry) = self.states.get(state as usize) else {
            return NO_ACTIONS;
        };
        entry
            .actions
            .binary_search_by_key(&kind, |(k, _)| *k)
            .map_or(NO_ACTIONS, |i| entry.actions[i].1.as_slice())
    }

    /// Terminals with at least one action in `state`
    pub fn expected(&self, state: StateId) -> impl Iterator<Item = SyntaxKind> + '_ {
        self.states
            .get(state as usize)
            .into_iter()
            .flat_map(|s| s.actions.iter().map(|(k, _)| *k))
    }

    #[must_use]
    pub fn goto(&self, state: StateId, kind: SyntaxKind) -> Option<StateId> {
        let entry = self.states.get(state as usize)?;
        entry
            .gotos
            .binary_search_by_key(&kind, |(k, _)| *k)
            .ok()
            .map(|i| entry.gotos[i].1)
    }

    #[must_use]
    pub fn lex_mode(&self, state: StateId) -> u16 {
        self.states.get(state as usize).map_or(0, |s| s.lex_mode)
    }

    /// Terminals the lexer may produce in lex mode `mode`
    #[must_use]
    pub fn valid_tokens(&self, mode: u16) -> Option<&TokenSet> {
        self.lex_modes.get(mode as usize)
    }

    #[must_use]
    pub fn lex_mode_count(&self) -> usize {
        self.lex_modes.len()
    }

    #[must_use]
    pub fn production(&self, id: ProductionId) -> Option<&Production> {
        self.productions.get(id as usize)
    }

    #[must_use]
    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of `(state, lookahead)` pairs with more than one action
    #[must_use]
    pub const fn split_point_count(&self) -> u32 {
        self.split_points
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub const fn terminal_count(&self) -> usize {
        self.terminal_count as usize
    }

    #[must_use]
    pub const fn start_kind(&self) -> SyntaxKind {
        self.start_kind
    }

    #[must_use]
    pub fn symbol(&self, kind: SyntaxKind) -> Option<&SymbolInfo> {
        self.symbols.get(kind.index())
    }

    #[must_use]
    pub fn symbol_name(&self, kind: SyntaxKind) -> &str {
        if kind.is_error() {
            return "ERROR";
        }
        self.symbol(kind).map_or("UNKNOWN", |s| s.name.as_str())
    }

    /// Look up a symbol by name, preferring named symbols.
    #[must_use]
    pub fn kind_for_name(&self, name: &str) -> Option<SyntaxKind> {
        let mut found = None;
        for (index, symbol) in self.symbols.iter().enumerate() {
            if symbol.name == name {
                let kind = SyntaxKind(u16::try_from(index).ok()?);
                if symbol.named {
                    return Some(kind);
                }
                found.get_or_insert(kind);
            }
        }
        found
    }

    #[must_use]
    pub fn is_named(&self, kind: SyntaxKind) -> bool {
        kind.is_error() || self.symbol(kind).is_some_and(|s| s.named)
    }

    #[must_use]
    pub fn is_visible(&self, kind: SyntaxKind) -> bool {
        kind.is_error() || self.symbol(kind).is_some_and(|s| s.visible)
    }

    #[must_use]
    pub const fn is_terminal(&self, kind: SyntaxKind) -> bool {
        kind.0 < self.terminal_count
    }

    #[must_use]
    pub fn is_extra(&self, kind: SyntaxKind) -> bool {
        self.symbol(kind).is_some_and(|s| s.extra)
    }

    #[must_use]
    pub fn is_external(&self, kind: SyntaxKind) -> bool {
        self.symbol(kind).is_some_and(|s| s.external)
    }

    #[must_use]
    pub fn field_name(&self, field: FieldId) -> &str {
        self.fields.get(field.index()).map_or("", String::as_str)
    }

    #[must_use]
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        let index = self.fields.iter().position(|f| f == name)?;
        u16::try_from(index).ok().map(FieldId)
    }

    #[must_use]
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn token_pattern(&self, kind: SyntaxKind) -> Option<&TokenPattern> {
        self.patterns.get(kind.index())?.as_ref()
    }

    #[must_use]
    pub fn extras(&self) -> &[SyntaxKind] {
        &self.extras
    }

    /// External tokens, indexed the way the external scanner numbers them
    #[must_use]
    pub fn externals(&self) -> &[SyntaxKind] {
        &self.externals
    }

    #[must_use]
    pub const fn word_token(&self) -> Option<SyntaxKind> {
        self.word
    }

    /// Tokens at which error recovery may resynchronize
    #[must_use]
    pub fn recover_tokens(&self) -> &[SyntaxKind] {
        &self.recover
    }
}
