//! # arkparse
//!
//! An incremental, error-tolerant LR/GLR parsing toolkit, with a built-in
//! grammar for ArkTS.
//!
//! ## Overview
//!
//! - **Grammars**: written in a small DSL ([`grammar::parse_grammar`]) or
//!   built in code with [`GrammarBuilder`]. Precedence, associativity and
//!   conflict directives live in the grammar.
//! - **Table compiler**: [`compile`] turns a grammar into an immutable
//!   [`ParseTable`]. Conflicts not settled by precedence or directives
//!   become GLR split points. Tables can be serialized and reloaded.
//! - **Lexing**: contextual, driven by the tokens the parser state accepts,
//!   with an [`ExternalScanner`] hook for tokens that need memory.
//! - **Parsing**: total. Malformed input yields `ERROR` and missing nodes
//!   instead of failing; only a budget from [`ParserConfig`] can cancel a
//!   parse.
//! - **Incremental reparsing**: [`Parser::reparse`] reuses unchanged tokens
//!   and subtrees and produces exactly the tree a fresh parse would.
//!
//! ## Quick Start
//!
//! ```rust
//! use arkparse::{Edit, Parser, arkts};
//!
//! let parser = Parser::new(arkts::language().clone());
//! let tree = parser.parse("let x = 1")?;
//! // The statement is missing its semicolon.
//! let error = &tree.errors()[0];
//! assert!(error.missing);
//! assert_eq!(error.range.start().to_usize(), 9);
//!
//! let mut text = String::from("let x = 1");
//! let edit = Edit::apply(&mut text, 9..9, ";");
//! let tree = parser.reparse(&tree, &[edit], &text)?;
//! assert!(!tree.has_error());
//! # Ok::<(), arkparse::Cancelled>(())
//! ```
//!
//! ## Modules
//!
//! - [`grammar`] - Grammar model, builder and DSL
//! - [`table`] - Table compiler and serialized tables
//! - [`lexer`] - Contextual lexer and the external scanner interface
//! - [`parser`] - GLR parse engine, recovery and [`Language`]
//! - [`incremental`] - Edits and subtree reuse
//! - [`syntax`] - Immutable shared syntax trees
//! - [`arkts`] - The built-in ArkTS language
//! - [`error`] - Error types and diagnostics
//! - [`testing`] - Property checks for tests and fuzzing

pub mod arkts;
pub mod error;
pub mod grammar;
pub mod incremental;
pub mod lexer;
pub mod parser;
pub mod syntax;
pub mod table;
pub mod testing;

pub use error::{BuildError, CancelReason, Cancelled, GrammarError, GrammarSourceError, LanguageError, TableLoadError};
pub use grammar::{Assoc, Expr, Grammar, GrammarBuilder, Precedence, TokenPattern, parse_grammar};
pub use incremental::Edit;
pub use lexer::{ExternalScanner, ScanInput, ScannerState};
pub use parser::{Language, Parser, ParserConfig};
pub use syntax::{Point, SyntaxError, SyntaxKind, SyntaxNode, SyntaxTree, TextRange, TextSize, TreeCursor};
pub use table::{CompileOptions, ConflictStrategy, ParseTable, compile, compile_with_options};
