//! # Parser
//!
//! [`Parser`] drives a compiled [`Language`] over source text and returns a
//! [`SyntaxTree`]. Parsing is total: malformed input produces `ERROR` and
//! missing nodes rather than a failure. The only error is [`Cancelled`],
//! when a budget from [`ParserConfig`] runs out.
//!
//! ```rust
//! use arkparse::arkts;
//! use arkparse::parser::Parser;
//!
//! let parser = Parser::new(arkts::language().clone());
//! let tree = parser.parse("let x = 1;").unwrap();
//! assert!(!tree.has_error());
//! ```
//!
//! [`Parser::reparse`] takes the previous tree and the edits that turned the
//! old text into the new one, and reuses every token and subtree that the
//! edits cannot have affected. The result is identical to a fresh parse.

mod engine;
mod language;
mod recovery;
mod stack;

pub use language::Language;

use crate::error::Cancelled;
use crate::incremental::{Edit, EditMap, ReuseIndex};
use crate::syntax::SyntaxTree;
use engine::Engine;
use std::sync::Arc;
use std::time::Duration;

/// Limits for one parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Upper bound on simultaneously live GLR stack versions.
    pub max_stacks: usize,
    /// Cancel after creating this many nodes and tokens.
    pub node_budget: Option<usize>,
    /// Cancel once parsing has taken longer than this.
    pub time_budget: Option<Duration>,
    /// Missing tokens recovery may insert in a row before it falls back to
    /// skipping input.
    pub max_missing_insertions: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_stacks: 8,
            node_budget: None,
            time_budget: None,
            max_missing_insertions: 8,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_max_stacks(mut self, max_stacks: usize) -> Self {
        self.max_stacks = if max_stacks == 0 { 1 } else { max_stacks };
        self
    }

    #[must_use]
    pub const fn with_node_budget(mut self, nodes: usize) -> Self {
        self.node_budget = Some(nodes);
        self
    }

    #[must_use]
    pub const fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    #[must_use]
    pub const fn with_max_missing_insertions(mut self, count: usize) -> Self {
        self.max_missing_insertions = count;
        self
    }
}

/// A parser for one language
///
/// Cheap to clone. A parser holds no per-parse state, so one instance can
/// serve any number of parses, including concurrent ones.
#[derive(Debug, Clone)]
pub struct Parser {
    language: Arc<Language>,
    config: ParserConfig,
}

impl Parser {
    #[must_use]
    pub fn new(language: Arc<Language>) -> Self {
        Self::with_config(language, ParserConfig::default())
    }

    #[must_use]
    pub const fn with_config(language: Arc<Language>, config: ParserConfig) -> Self {
        Self { language, config }
    }

    #[must_use]
    pub const fn language(&self) -> &Arc<Language> {
        &self.language
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse `text` from scratch.
    ///
    /// # Errors
    ///
    /// [`Cancelled`] if a node or time budget is exceeded.
    pub fn parse(&self, text: &str) -> Result<SyntaxTree, Cancelled> {
        self.parse_bytes(text.as_bytes())
    }

    /// Parse raw bytes. Invalid UTF-8 is lexed byte by byte into error tokens.
    ///
    /// # Errors
    ///
    /// [`Cancelled`] if a node or time budget is exceeded.
    pub fn parse_bytes(&self, text: &[u8]) -> Result<SyntaxTree, Cancelled> {
        self.run(text, None, 0)
    }

    /// Parse `new_text`, reusing what `edits` left intact in `old`.
    ///
    /// `edits` describe how the text of `old` became `new_text`, in the order
    /// they were made; edits already recorded with [`SyntaxTree::edit`] are
    /// applied first. The returned tree is identical to
    /// `self.parse(new_text)` apart from its revision, which is one more than
    /// `old`'s.
    ///
    /// # Errors
    ///
    /// [`Cancelled`] if a node or time budget is exceeded.
    pub fn reparse(&self, old: &SyntaxTree, edits: &[Edit], new_text: &str) -> Result<SyntaxTree, Cancelled> {
        self.reparse_bytes(old, edits, new_text.as_bytes())
    }

    /// Byte variant of [`Parser::reparse`].
    ///
    /// # Errors
    ///
    /// [`Cancelled`] if a node or time budget is exceeded.
    pub fn reparse_bytes(&self, old: &SyntaxTree, edits: &[Edit], new_text: &[u8]) -> Result<SyntaxTree, Cancelled> {
        let revision = old.revision() + 1;
        if !Arc::ptr_eq(old.table(), self.language.table()) {
            tracing::debug!("old tree was parsed with another table, parsing from scratch");
            return self.run(new_text, None, revision);
        }

        let all: Vec<Edit> = old.pending_edits().iter().chain(edits).copied().collect();
        let old_len = old.text_len().to_usize();
        let expected = all.iter().fold(old_len, |len, edit| {
            let start = edit.start_byte.to_usize().min(len);
            let old_end = edit.old_end_byte.to_usize().clamp(start, len);
            len - (old_end - start) + edit.new_end_byte.to_usize().saturating_sub(start)
        });
        if expected != new_text.len() {
            tracing::warn!(
                expected,
                actual = new_text.len(),
                "edits do not match the new text, parsing from scratch"
            );
            return self.run(new_text, None, revision);
        }

        let reuse = ReuseIndex::new(old.root(), EditMap::new(old_len, &all));
        self.run(new_text, Some(reuse), revision)
    }

    /// Parse several documents in parallel with this parser.
    ///
    /// # Errors
    ///
    /// Each entry fails independently with [`Cancelled`].
    #[cfg(feature = "parallel")]
    pub fn parse_batch<S>(&self, texts: &[S]) -> Vec<Result<SyntaxTree, Cancelled>>
    where
        S: AsRef<str> + Sync,
    {
        use rayon::prelude::*;

        texts.par_iter().map(|text| self.parse(text.as_ref())).collect()
    }

    fn run(&self, text: &[u8], reuse: Option<ReuseIndex>, revision: u64) -> Result<SyntaxTree, Cancelled> {
        let language = &*self.language;
        let span = tracing::debug_span!("parse", language = language.name(), bytes = text.len(), revision);
        let _guard = span.enter();

        let engine = Engine::new(
            language.table(),
            language.lexer(),
            &self.config,
            text,
            language.new_scanner(),
            reuse,
        );
        let root = engine.run()?;
        Ok(SyntaxTree::new(root, revision, language.table().clone(), text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = r#"
        #![grammar(list)]
        #![start(document)]
        #![recover(";")]
        #[extra] @whitespace = /[ \t\n]+/;
        @word = /[a-z]+/;
        document = item*;
        item = name: word value: word? ";";
    "#;

    fn parser() -> Parser {
        Parser::new(Arc::new(Language::from_grammar_source(LIST, None).unwrap()))
    }

    #[test]
    fn test_parse_simple_list() {
        let tree = parser().parse("a b; c;").unwrap();
        assert!(!tree.has_error());
        assert_eq!(tree.text_len().to_usize(), 7);
        let items = tree.root_node().children().filter(|node| node.kind_name() == "item").count();
        assert_eq!(items, 2);
        assert_eq!(tree.revision(), 0);
    }

    #[test]
    fn test_node_budget_cancels() {
        let parser = Parser::with_config(parser().language().clone(), ParserConfig::new().with_node_budget(3));
        let err = parser.parse("a b; c d; e f;").unwrap_err();
        assert_eq!(err.reason, crate::error::CancelReason::NodeBudget);
    }

    #[test]
    fn test_zero_time_budget_cancels() {
        let parser = Parser::with_config(
            parser().language().clone(),
            ParserConfig::new().with_time_budget(Duration::ZERO),
        );
        let text = "a b; ".repeat(2000);
        let err = parser.parse(&text).unwrap_err();
        assert_eq!(err.reason, crate::error::CancelReason::TimeBudget);
    }

    #[test]
    fn test_mismatched_edits_fall_back_to_full_parse() {
        let parser = parser();
        let old = parser.parse("a;").unwrap();
        let edit = Edit::new(0, 1, 1);
        let tree = parser.reparse(&old, &[edit], "abc;").unwrap();
        assert_eq!(tree, parser.parse("abc;").unwrap());
        assert_eq!(tree.revision(), 1);
    }

    #[test]
    fn test_recorded_edits_apply_before_given_ones() {
        let parser = parser();
        let old = parser.parse("a;").unwrap();
        let edited = old.edit(&Edit::new(1, 1, 3));
        let tree = parser.reparse(&edited, &[Edit::new(3, 3, 4)], "a b ;").unwrap();
        assert_eq!(tree, parser.parse("a b ;").unwrap());
    }

    #[test]
    fn test_zero_max_stacks_is_clamped() {
        assert_eq!(ParserConfig::new().with_max_stacks(0).max_stacks, 1);
    }
}
