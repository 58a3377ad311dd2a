use crate::error::{BuildError, LanguageError};
use crate::grammar::parse_grammar;
use crate::lexer::{ExternalScanner, Lexer, ScannerFactory};
use crate::table::{CompileOptions, ParseTable, compile_with_options};
use std::fmt;
use std::sync::Arc;

/// Everything needed to parse one language: the compiled table, the lexer
/// built from its token patterns, and the external scanner if the grammar
/// declares external tokens.
///
/// A language is immutable and meant to be shared through an `Arc` by any
/// number of [`Parser`](super::Parser)s; each parse creates its own scanner
/// instance.
pub struct Language {
    table: Arc<ParseTable>,
    lexer: Lexer,
    scanner: Option<ScannerFactory>,
}

impl Language {
    /// Language for a table without external tokens.
    ///
    /// # Errors
    ///
    /// [`LanguageError::MissingScanner`] if the table has external tokens,
    /// [`LanguageError::Pattern`] if a token pattern cannot be compiled.
    pub fn new(table: impl Into<Arc<ParseTable>>) -> Result<Self, LanguageError> {
        let table = table.into();
        if !table.externals().is_empty() {
            return Err(LanguageError::MissingScanner {
                externals: table.externals().len(),
            });
        }
        let lexer = Lexer::new(&table)?;
        Ok(Self {
            table,
            lexer,
            scanner: None,
        })
    }

    /// Language whose external tokens come from scanners made by `factory`.
    ///
    /// # Errors
    ///
    /// [`LanguageError::Pattern`] if a token pattern cannot be compiled.
    pub fn with_scanner(table: impl Into<Arc<ParseTable>>, factory: ScannerFactory) -> Result<Self, LanguageError> {
        let table = table.into();
        let lexer = Lexer::new(&table)?;
        Ok(Self {
            table,
            lexer,
            scanner: Some(factory),
        })
    }

    /// Parse grammar source text, compile it with default options and build
    /// the language.
    ///
    /// # Errors
    ///
    /// Any [`BuildError`] from reading or compiling the grammar, plus the
    /// errors of [`Language::new`]/[`Language::with_scanner`].
    pub fn from_grammar_source(source: &str, scanner: Option<ScannerFactory>) -> Result<Self, LanguageError> {
        let grammar = parse_grammar(source)?;
        let table = compile_with_options(&grammar, &CompileOptions::default()).map_err(BuildError::from)?;
        match scanner {
            Some(factory) => Self::with_scanner(table, factory),
            None => Self::new(table),
        }
    }

    /// Compile the built-in ArkTS language.
    ///
    /// Every call compiles a new table. [`crate::arkts::language`] keeps one
    /// around for callers that do not want to hold their own.
    ///
    /// # Errors
    ///
    /// As for [`Language::from_grammar_source`].
    pub fn arkts() -> Result<Self, LanguageError> {
        Self::from_grammar_source(crate::arkts::GRAMMAR, Some(crate::arkts::new_scanner))
    }

    #[must_use]
    pub const fn table(&self) -> &Arc<ParseTable> {
        &self.table
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.table.grammar_name()
    }

    pub(crate) const fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    pub(crate) fn new_scanner(&self) -> Option<Box<dyn ExternalScanner>> {
        self.scanner.map(|factory| factory())
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name())
            .field("states", &self.table.state_count())
            .field("external_scanner", &self.scanner.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_tokens_need_a_scanner() {
        let source = r#"
            #![grammar(tiny)]
            #![start(items)]
            #[external] @marker;
            @word = /[a-z]+/;
            items = (word | marker)*;
        "#;
        let err = Language::from_grammar_source(source, None).unwrap_err();
        assert_eq!(err, LanguageError::MissingScanner { externals: 1 });
    }

    #[test]
    fn test_language_from_source() {
        let source = r#"
            #![grammar(tiny)]
            #![start(items)]
            @word = /[a-z]+/;
            items = word*;
        "#;
        let language = Language::from_grammar_source(source, None).unwrap();
        assert_eq!(language.name(), "tiny");
        assert!(language.new_scanner().is_none());
    }
}
