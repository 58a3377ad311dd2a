//! # ArkTS
//!
//! The built-in ArkTS language: the grammar in `grammars/arkts.grammar`
//! together with [`ArkTsScanner`] for automatic semicolons and template
//! literals.
//!
//! [`Language::arkts`] compiles the language; a parser owns whatever
//! language it is given. [`language`] is a convenience cache over it that
//! compiles once per process and hands out the same `Arc` afterwards.
//!
//! ```rust
//! use arkparse::arkts;
//! use arkparse::parser::Parser;
//!
//! let parser = Parser::new(arkts::language().clone());
//! let tree = parser.parse("let x = 1;").unwrap();
//! let declaration = tree.root_node().child(0).unwrap();
//! assert_eq!(declaration.kind_name(), "variable_declaration");
//! assert_eq!(declaration.field("name").unwrap().text(), "x");
//! ```

mod scanner;

pub use scanner::ArkTsScanner;

use crate::error::LanguageError;
use crate::lexer::ExternalScanner;
use crate::parser::Language;
use std::sync::{Arc, OnceLock};

/// Source of the ArkTS grammar
pub const GRAMMAR: &str = include_str!("../../grammars/arkts.grammar");

static LANGUAGE: OnceLock<Result<Arc<Language>, LanguageError>> = OnceLock::new();

pub(crate) fn new_scanner() -> Box<dyn ExternalScanner> {
    Box::new(ArkTsScanner::new())
}

/// The cached ArkTS language, compiled with [`Language::arkts`] on first
/// call.
///
/// # Errors
///
/// The [`LanguageError`] from compiling [`GRAMMAR`]; the same error is
/// returned on every call.
pub fn try_language() -> Result<&'static Arc<Language>, &'static LanguageError> {
    LANGUAGE
        .get_or_init(|| {
            let _span = tracing::debug_span!("compile_arkts").entered();
            Language::arkts().map(Arc::new)
        })
        .as_ref()
}

/// The cached ArkTS language; see [`try_language`].
///
/// # Panics
///
/// If the bundled grammar fails to compile, which the crate's tests rule out.
#[must_use]
pub fn language() -> &'static Arc<Language> {
    try_language().expect("Internal error: the bundled ArkTS grammar does not compile")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_grammar_compiles() {
        let language = try_language().unwrap();
        assert_eq!(language.name(), "arkts");
        assert_eq!(language.table().externals().len(), 6);
        assert!(Arc::ptr_eq(language, super::language()));
    }

    #[test]
    fn test_fresh_language_is_independent_of_cache() {
        let fresh = Arc::new(Language::arkts().unwrap());
        assert!(!Arc::ptr_eq(&fresh, language()));
        assert_eq!(fresh.table().state_count(), language().table().state_count());

        let tree = crate::parser::Parser::new(fresh).parse("let x = 1;").unwrap();
        assert!(!tree.has_error());
    }

    #[test]
    fn test_external_token_order() {
        let table = language().table();
        let names: Vec<&str> = table.externals().iter().map(|kind| table.symbol_name(*kind)).collect();
        assert_eq!(
            names,
            [
                "_automatic_semicolon",
                "_template_start",
                "template_chars",
                "_interpolation_start",
                "_interpolation_end",
                "_template_end",
            ]
        );
    }
}
