//! Grammar compilation for the `compile` command

use arkparse::error::diagnostics::format_with_location;
use arkparse::syntax::SyntaxKind;
use arkparse::{BuildError, CompileOptions, ParseTable, TextRange, TextSize, compile_with_options, parse_grammar};
use std::fmt::Write;

/// Read and compile grammar source text.
///
/// # Errors
///
/// The [`BuildError`] from parsing or compiling the grammar.
pub fn compile_source(source: &str, options: &CompileOptions) -> Result<ParseTable, BuildError> {
    let grammar = parse_grammar(source)?;
    Ok(compile_with_options(&grammar, options)?)
}

/// Where in `source` a build error should be reported. Source errors carry
/// their own span; compile errors point at the definition of the first rule
/// or token they name, or at the start of the file.
#[must_use]
pub fn error_span(error: &BuildError, source: &str) -> TextRange {
    match error {
        BuildError::Source(error) => error.span,
        BuildError::Grammar(error) => error
            .rules()
            .into_iter()
            .find_map(|name| {
                definition_offset(source, name).map(|offset| TextRange::at(TextSize::of(offset), TextSize::of(name.len())))
            })
            .unwrap_or_else(|| TextRange::empty(TextSize::zero())),
    }
}

/// `file:line:col: message` for a build error.
#[must_use]
pub fn render_error(error: &BuildError, source: &str, filename: &str) -> String {
    let mut message = error.to_string();
    if let BuildError::Source(error) = error
        && let Some(help) = &error.help
    {
        let _ = write!(message, " ({help})");
    }
    format_with_location(&message, error_span(error, source), source, Some(filename))
}

/// Offset of `name` where it is defined as a rule (`name =`) or token
/// (`@name =` / `@name;`), after any attributes on the same line.
fn definition_offset(source: &str, name: &str) -> Option<usize> {
    let mut line_start = 0;
    for line in source.split_inclusive('\n') {
        let mut rest = line.trim_start();
        while rest.starts_with("#[")
            && let Some(close) = rest.find(']')
        {
            rest = rest[close + 1..].trim_start();
        }
        let token = rest.strip_prefix('@');
        let column = line.len() - rest.len() + usize::from(token.is_some());
        if let Some(after) = token.unwrap_or(rest).strip_prefix(name) {
            let after = after.trim_start();
            if after.starts_with(';') || (after.starts_with('=') && !after.starts_with("==")) {
                return Some(line_start + column);
            }
        }
        line_start += line.len();
    }
    None
}

/// Rust source with one constant per named kind and per field.
#[must_use]
pub fn render_bindings(table: &ParseTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// Generated by `arkparse compile` for grammar `{}`.", table.grammar_name());
    let _ = writeln!(out);
    let _ = writeln!(out, "pub mod kind {{");
    for index in 0..table.symbol_count() {
        let Ok(index) = u16::try_from(index) else { break };
        let kind = SyntaxKind(index);
        let name = table.symbol_name(kind);
        if table.is_named(kind) && is_identifier(name) {
            let _ = writeln!(out, "    pub const {}: u16 = {index};", name.to_uppercase());
        }
    }
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    let _ = writeln!(out, "pub mod field {{");
    for name in table.field_names() {
        if let Some(field) = table.field_id(name)
            && is_identifier(name)
        {
            let _ = writeln!(out, "    pub const {}: u16 = {};", name.to_uppercase(), field.0);
        }
    }
    let _ = writeln!(out, "}}");
    out
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALC: &str = "#![grammar(calc)]\n#![start(sum)]\n@number = /[0-9]+/;\nsum = number (\"+\" number)*;\n";

    #[test]
    fn test_compile_and_bind() {
        let table = compile_source(CALC, &CompileOptions::default()).unwrap();
        let bindings = render_bindings(&table);
        assert!(bindings.contains("pub const NUMBER: u16"));
        assert!(bindings.contains("pub const SUM: u16"));
        assert!(!bindings.contains("\"+\""));
    }

    #[test]
    fn test_source_error_has_line_and_column() {
        let source = "#![start(sum)]\n@number = /[0-9]+/;\nsum = number\n";
        let err = compile_source(source, &CompileOptions::default()).unwrap_err();
        let rendered = render_error(&err, source, "calc.grammar");
        assert!(rendered.starts_with("calc.grammar:"), "{rendered}");
        assert!(rendered.split(':').nth(1).is_some_and(|line| line != "1"), "{rendered}");
    }

    #[test]
    fn test_grammar_error_points_at_definition() {
        let source = "#![start(sum)]\n@number = /[0-9]+/;\nsum = number;\n  orphan = number;\n";
        let err = compile_source(source, &CompileOptions::default()).unwrap_err();
        let rendered = render_error(&err, source, "g");
        assert!(rendered.starts_with("g:4:3: "), "{rendered}");
    }

    #[test]
    fn test_definition_offset_skips_references() {
        let source = "a = b;\nb = \"x\";\n";
        assert_eq!(definition_offset(source, "b"), Some(7));
        assert_eq!(definition_offset(source, "a"), Some(0));
        assert_eq!(definition_offset(source, "c"), None);
    }
}
