//! Grammar source parser
//!
//! Parses the textual grammar format into a [`GrammarBuilder`]:
//!
//! ```text
//! #![grammar(calc)]
//! #![start(program)]
//! #![recover(";")]
//!
//! #[extra] @whitespace = /\s+/;
//! @number = /[0-9]+/;
//!
//! program = statement*;
//! statement = value: _expression ";";
//! _expression = number | binary;
//! #[left(1)]
//! binary = left: _expression operator: "+" right: _expression;
//! ```

use crate::error::{BuildError, GrammarSourceError};
use crate::grammar::{Assoc, Expr, Grammar, GrammarBuilder, Precedence, TokenPattern};
use crate::syntax::{TextRange, TextSize};

/// Parse grammar source text and build the grammar.
///
/// # Errors
///
/// Returns [`BuildError::Source`] for syntax errors (with a byte span) and
/// [`BuildError::Grammar`] when the declarations are inconsistent.
pub fn parse_grammar(source: &str) -> std::result::Result<Grammar, BuildError> {
    Ok(parse_grammar_source(source)?.build()?)
}

/// Parse grammar source text into a builder without validating names.
///
/// # Errors
///
/// Returns a [`GrammarSourceError`] pointing at the first syntax error.
pub fn parse_grammar_source(source: &str) -> Result<GrammarBuilder> {
    SourceParser { src: source, pos: 0 }.parse()
}

type Result<T> = std::result::Result<T, GrammarSourceError>;

struct Attr {
    name: String,
    level: Option<i32>,
    span: TextRange,
}

struct SourceParser<'a> {
    src: &'a str,
    pos: usize,
}

impl SourceParser<'_> {
    fn parse(mut self) -> Result<GrammarBuilder> {
        let mut builder = GrammarBuilder::new("grammar");
        loop {
            self.skip_trivia();
            if self.at_end() {
                return Ok(builder);
            }
            if self.src[self.pos..].starts_with("#![") {
                builder = self.inner_attribute(builder)?;
                continue;
            }
            let attrs = self.outer_attributes()?;
            if self.peek() == Some(b'@') {
                builder = self.token_def(builder, &attrs)?;
            } else {
                builder = self.rule_def(builder, &attrs)?;
            }
        }
    }

    fn inner_attribute(&mut self, builder: GrammarBuilder) -> Result<GrammarBuilder> {
        self.pos += 3;
        let (name, span) = self.ident()?;
        self.expect(b'(', &format!("expected `(` after `#![{name}`"), None)?;
        let mut args = Vec::new();
        loop {
            match self.peek() {
                Some(b')') => break,
                Some(b'"') => args.push(self.string()?),
                _ => args.push(self.ident()?.0),
            }
            if !self.eat(b',') {
                break;
            }
        }
        self.expect(b')', "expected `)` to close the attribute arguments", None)?;
        self.expect(b']', "expected `]` to close the attribute", None)?;

        let single = |args: &[String]| -> Result<String> {
            match args {
                [one] => Ok(one.clone()),
                _ => Err(GrammarSourceError::new(
                    format!("`#![{name}]` takes exactly one argument"),
                    span,
                )),
            }
        };
        Ok(match name.as_str() {
            "grammar" => builder.name(single(&args)?),
            "start" => builder.start(single(&args)?),
            "word" => builder.word(single(&args)?),
            "prefer" => builder.prefer(args),
            "recover" => builder.recover(args),
            _ => {
                return Err(GrammarSourceError::new(
                    format!("unknown grammar attribute `{name}`"),
                    span,
                )
                .with_help(
                    "valid grammar attributes are: `grammar`, `start`, `word`, `prefer`, `recover`",
                ));
            }
        })
    }

    fn outer_attributes(&mut self) -> Result<Vec<Attr>> {
        let mut attrs = Vec::new();
        while self.peek() == Some(b'#') {
            self.pos += 1;
            self.expect(b'[', "expected `[` after `#`", None)?;
            let (name, span) = self.ident()?;
            let level = if self.eat(b'(') {
                let level = self.integer()?;
                self.expect(b')', "expected `)` after the precedence level", None)?;
                Some(level)
            } else {
                None
            };
            self.expect(b']', "expected `]` to close the attribute", None)?;
            attrs.push(Attr { name, level, span });
        }
        Ok(attrs)
    }

    fn token_def(&mut self, builder: GrammarBuilder, attrs: &[Attr]) -> Result<GrammarBuilder> {
        self.pos += 1;
        let (name, _) = self.ident()?;
        let mut extra = false;
        let mut external = false;
        for attr in attrs {
            match attr.name.as_str() {
                "extra" => extra = true,
                "external" => external = true,
                other => {
                    return Err(GrammarSourceError::new(
                        format!("unknown token attribute `{other}`"),
                        attr.span,
                    )
                    .with_help("valid token attributes are: `extra`, `external`"));
                }
            }
        }

        if external {
            self.expect(
                b';',
                &format!("expected `;` after external token `{name}`"),
                Some("external tokens have no pattern: `#[external] @name;`"),
            )?;
            return Ok(builder.external(name));
        }

        self.expect(
            b'=',
            &format!("expected `=` after token name `{name}`"),
            Some("token definitions have the form: @name = \"literal\"; or @name = /regex/;"),
        )?;
        let pattern = match self.peek() {
            Some(b'"') => TokenPattern::Literal(self.string()?),
            Some(b'/') => TokenPattern::Regex(self.regex()?),
            _ => {
                return Err(self
                    .error_here("expected a string literal or `/regex/` pattern")
                    .with_help("token patterns are either \"text\" or /regex/"));
            }
        };
        self.expect(
            b';',
            &format!("expected `;` after token `{name}` pattern"),
            Some("token definitions must end with a semicolon"),
        )?;
        Ok(if extra {
            builder.extra(name, pattern)
        } else {
            builder.token(name, pattern)
        })
    }

    fn rule_def(&mut self, builder: GrammarBuilder, attrs: &[Attr]) -> Result<GrammarBuilder> {
        let (name, _) = self.ident()?;
        self.expect(
            b'=',
            &format!("expected `=` after rule name `{name}`"),
            Some("grammar rules have the form: name = expression;"),
        )?;
        let mut expr = self.choice()?;
        if let Some(prec) = precedence_of(attrs)? {
            expr = Expr::with_prec(prec, expr);
        }
        self.expect(
            b';',
            &format!("expected `;` after rule `{name}` expression"),
            Some("grammar rules must end with a semicolon"),
        )?;
        Ok(builder.rule(name, expr))
    }

    fn choice(&mut self) -> Result<Expr> {
        let mut alternatives = vec![self.alternative()?];
        while self.eat(b'|') {
            alternatives.push(self.alternative()?);
        }
        Ok(Expr::choice(alternatives))
    }

    fn alternative(&mut self) -> Result<Expr> {
        let attrs = self.outer_attributes()?;
        let mut items = Vec::new();
        while !matches!(self.peek(), None | Some(b'|' | b';' | b')' | b'#' | b'@'))
            && !self.at_rule_start()
        {
            items.push(self.postfix()?);
        }
        if items.is_empty() {
            return Err(self.error_here("expected expression").with_help(
                "valid grammar expressions include:\n\
                 - rule or token references: `expression`, `identifier`\n\
                 - literal strings: `\"+\"`, `\"let\"`\n\
                 - groups: `(a | b)`\n\
                 - repetitions: `a*`, `a+`, `a?`\n\
                 - fields: `name: identifier`",
            ));
        }
        let mut expr = Expr::seq(items);
        if let Some(prec) = precedence_of(&attrs)? {
            expr = Expr::with_prec(prec, expr);
        }
        Ok(expr)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let field = self.field_label()?;
        let mut expr = self.primary()?;
        loop {
            if self.eat(b'?') {
                expr = Expr::optional(expr);
            } else if self.eat(b'*') {
                expr = Expr::repeat(expr);
            } else if self.eat(b'+') {
                expr = Expr::repeat1(expr);
            } else {
                break;
            }
        }
        Ok(match field {
            Some(name) => Expr::field(name, expr),
            None => expr,
        })
    }

    /// `name =` begins the next rule, so the current one lacks its `;`.
    fn at_rule_start(&mut self) -> bool {
        let saved = self.pos;
        let result = self.ident().is_ok() && self.peek() == Some(b'=');
        self.pos = saved;
        result
    }

    fn field_label(&mut self) -> Result<Option<String>> {
        let saved = self.pos;
        if self.peek().is_some_and(is_ident_start) {
            let (name, _) = self.ident()?;
            if self.eat(b':') {
                return Ok(Some(name));
            }
        }
        self.pos = saved;
        Ok(None)
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.choice()?;
                self.expect(b')', "expected `)` to close the group", None)?;
                Ok(inner)
            }
            Some(b'"') => Ok(Expr::Literal(self.string()?)),
            Some(c) if is_ident_start(c) => Ok(Expr::Symbol(self.ident()?.0)),
            _ => Err(self.error_here("expected identifier, string literal, or `(`")),
        }
    }

    fn ident(&mut self) -> Result<(String, TextRange)> {
        self.skip_trivia();
        let start = self.pos;
        let bytes = self.src.as_bytes();
        if !bytes.get(start).copied().is_some_and(is_ident_start) {
            return Err(self.error_here("expected identifier"));
        }
        let mut end = start + 1;
        while bytes.get(end).copied().is_some_and(is_ident_continue) {
            end += 1;
        }
        self.pos = end;
        Ok((self.src[start..end].to_string(), span(start, end)))
    }

    fn integer(&mut self) -> Result<i32> {
        self.skip_trivia();
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut end = start;
        if bytes.get(end) == Some(&b'-') {
            end += 1;
        }
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
        match self.src[start..end].parse() {
            Ok(level) => {
                self.pos = end;
                Ok(level)
            }
            Err(_) => Err(GrammarSourceError::new(
                "expected an integer precedence level",
                span(start, end.max(start + 1)),
            )),
        }
    }

    fn string(&mut self) -> Result<String> {
        self.skip_trivia();
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += offset + 1;
                    return Ok(out);
                }
                '\\' => {
                    let Some((_, escaped)) = chars.next() else { break };
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                '\n' => break,
                other => out.push(other),
            }
        }
        Err(GrammarSourceError::new("unterminated string literal", span(start, start + 1))
            .with_help("string literals must close on the same line"))
    }

    fn regex(&mut self) -> Result<String> {
        self.skip_trivia();
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let mut in_class = false;
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '/' if !in_class => {
                    self.pos += offset + 1;
                    if out.is_empty() {
                        return Err(GrammarSourceError::new("empty regex pattern", span(start, self.pos)));
                    }
                    return Ok(out);
                }
                '\\' => {
                    let Some((_, escaped)) = chars.next() else { break };
                    if escaped != '/' {
                        out.push('\\');
                    }
                    out.push(escaped);
                }
                '[' => {
                    in_class = true;
                    out.push(c);
                }
                ']' => {
                    in_class = false;
                    out.push(c);
                }
                '\n' => break,
                other => out.push(other),
            }
        }
        Err(GrammarSourceError::new("unterminated regex pattern", span(start, start + 1))
            .with_help("regex patterns are written /.../ on a single line; escape `/` as `\\/`"))
    }

    fn expect(&mut self, byte: u8, message: &str, help: Option<&str>) -> Result<()> {
        if self.eat(byte) {
            return Ok(());
        }
        let mut err = self.error_here(message);
        if let Some(help) = help {
            err = err.with_help(help);
        }
        Err(err)
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_trivia();
        self.src.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_trivia(&mut self) {
        let bytes = self.src.as_bytes();
        loop {
            while bytes.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
                self.pos += 1;
            }
            if bytes[self.pos.min(bytes.len())..].starts_with(b"//") {
                self.pos = memchr::memchr(b'\n', &bytes[self.pos..]).map_or(bytes.len(), |i| self.pos + i);
            } else {
                return;
            }
        }
    }

    fn error_here(&mut self, message: &str) -> GrammarSourceError {
        self.skip_trivia();
        let end = self.src[self.pos..]
            .chars()
            .next()
            .map_or(self.pos, |c| self.pos + c.len_utf8());
        GrammarSourceError::new(message, span(self.pos, end))
    }
}

fn span(start: usize, end: usize) -> TextRange {
    TextRange::new(TextSize::of(start), TextSize::of(end))
}

fn precedence_of(attrs: &[Attr]) -> Result<Option<Precedence>> {
    let mut result = None;
    for attr in attrs {
        let assoc = match attr.name.as_str() {
            "left" => Assoc::Left,
            "right" => Assoc::Right,
            "prec" => Assoc::None,
            other => {
                return Err(GrammarSourceError::new(
                    format!("unknown rule attribute `{other}`"),
                    attr.span,
                )
                .with_help("valid rule attributes are: `left(n)`, `right(n)`, `prec(n)`"));
            }
        };
        result = Some(Precedence::new(attr.level.unwrap_or(0), assoc));
    }
    Ok(result)
}

const fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

const fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALC: &str = r#"
        #![grammar(calc)]
        #![start(program)]
        #![recover(";")]

        // trivia
        #[extra] @whitespace = /\s+/;
        @number = /[0-9]+/;
        @slash = /\//;
        #[external] @_template_chars;

        program = statement*;
        statement = value: _expression ";";
        _expression = number | binary | "(" _expression ")";
        binary = #[left(1)] (left: _expression "+" right: _expression)
               | #[left(2)] (left: _expression "*" right: _expression);
    "#;

    #[test]
    fn test_parse_calc_grammar() {
        let grammar = parse_grammar(CALC).unwrap();
        assert_eq!(grammar.name(), "calc");
        assert_eq!(grammar.start_rule(), "program");
        assert_eq!(grammar.rules().len(), 4);
        assert_eq!(grammar.tokens().len(), 4);
        assert!(grammar.token("whitespace").unwrap().extra);
        assert!(grammar.token("_template_chars").unwrap().is_external());
        assert_eq!(
            grammar.token("slash").unwrap().pattern,
            Some(TokenPattern::Regex("/".into()))
        );
        assert_eq!(grammar.recover_tokens(), &[";".to_string()]);
    }

    #[test]
    fn test_alternative_precedence() {
        let grammar = parse_grammar(CALC).unwrap();
        let binary = grammar.rule("binary").unwrap();
        let Expr::Choice(alternatives) = &binary.expr else {
            panic!("expected choice, got {}", binary.expr);
        };
        assert!(matches!(
            &alternatives[1],
            Expr::Prec { prec, .. } if *prec == Precedence::new(2, Assoc::Left)
        ));
    }

    #[test]
    fn test_field_label() {
        let builder = parse_grammar_source("#![start(a)] a = name: b?; b = \"x\";").unwrap();
        let grammar = builder.build().unwrap();
        assert_eq!(
            grammar.rule("a").unwrap().expr,
            Expr::field("name", Expr::optional(Expr::sym("b")))
        );
    }

    #[test]
    fn test_missing_semicolon_reports_span() {
        let source = "#![start(a)]\na = \"x\"\nb = \"y\";";
        let err = parse_grammar_source(source).unwrap_err();
        assert!(err.message.contains("expected `;` after rule `a`"));
        assert_eq!(err.span.start(), TextSize::from(21));
        assert!(err.help.is_some());
    }

    #[test]
    fn test_unknown_attribute() {
        let err = parse_grammar_source("#[bogus] a = \"x\";").unwrap_err();
        assert!(err.message.contains("unknown rule attribute"));
        assert_eq!(err.span, TextRange::new(TextSize::from(2), TextSize::from(7)));
    }

    #[test]
    fn test_unterminated_string() {
        let err = parse_grammar_source("a = \"x;\n").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn test_empty_alternative() {
        let err = parse_grammar_source("a = b | ;").unwrap_err();
        assert_eq!(err.message, "expected expression");
    }
}
