//! # Lexer
//!
//! Contextual lexing over a [`ParseTable`]'s token patterns.
//!
//! All patterns are compiled into one DFA. For each request the lexer is
//! given the parser's lex mode (the terminals the current state can act on)
//! and picks the longest match among those terminals only, so the same text
//! may lex differently depending on what the parser expects next. When
//! nothing valid matches it falls back to every terminal (error mode) and
//! finally to a one-character `ERROR` token, so lexing always makes progress.
//!
//! Ties at equal length go to literals over patterns, then to the terminal
//! declared first. When the grammar names a word token, a literal that the
//! word pattern also matches is only taken if the word match is not longer
//! (`letter` is an identifier, not `let` + `ter`).
//!
//! Context-sensitive tokens come from an [`ExternalScanner`], queried before
//! the static patterns whenever one of its tokens is valid.

mod pattern;
mod scanner;

pub use scanner::{ExternalScanner, ScanInput, ScannerFactory, ScannerState};

use crate::error::LanguageError;
use crate::grammar::TokenPattern;
use crate::syntax::SyntaxKind;
use crate::table::{ParseTable, TokenSet};
use pattern::{Dfa, Nfa};
use smallvec::SmallVec;

/// One lexed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    /// `SyntaxKind::ERROR` when no terminal matched
    pub kind: SyntaxKind,
    pub start: usize,
    pub end: usize,
    /// One past the last byte the decision depended on; `len + 1` when the
    /// end of input was observed
    pub examined: usize,
    /// Produced by the external scanner
    pub external: bool,
    /// Scanner state after an external token
    pub scanner_state: Option<ScannerState>,
}

impl Lexeme {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// What the parser can accept at the position being lexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    /// A lex mode from the table
    Mode(u16),
    /// Any terminal; used while recovering from errors
    Error,
}

/// Compiled lexer for one table
#[derive(Debug, Clone)]
pub struct Lexer {
    dfa: Dfa,
    literal: Vec<bool>,
    keyword: Vec<bool>,
    word: Option<u16>,
    externals: Vec<SyntaxKind>,
    /// Lex mode plus extras, per mode
    modes: Vec<TokenSet>,
    all: TokenSet,
}

/// Whether the lexer can compile `regex`, with the reason if not.
pub(crate) fn check_pattern(regex: &str) -> Result<(), String> {
    Nfa::new().add_regex(regex, 0)
}

impl Lexer {
    /// Compile the token patterns of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`LanguageError::Pattern`] for a regex the lexer cannot
    /// compile (look-around assertions, oversized repetitions).
    pub fn new(table: &ParseTable) -> Result<Self, LanguageError> {
        let terminal_count = table.terminal_count();
        let mut nfa = Nfa::new();
        let mut literal = vec![false; terminal_count];
        for id in 0..terminal_count {
            let kind = SyntaxKind(id as u16);
            match table.token_pattern(kind) {
                Some(TokenPattern::Literal(text)) => {
                    literal[id] = true;
                    nfa.add_literal(text, kind.0);
                }
                Some(TokenPattern::Regex(regex)) => {
                    nfa.add_regex(regex, kind.0).map_err(|message| LanguageError::Pattern {
                        token: table.symbol_name(kind).to_owned(),
                        message,
                    })?;
                }
                None => {}
            }
        }
        let dfa = Dfa::from_nfa(&nfa);

        let word = table.word_token().map(|kind| kind.0);
        let keyword = (0..terminal_count)
            .map(|id| match (word, table.token_pattern(SyntaxKind(id as u16))) {
                (Some(word), Some(TokenPattern::Literal(text))) => dfa.matches_exactly(text, word),
                _ => false,
            })
            .collect();

        let mut modes = Vec::with_capacity(table.lex_mode_count());
        for mode in 0..table.lex_mode_count() {
            let mut set = table.valid_tokens(mode as u16).cloned().unwrap_or_default();
            for extra in table.extras() {
                set.insert(extra.index());
            }
            modes.push(set);
        }
        let all: TokenSet = (0..terminal_count).collect();

        tracing::debug!(
            grammar = table.grammar_name(),
            dfa_states = dfa.state_count(),
            lex_modes = modes.len(),
            "built lexer"
        );
        Ok(Self {
            dfa,
            literal,
            keyword,
            word,
            externals: table.externals().to_vec(),
            modes,
            all,
        })
    }

    /// Terminals valid in `state`, extras included.
    #[must_use]
    pub fn valid_set(&self, state: LexState) -> &TokenSet {
        match state {
            LexState::Mode(mode) => self.modes.get(mode as usize).unwrap_or(&self.all),
            LexState::Error => &self.all,
        }
    }

    /// Lex one token at `pos`.
    ///
    /// `scanner` is queried first when any external token is valid. A
    /// zero-width external token is only accepted if `allow_empty_external`
    /// is set, so a scanner cannot stall the parser at one position.
    pub fn next_token(
        &self,
        text: &[u8],
        pos: usize,
        state: LexState,
        scanner: Option<&mut (dyn ExternalScanner + '_)>,
        allow_empty_external: bool,
    ) -> Lexeme {
        let valid = self.valid_set(state);
        let mut examined = pos;

        if let Some(scanner) = scanner
            && !self.externals.is_empty()
        {
            let flags: SmallVec<[bool; 8]> = self
                .externals
                .iter()
                .map(|kind| state == LexState::Error || valid.contains(kind.index()))
                .collect();
            if flags.iter().any(|flag| *flag) {
                let mut saved = ScannerState::new();
                scanner.serialize(&mut saved);
                let mut input = ScanInput::new(text, pos);
                let result = scanner.scan(&mut input, &flags);
                examined = examined.max(input.examined());
                let end = input.token_end();
                match result.and_then(|index| self.externals.get(index).map(|kind| (index, *kind))) {
                    Some((index, kind)) if flags[index] && (end > pos || allow_empty_external) => {
                        let mut state_after = ScannerState::new();
                        scanner.serialize(&mut state_after);
                        return Lexeme {
                            kind,
                            start: pos,
                            end,
                            examined,
                            external: true,
                            scanner_state: Some(state_after),
                        };
                    }
                    _ => scanner.deserialize(&saved),
                }
            }
        }

        if pos >= text.len() {
            return Lexeme {
                kind: SyntaxKind::END,
                start: text.len(),
                end: text.len(),
                examined: text.len() + 1,
                external: false,
                scanner_state: None,
            };
        }

        let scan = self.dfa.scan(text, pos);
        examined = examined.max(scan.examined);
        let word_end = self.word.and_then(|word| {
            scan.ends
                .iter()
                .rev()
                .find(|(_, dfa_state)| self.dfa.accepts(*dfa_state).contains(&word))
                .map(|(end, _)| *end)
        });

        let chosen = self
            .select(&scan.ends, valid, word_end)
            .or_else(|| self.select(&scan.ends, &self.all, word_end));
        let (kind, end) = chosen.unwrap_or_else(|| (SyntaxKind::ERROR, error_char_end(text, pos)));
        Lexeme {
            kind,
            start: pos,
            end,
            examined,
            external: false,
            scanner_state: None,
        }
    }

    fn select(&self, ends: &[(usize, u32)], valid: &TokenSet, word_end: Option<usize>) -> Option<(SyntaxKind, usize)> {
        for (end, dfa_state) in ends.iter().rev() {
            let mut best: Option<u16> = None;
            for &terminal in self.dfa.accepts(*dfa_state) {
                let id = terminal as usize;
                if !valid.contains(id) {
                    continue;
                }
                if self.keyword[id] && word_end.is_some_and(|word_end| word_end > *end) {
                    continue;
                }
                best = match best {
                    Some(current) if !self.literal[id] || self.literal[current as usize] => Some(current),
                    _ => Some(terminal),
                };
            }
            if let Some(terminal) = best {
                return Some((SyntaxKind(terminal), *end));
            }
        }
        None
    }
}

/// Decode one UTF-8 character at `pos`; `None` at the end of input or on an
/// invalid or truncated sequence.
pub(crate) fn decode_char(text: &[u8], pos: usize) -> Option<(char, usize)> {
    let first = *text.get(pos)?;
    let width = match first {
        0x00..=0x7f => return Some((char::from(first), 1)),
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => return None,
    };
    let bytes = text.get(pos..pos + width)?;
    std::str::from_utf8(bytes).ok()?.chars().next().map(|c| (c, width))
}

fn error_char_end(text: &[u8], pos: usize) -> usize {
    decode_char(text, pos).map_or(pos + 1, |(_, width)| pos + width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, TokenPattern};
    use crate::table::compile;

    fn table() -> ParseTable {
        let grammar = GrammarBuilder::new("lex")
            .start("program")
            .word("identifier")
            .token("identifier", TokenPattern::regex("[a-z]+"))
            .token("number", TokenPattern::regex("[0-9]+"))
            .extra("whitespace", TokenPattern::regex(r"\s+"))
            .rule("program", Expr::repeat(Expr::sym("_statement")))
            .rule(
                "_statement",
                Expr::choice([Expr::sym("declaration"), Expr::sym("division")]),
            )
            .rule(
                "declaration",
                Expr::seq([Expr::lit("let"), Expr::sym("identifier"), Expr::lit(";")]),
            )
            .rule(
                "division",
                Expr::seq([Expr::sym("number"), Expr::lit("/"), Expr::sym("number"), Expr::lit(";")]),
            )
            .build()
            .unwrap();
        compile(&grammar).unwrap()
    }

    fn lex_all(lexer: &Lexer, text: &str) -> Vec<(String, SyntaxKind)> {
        let mut pos = 0;
        let mut out = Vec::new();
        while pos < text.len() {
            let token = lexer.next_token(text.as_bytes(), pos, LexState::Error, None, false);
            out.push((text[token.start..token.end].to_owned(), token.kind));
            pos = token.end;
        }
        out
    }

    #[test]
    fn test_keyword_needs_word_boundary() {
        let table = table();
        let lexer = Lexer::new(&table).unwrap();
        let identifier = table.kind_for_name("identifier").unwrap();
        let let_kw = table.kind_for_name("let").unwrap();
        let tokens = lex_all(&lexer, "let letter");
        assert_eq!(tokens[0], ("let".to_owned(), let_kw));
        assert_eq!(tokens[2], ("letter".to_owned(), identifier));
    }

    #[test]
    fn test_contextual_validity_limits_choices() {
        let table = table();
        let lexer = Lexer::new(&table).unwrap();
        let identifier = table.kind_for_name("identifier").unwrap();
        let start_mode = table.lex_mode(0);
        // In the start state `let` is valid and beats the identifier.
        let token = lexer.next_token(b"let", 0, LexState::Mode(start_mode), None, false);
        assert_eq!(table.symbol_name(token.kind), "let");
        assert_eq!(token.examined, 4);
        // With only identifiers valid the keyword literal is not considered.
        let mode = (0..table.lex_mode_count() as u16)
            .find(|mode| {
                let set = table.valid_tokens(*mode).unwrap();
                set.contains(identifier.index()) && set.len() == 1
            })
            .unwrap();
        let token = lexer.next_token(b"let", 0, LexState::Mode(mode), None, false);
        assert_eq!(token.kind, identifier);
    }

    #[test]
    fn test_unknown_character_is_error_token() {
        let table = table();
        let lexer = Lexer::new(&table).unwrap();
        let tokens = lex_all(&lexer, "é#");
        assert_eq!(tokens, vec![("é".to_owned(), SyntaxKind::ERROR), ("#".to_owned(), SyntaxKind::ERROR)]);
    }

    #[test]
    fn test_end_of_input() {
        let table = table();
        let lexer = Lexer::new(&table).unwrap();
        let token = lexer.next_token(b"x", 1, LexState::Mode(0), None, false);
        assert_eq!(token.kind, SyntaxKind::END);
        assert!(token.is_empty());
        assert_eq!(token.examined, 2);
    }

    #[test]
    fn test_truncated_utf8_is_one_error_byte() {
        let table = table();
        let lexer = Lexer::new(&table).unwrap();
        let token = lexer.next_token(&[b'a', 0xe2, 0x82], 1, LexState::Error, None, false);
        assert_eq!(token.kind, SyntaxKind::ERROR);
        assert_eq!((token.start, token.end), (1, 2));
    }

    struct Marker;

    impl ExternalScanner for Marker {
        fn scan(&mut self, input: &mut ScanInput<'_>, valid: &[bool]) -> Option<usize> {
            if valid[0] && input.lookahead() == Some('!') {
                input.advance();
                input.mark_end();
                return Some(0);
            }
            input.mark_end();
            Some(0)
        }

        fn serialize(&self, _buf: &mut ScannerState) {}

        fn deserialize(&mut self, _state: &[u8]) {}
    }

    #[test]
    fn test_external_scanner_runs_first_and_empty_tokens_are_guarded() {
        let grammar = GrammarBuilder::new("ext")
            .start("program")
            .external("bang")
            .token("identifier", TokenPattern::regex("[a-z!]+"))
            .rule("program", Expr::seq([Expr::sym("bang"), Expr::sym("identifier")]))
            .build()
            .unwrap();
        let table = compile(&grammar).unwrap();
        let lexer = Lexer::new(&table).unwrap();
        let bang = table.kind_for_name("bang").unwrap();
        let mut scanner = Marker;
        let token = lexer.next_token(b"!ab", 0, LexState::Error, Some(&mut scanner), false);
        assert_eq!((token.kind, token.end, token.external), (bang, 1, true));
        // The scanner offers an empty token; without permission the static
        // patterns take over.
        let token = lexer.next_token(b"ab", 0, LexState::Error, Some(&mut scanner), false);
        assert_eq!(table.symbol_name(token.kind), "identifier");
        let token = lexer.next_token(b"ab", 0, LexState::Error, Some(&mut scanner), true);
        assert_eq!((token.kind, token.end), (bang, 0));
    }
}
