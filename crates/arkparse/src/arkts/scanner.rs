//! External scanner for ArkTS
//!
//! Produces the tokens that depend on more than the current parser state:
//!
//! - `_automatic_semicolon`: a zero-width statement terminator before a line
//!   break or a closing `}`, unless the next line continues the expression.
//!   Never produced at the end of input, so a final statement without `;`
//!   gets a missing semicolon instead.
//! - template literal pieces: the opening and closing backtick, the literal
//!   text between substitutions, and the `${` / `}` around each substitution.
//!
//! The scanner keeps a stack of open templates and substitutions. It is
//! serialized into every token, one byte per frame, so a reparse can resume
//! inside a template.

use crate::lexer::{ExternalScanner, ScanInput, ScannerState};

const AUTOMATIC_SEMICOLON: usize = 0;
const TEMPLATE_START: usize = 1;
const TEMPLATE_CHARS: usize = 2;
const INTERPOLATION_START: usize = 3;
const INTERPOLATION_END: usize = 4;
const TEMPLATE_END: usize = 5;

/// Deepest nesting of templates and substitutions the scanner tracks
const MAX_FRAMES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Frame {
    Template = 0,
    Interpolation = 1,
}

#[derive(Debug, Default, Clone)]
pub struct ArkTsScanner {
    frames: Vec<Frame>,
}

impl ArkTsScanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open templates and substitutions.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn scan_template(&mut self, input: &mut ScanInput<'_>, valid: &[bool]) -> Option<usize> {
        match input.lookahead() {
            Some('`') if valid[TEMPLATE_END] => {
                input.advance();
                input.mark_end();
                self.frames.pop();
                return Some(TEMPLATE_END);
            }
            Some('$') if valid[INTERPOLATION_START] && input.peek_next() == Some('{') => {
                if self.frames.len() >= MAX_FRAMES {
                    return None;
                }
                input.advance();
                input.advance();
                input.mark_end();
                self.frames.push(Frame::Interpolation);
                return Some(INTERPOLATION_START);
            }
            _ => {}
        }
        if !valid[TEMPLATE_CHARS] {
            return None;
        }

        let mut consumed = false;
        loop {
            match input.lookahead() {
                None if input.eof() => break,
                Some('`') => break,
                Some('$') if input.peek_next() == Some('{') => break,
                Some('\\') => {
                    input.advance();
                    input.advance();
                }
                _ => input.advance(),
            }
            consumed = true;
        }
        input.mark_end();
        consumed.then_some(TEMPLATE_CHARS)
    }
}

impl ExternalScanner for ArkTsScanner {
    fn scan(&mut self, input: &mut ScanInput<'_>, valid: &[bool]) -> Option<usize> {
        // Every token is valid only while the parser is recovering.
        if valid.iter().all(|v| *v) {
            return None;
        }

        let top = self.frames.last().copied();
        if top == Some(Frame::Template) && (valid[TEMPLATE_CHARS] || valid[INTERPOLATION_START] || valid[TEMPLATE_END]) {
            return self.scan_template(input, valid);
        }
        if valid[INTERPOLATION_END] && top == Some(Frame::Interpolation) && input.lookahead() == Some('}') {
            input.advance();
            input.mark_end();
            self.frames.pop();
            return Some(INTERPOLATION_END);
        }
        if valid[TEMPLATE_START] && input.lookahead() == Some('`') {
            if self.frames.len() >= MAX_FRAMES {
                return None;
            }
            input.advance();
            input.mark_end();
            self.frames.push(Frame::Template);
            return Some(TEMPLATE_START);
        }
        if valid[AUTOMATIC_SEMICOLON] && automatic_semicolon(input) {
            return Some(AUTOMATIC_SEMICOLON);
        }
        None
    }

    fn serialize(&self, buf: &mut ScannerState) {
        buf.clear();
        buf.extend(self.frames.iter().map(|frame| *frame as u8));
    }

    fn deserialize(&mut self, state: &[u8]) {
        self.frames.clear();
        self.frames.extend(state.iter().take(MAX_FRAMES).map(|byte| match byte {
            0 => Frame::Template,
            _ => Frame::Interpolation,
        }));
    }
}

/// Whether a statement ends here. The token is zero-width; everything
/// read past the current position is lookahead.
fn automatic_semicolon(input: &mut ScanInput<'_>) -> bool {
    input.mark_end();
    let mut newline = false;
    loop {
        match input.lookahead() {
            None if input.eof() => return false,
            None => return newline,
            Some('\n' | '\r' | '\u{2028}' | '\u{2029}') => {
                newline = true;
                input.advance();
            }
            Some(c) if c.is_whitespace() => input.advance(),
            Some('/') => match input.peek_next() {
                Some('/') => {
                    let rest = input.rest();
                    let end = memchr::memchr(b'\n', rest).unwrap_or(rest.len());
                    input.skip_to(input.position() + end);
                }
                Some('*') => {
                    let rest = input.rest();
                    let Some(close) = memchr::memmem::find(&rest[2..], b"*/") else {
                        input.skip_to(input.position() + rest.len());
                        return false;
                    };
                    newline |= memchr::memchr2(b'\n', b'\r', &rest[2..2 + close]).is_some();
                    input.skip_to(input.position() + close + 4);
                }
                _ => return false,
            },
            Some('}') => return true,
            Some(c) => return newline && !continues_expression(c, input),
        }
    }
}

/// Whether a line starting with `c` continues the previous expression.
fn continues_expression(c: char, input: &mut ScanInput<'_>) -> bool {
    match c {
        ',' | '.' | '?' | ':' | ';' | '=' | '*' | '%' | '<' | '>' | '|' | '&' | '^' | '[' | '(' => true,
        '+' | '-' => input.peek_next() != Some(c),
        '!' => input.peek_next() == Some('='),
        'i' => continues_with_keyword(input),
        _ => false,
    }
}

/// `in` or `instanceof` at the current position.
fn continues_with_keyword(input: &mut ScanInput<'_>) -> bool {
    let mut word = String::new();
    while let Some(c) = input.lookahead() {
        if !(c.is_alphanumeric() || c == '_' || c == '$') || word.len() > "instanceof".len() {
            break;
        }
        word.push(c);
        input.advance();
    }
    word == "in" || word == "instanceof"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_but_recovery() -> Vec<bool> {
        vec![true, true, true, true, true, false]
    }

    fn only(index: usize) -> Vec<bool> {
        let mut valid = vec![false; 6];
        valid[index] = true;
        valid
    }

    fn scan(scanner: &mut ArkTsScanner, text: &str, valid: &[bool]) -> Option<(usize, usize)> {
        let mut input = ScanInput::new(text.as_bytes(), 0);
        scanner.scan(&mut input, valid).map(|token| (token, input.token_end()))
    }

    #[test]
    fn test_semicolon_before_newline() {
        let mut scanner = ArkTsScanner::new();
        assert_eq!(scan(&mut scanner, "  \nfoo()", &only(AUTOMATIC_SEMICOLON)), Some((0, 0)));
        assert_eq!(scan(&mut scanner, " // note\nfoo()", &only(AUTOMATIC_SEMICOLON)), Some((0, 0)));
        assert_eq!(scan(&mut scanner, " /* a\n b */ foo()", &only(AUTOMATIC_SEMICOLON)), Some((0, 0)));
    }

    #[test]
    fn test_semicolon_before_closing_brace() {
        let mut scanner = ArkTsScanner::new();
        assert_eq!(scan(&mut scanner, " }", &only(AUTOMATIC_SEMICOLON)), Some((0, 0)));
    }

    #[test]
    fn test_no_semicolon_when_line_continues() {
        let mut scanner = ArkTsScanner::new();
        for text in [" + 1", "\n+ 1", "\n.foo()", "\n(a)", "\n  instanceof Foo", "\n in b", "\n;", " /* x */ y"] {
            assert_eq!(scan(&mut scanner, text, &only(AUTOMATIC_SEMICOLON)), None, "{text:?}");
        }
        assert_eq!(scan(&mut scanner, "\n++i", &only(AUTOMATIC_SEMICOLON)), Some((0, 0)));
        assert_eq!(scan(&mut scanner, "\nindex = 1", &only(AUTOMATIC_SEMICOLON)), Some((0, 0)));
    }

    #[test]
    fn test_no_semicolon_at_end_of_input() {
        let mut scanner = ArkTsScanner::new();
        assert_eq!(scan(&mut scanner, "", &only(AUTOMATIC_SEMICOLON)), None);
        assert_eq!(scan(&mut scanner, "  \n  ", &only(AUTOMATIC_SEMICOLON)), None);
    }

    #[test]
    fn test_template_frames() {
        let mut scanner = ArkTsScanner::new();
        assert_eq!(scan(&mut scanner, "`a${b}`", &only(TEMPLATE_START)), Some((TEMPLATE_START, 1)));
        assert_eq!(scanner.depth(), 1);

        let inside = [false, false, true, true, false, true];
        assert_eq!(scan(&mut scanner, "a\\`b${x}`", &inside), Some((TEMPLATE_CHARS, 4)));
        assert_eq!(scan(&mut scanner, "${x}`", &inside), Some((INTERPOLATION_START, 2)));
        assert_eq!(scanner.depth(), 2);

        assert_eq!(scan(&mut scanner, "}`", &only(INTERPOLATION_END)), Some((INTERPOLATION_END, 1)));
        assert_eq!(scan(&mut scanner, "`", &inside), Some((TEMPLATE_END, 1)));
        assert_eq!(scanner.depth(), 0);
    }

    #[test]
    fn test_braces_outside_substitution_are_not_scanned() {
        let mut scanner = ArkTsScanner::new();
        assert_eq!(scan(&mut scanner, "}", &only(INTERPOLATION_END)), None);
    }

    #[test]
    fn test_recovery_mode_declines() {
        let mut scanner = ArkTsScanner::new();
        assert_eq!(scan(&mut scanner, "`x`", &[true; 6]), None);
        assert_eq!(scanner.depth(), 0);
        assert!(scan(&mut scanner, "`x`", &all_but_recovery()).is_some());
    }

    #[test]
    fn test_state_round_trip() {
        let mut scanner = ArkTsScanner::new();
        scan(&mut scanner, "`", &only(TEMPLATE_START));
        scan(&mut scanner, "${", &only(INTERPOLATION_START));
        let mut state = ScannerState::new();
        scanner.serialize(&mut state);
        assert_eq!(state.as_slice(), &[0, 1]);

        let mut restored = ArkTsScanner::new();
        restored.deserialize(&state);
        assert_eq!(restored.frames, scanner.frames);
        restored.deserialize(&[]);
        assert_eq!(restored.depth(), 0);
    }
}
