//! External scanner interface
//!
//! Tokens too context-sensitive for the static patterns are produced by an
//! [`ExternalScanner`]. The lexer asks it first, with the set of external
//! tokens the parser can accept, and persists its serialized state on every
//! token so that reparsing can resume mid-file.

use crate::lexer::decode_char;
use smallvec::SmallVec;

/// Serialized external scanner state, stored on every token.
pub type ScannerState = SmallVec<[u8; 8]>;

/// A stateful sub-lexer for context-sensitive tokens
///
/// `scan` returns the index (into the grammar's `#[external]` declarations)
/// of the token it recognized, with the token's end set through
/// [`ScanInput::mark_end`], or `None` to fall back to the static patterns.
/// When every entry of `valid` is `true` the parser is recovering from an
/// error; scanners usually decline to produce anything then.
///
/// `serialize` and `deserialize` must round-trip: the lexer restores the
/// state after a declined scan and before relexing at an earlier position.
pub trait ExternalScanner: Send {
    fn scan(&mut self, input: &mut ScanInput<'_>, valid: &[bool]) -> Option<usize>;

    fn serialize(&self, buf: &mut ScannerState);

    fn deserialize(&mut self, state: &[u8]);
}

/// Creates a fresh scanner for each parse
pub type ScannerFactory = fn() -> Box<dyn ExternalScanner>;

/// Character-level view of the input handed to an external scanner
#[derive(Debug)]
pub struct ScanInput<'a> {
    text: &'a [u8],
    start: usize,
    pos: usize,
    end: usize,
    examined: usize,
}

impl<'a> ScanInput<'a> {
    pub(crate) fn new(text: &'a [u8], start: usize) -> Self {
        Self {
            text,
            start,
            pos: start,
            end: start,
            examined: start,
        }
    }

    /// Character at the current position; `None` at end of input or on an
    /// invalid UTF-8 sequence.
    pub fn lookahead(&mut self) -> Option<char> {
        match decode_char(self.text, self.pos) {
            Some((c, width)) => {
                self.examined = self.examined.max(self.pos + width);
                Some(c)
            }
            None => {
                let seen = if self.pos >= self.text.len() { self.text.len() + 1 } else { self.pos + 1 };
                self.examined = self.examined.max(seen);
                None
            }
        }
    }

    /// Character after the current one, without moving.
    pub fn peek_next(&mut self) -> Option<char> {
        let (_, width) = decode_char(self.text, self.pos)?;
        let saved = self.pos;
        self.pos += width;
        let next = self.lookahead();
        self.pos = saved;
        next
    }

    /// Move past the current character.
    pub fn advance(&mut self) {
        match decode_char(self.text, self.pos) {
            Some((_, width)) => self.pos += width,
            None if self.pos < self.text.len() => self.pos += 1,
            None => {}
        }
        self.examined = self.examined.max(self.pos);
    }

    /// End the token at the current position. Characters read afterwards
    /// are lookahead only.
    pub fn mark_end(&mut self) {
        self.end = self.pos;
    }

    #[must_use]
    pub fn eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Byte offset of the current position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Byte offset the token starts at.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Remaining input from the current position.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        self.text.get(self.pos..).unwrap_or_default()
    }

    /// Jump forward to `offset`, e.g. after a `memchr` search over [`rest`](Self::rest).
    pub fn skip_to(&mut self, offset: usize) {
        self.pos = offset.clamp(self.pos, self.text.len());
        self.examined = self.examined.max(self.pos);
    }

    pub(crate) const fn token_end(&self) -> usize {
        self.end
    }

    pub(crate) const fn examined(&self) -> usize {
        self.examined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_end_separates_token_from_lookahead() {
        let mut input = ScanInput::new(b"ab\ncd", 0);
        input.advance();
        input.mark_end();
        input.advance();
        assert_eq!(input.lookahead(), Some('\n'));
        assert_eq!(input.token_end(), 1);
        assert_eq!(input.examined(), 3);
    }

    #[test]
    fn test_eof_is_examined() {
        let mut input = ScanInput::new(b"a", 0);
        input.advance();
        assert!(input.eof());
        assert_eq!(input.lookahead(), None);
        assert_eq!(input.examined(), 2);
    }

    #[test]
    fn test_multibyte_advance() {
        let mut input = ScanInput::new("é!".as_bytes(), 0);
        assert_eq!(input.lookahead(), Some('é'));
        input.advance();
        assert_eq!(input.position(), 2);
        assert_eq!(input.peek_next(), None);
        assert_eq!(input.lookahead(), Some('!'));
    }

    #[test]
    fn test_invalid_byte_is_skipped_as_one() {
        let mut input = ScanInput::new(&[0xff, b'a'], 0);
        assert_eq!(input.lookahead(), None);
        input.advance();
        assert_eq!(input.lookahead(), Some('a'));
    }
}
