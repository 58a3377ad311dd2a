//! Row/column positions
//!
//! Edits and nodes carry [`Point`]s next to byte offsets. Rows are split on
//! `\n` only and columns count bytes, so a `\r\n` pair leaves the `\r` at the
//! end of its row.

use crate::syntax::TextSize;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based row and byte column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// The point reached after writing `text` starting at `self`.
    #[must_use]
    pub fn advance(self, text: &[u8]) -> Self {
        match memchr::memrchr(b'\n', text) {
            None => Self::new(self.row, self.column.saturating_add(len_u32(text.len()))),
            Some(last) => {
                let rows = memchr::memchr_iter(b'\n', text).count();
                Self::new(
                    self.row.saturating_add(len_u32(rows)),
                    len_u32(text.len() - last - 1),
                )
            }
        }
    }
}

impl fmt::Display for Point {
    /// One-based `line:column`, the way diagnostics print it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row + 1, self.column + 1)
    }
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Line index for converting byte offsets to points and back
///
/// Caches row start offsets for O(log n) binary search lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets of row starts (row 0 starts at 0)
    line_starts: Vec<TextSize>,
    text_len: TextSize,
}

impl LineIndex {
    #[must_use]
    pub fn new(text: &[u8]) -> Self {
        let mut line_starts = vec![TextSize::zero()];
        line_starts.extend(memchr::memchr_iter(b'\n', text).map(|i| TextSize::of(i + 1)));
        Self {
            line_starts,
            text_len: TextSize::of(text.len()),
        }
    }

    /// Point of a byte offset; offsets past the end clamp to the end.
    #[must_use]
    pub fn point(&self, offset: TextSize) -> Point {
        let offset = offset.min(self.text_len);
        let row = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let column = offset - self.line_starts[row];
        Point::new(len_u32(row), column.into())
    }

    /// Byte offset of a point, or `None` when the row does not exist.
    #[must_use]
    pub fn offset(&self, point: Point) -> Option<TextSize> {
        let start = *self.line_starts.get(point.row as usize)?;
        let end = self
            .line_starts
            .get(point.row as usize + 1)
            .copied()
            .unwrap_or(self.text_len);
        let offset = start + TextSize::from(point.column);
        (offset <= end).then_some(offset)
    }

    #[must_use]
    pub fn line_count(&self) -> u32 {
        len_u32(self.line_starts.len())
    }

    #[must_use]
    pub fn line_start(&self, row: u32) -> Option<TextSize> {
        self.line_starts.get(row as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_unix_line_endings() {
        let index = LineIndex::new(b"line 1\nline 2\nline 3");
        assert_eq!(index.point(TextSize::from(0)), Point::new(0, 0));
        assert_eq!(index.point(TextSize::from(6)), Point::new(0, 6));
        assert_eq!(index.point(TextSize::from(7)), Point::new(1, 0));
        assert_eq!(index.point(TextSize::from(14)), Point::new(2, 0));
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn test_point_crlf_keeps_carriage_return_on_row() {
        let index = LineIndex::new(b"ab\r\ncd");
        assert_eq!(index.point(TextSize::from(2)), Point::new(0, 2));
        assert_eq!(index.point(TextSize::from(4)), Point::new(1, 0));
    }

    #[test]
    fn test_point_clamps_past_end() {
        let index = LineIndex::new(b"abc");
        assert_eq!(index.point(TextSize::from(99)), Point::new(0, 3));
    }

    #[test]
    fn test_offset_round_trips_point() {
        let text = b"let a = 1;\nlet b = 2;\n";
        let index = LineIndex::new(text);
        for offset in 0..=text.len() {
            let offset = TextSize::of(offset);
            assert_eq!(index.offset(index.point(offset)), Some(offset));
        }
        assert_eq!(index.offset(Point::new(7, 0)), None);
    }

    #[test]
    fn test_point_advance() {
        let start = Point::new(2, 4);
        assert_eq!(start.advance(b"abc"), Point::new(2, 7));
        assert_eq!(start.advance(b"a\nbc"), Point::new(3, 2));
        assert_eq!(start.advance(b"\n\n"), Point::new(4, 0));
    }

    #[test]
    fn test_point_display_is_one_based() {
        assert_eq!(Point::new(0, 8).to_string(), "1:9");
    }
}
