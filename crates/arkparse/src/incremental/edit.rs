use crate::syntax::{LineIndex, Point, TextSize};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A single contiguous text replacement
///
/// `[start_byte, old_end_byte)` of the old text was replaced by text that
/// now spans `[start_byte, new_end_byte)`. Points mirror the byte offsets.
/// Edits applied in sequence are each expressed in the coordinates produced
/// by the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Edit {
    pub start_byte: TextSize,
    pub old_end_byte: TextSize,
    pub new_end_byte: TextSize,
    pub start_point: Point,
    pub old_end_point: Point,
    pub new_end_point: Point,
}

impl Edit {
    /// Edit from byte offsets alone; points are left at zero.
    #[must_use]
    pub fn new(start: usize, old_end: usize, new_end: usize) -> Self {
        Self {
            start_byte: TextSize::of(start),
            old_end_byte: TextSize::of(old_end.max(start)),
            new_end_byte: TextSize::of(new_end.max(start)),
            start_point: Point::default(),
            old_end_point: Point::default(),
            new_end_point: Point::default(),
        }
    }

    /// Describe replacing `range` of `old_text` with `replacement`, points
    /// included.
    #[must_use]
    pub fn replace(old_text: &str, range: Range<usize>, replacement: &str) -> Self {
        let len = old_text.len();
        let start = range.start.min(len);
        let end = range.end.clamp(start, len);
        let lines = LineIndex::new(old_text.as_bytes());
        let start_point = lines.point(TextSize::of(start));
        Self {
            start_byte: TextSize::of(start),
            old_end_byte: TextSize::of(end),
            new_end_byte: TextSize::of(start + replacement.len()),
            start_point,
            old_end_point: lines.point(TextSize::of(end)),
            new_end_point: start_point.advance(replacement.as_bytes()),
        }
    }

    /// Apply the replacement to `text`, returning the edit that describes it.
    pub fn apply(text: &mut String, range: Range<usize>, replacement: &str) -> Self {
        let edit = Self::replace(text, range, replacement);
        let start = edit.start_byte.to_usize();
        let end = edit.old_end_byte.to_usize();
        if text.is_char_boundary(start) && text.is_char_boundary(end) {
            text.replace_range(start..end, replacement);
        } else {
            let mut bytes = std::mem::take(text).into_bytes();
            bytes.splice(start..end, replacement.bytes());
            *text = String::from_utf8_lossy(&bytes).into_owned();
        }
        edit
    }

    #[must_use]
    pub const fn old_len(&self) -> usize {
        self.old_end_byte.to_usize() - self.start_byte.to_usize()
    }

    #[must_use]
    pub const fn new_len(&self) -> usize {
        self.new_end_byte.to_usize() - self.start_byte.to_usize()
    }

    /// Change in text length caused by the edit.
    #[must_use]
    pub const fn delta(&self) -> i64 {
        self.new_len() as i64 - self.old_len() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    /// Bytes `[start, end)` of the old text, unchanged
    Old { start: usize, end: usize },
    /// Inserted bytes
    New { len: usize },
}

impl Piece {
    const fn len(self) -> usize {
        match self {
            Self::Old { start, end } => end - start,
            Self::New { len } => len,
        }
    }

    fn split(self, at: usize) -> (Self, Self) {
        match self {
            Self::Old { start, end } => (Self::Old { start, end: start + at }, Self::Old { start: start + at, end }),
            Self::New { len } => (Self::New { len: at }, Self::New { len: len - at }),
        }
    }
}

/// An edit sequence folded into one mapping between old and new offsets
#[derive(Debug, Clone, Default)]
pub(crate) struct EditMap {
    /// Unchanged old ranges with the new offset each now starts at
    kept: Vec<(Range<usize>, usize)>,
    /// Old ranges whose text was removed or replaced; empty ranges are
    /// insertion points
    damaged: Vec<Range<usize>>,
    old_len: usize,
}

impl EditMap {
    pub fn new(old_len: usize, edits: &[Edit]) -> Self {
        let mut pieces = vec![Piece::Old { start: 0, end: old_len }];
        for edit in edits {
            let total: usize = pieces.iter().map(|p| p.len()).sum();
            let start = edit.start_byte.to_usize().min(total);
            let old_end = edit.old_end_byte.to_usize().clamp(start, total);
            let new_len = edit.new_end_byte.to_usize().saturating_sub(start);

            let (head, rest) = split_pieces(pieces, start);
            let (_, tail) = split_pieces(rest, old_end - start);
            pieces = head;
            pieces.push(Piece::New { len: new_len });
            pieces.extend(tail);
        }

        let mut map = Self {
            old_len,
            ..Self::default()
        };
        let mut new_offset = 0;
        let mut old_cursor = 0;
        let mut inserted = false;
        for piece in pieces {
            match piece {
                Piece::New { len } => {
                    inserted |= len > 0;
                    new_offset += len;
                }
                Piece::Old { start, end } if start == end => {}
                Piece::Old { start, end } => {
                    if start > old_cursor || inserted {
                        map.damaged.push(old_cursor..start);
                    }
                    match map.kept.last_mut() {
                        Some((range, new_start))
                            if !inserted && range.end == start && *new_start + range.len() == new_offset =>
                        {
                            range.end = end;
                        }
                        _ => map.kept.push((start..end, new_offset)),
                    }
                    new_offset += end - start;
                    old_cursor = end;
                    inserted = false;
                }
            }
        }
        if old_cursor < old_len || inserted {
            map.damaged.push(old_cursor..old_len);
        }
        map
    }

    /// Old offset holding the same byte as `new_offset`, if that byte survived.
    pub fn to_old(&self, new_offset: usize) -> Option<usize> {
        let index = self.kept.partition_point(|(_, new_start)| *new_start <= new_offset);
        let (range, new_start) = self.kept.get(index.checked_sub(1)?)?;
        let old = range.start + (new_offset - new_start);
        (old < range.end).then_some(old)
    }

    /// Whether a token spanning `[start, end)` whose lexing examined bytes up
    /// to `reach` is affected by the edits.
    pub fn damages(&self, start: usize, end: usize, reach: usize) -> bool {
        let reach = reach.max(end);
        let index = self.damaged.partition_point(|range| range.end < start);
        self.damaged[index..]
            .iter()
            .take_while(|range| range.start <= reach)
            .any(|range| {
                if range.is_empty() {
                    start < range.start && range.start < reach
                } else {
                    range.start < reach && range.end > start
                }
            })
    }

    /// Whether the old text's end is still the end, with nothing removed
    /// before it or inserted after it.
    pub fn end_intact(&self) -> bool {
        self.damaged.last().is_none_or(|range| range.end < self.old_len)
    }
}

fn split_pieces(pieces: Vec<Piece>, at: usize) -> (Vec<Piece>, Vec<Piece>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut offset = 0;
    for piece in pieces {
        let len = piece.len();
        if offset + len <= at {
            left.push(piece);
        } else if offset >= at {
            right.push(piece);
        } else {
            let (a, b) = piece.split(at - offset);
            left.push(a);
            right.push(b);
        }
        offset += len;
    }
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_computes_points() {
        let edit = Edit::replace("let x = 1;\nlet y", 8..9, "12\n3");
        assert_eq!(edit.start_byte, TextSize::from(8));
        assert_eq!(edit.old_end_byte, TextSize::from(9));
        assert_eq!(edit.new_end_byte, TextSize::from(12));
        assert_eq!(edit.start_point, Point::new(0, 8));
        assert_eq!(edit.new_end_point, Point::new(1, 1));
        assert_eq!(edit.delta(), 3);
    }

    #[test]
    fn test_apply_rewrites_text() {
        let mut text = String::from("let x = 1;");
        let edit = Edit::apply(&mut text, 8..9, "12");
        assert_eq!(text, "let x = 12;");
        assert_eq!(edit, Edit::replace("let x = 1;", 8..9, "12"));
    }

    #[test]
    fn test_single_edit_mapping() {
        let map = EditMap::new(10, &[Edit::new(8, 9, 10)]);
        assert_eq!(map.to_old(3), Some(3));
        assert_eq!(map.to_old(8), None);
        assert_eq!(map.to_old(9), None);
        assert_eq!(map.to_old(10), Some(9));
        assert!(map.damages(8, 9, 10));
        assert!(!map.damages(6, 7, 8));
        // `=` at 6 examined the space at 7 only.
        assert!(!map.damages(9, 10, 11));
    }

    #[test]
    fn test_insertion_damages_tokens_that_looked_past_it() {
        let map = EditMap::new(5, &[Edit::new(2, 2, 3)]);
        assert!(map.damages(0, 2, 3));
        assert!(!map.damages(2, 4, 5));
        assert_eq!(map.to_old(3), Some(2));
        assert_eq!(map.to_old(2), None);
    }

    #[test]
    fn test_sequential_edits_compose() {
        // "abcdef" -> delete "b" -> "acdef" -> insert "XY" at 3 -> "acdXYef"
        let map = EditMap::new(6, &[Edit::new(1, 2, 1), Edit::new(3, 3, 5)]);
        assert_eq!(map.to_old(0), Some(0));
        assert_eq!(map.to_old(1), Some(2));
        assert_eq!(map.to_old(2), Some(3));
        assert_eq!(map.to_old(3), None);
        assert_eq!(map.to_old(5), Some(4));
        assert_eq!(map.to_old(6), Some(5));
        assert!(map.damages(0, 2, 3));
        assert!(map.damages(3, 5, 6));
        assert!(!map.damages(4, 6, 7));
    }

    #[test]
    fn test_edit_at_end_of_text() {
        let map = EditMap::new(4, &[Edit::new(4, 4, 6)]);
        assert_eq!(map.to_old(3), Some(3));
        assert!(map.damages(2, 4, 5));
        assert!(!map.damages(0, 1, 2));
        assert!(!map.end_intact());
        assert!(EditMap::new(8, &[Edit::new(2, 3, 3)]).end_intact());
        assert!(!EditMap::new(8, &[Edit::new(6, 8, 6)]).end_intact());
    }

    #[test]
    fn test_no_edits_is_identity() {
        let map = EditMap::new(8, &[]);
        assert!(map.end_intact());
        assert_eq!(map.to_old(7), Some(7));
        assert_eq!(map.to_old(8), None);
    }
}
