#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text size in bytes (UTF-8, or raw bytes for non-UTF-8 input)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TextSize(u32);

/// Half-open byte range `[start, end)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TextRange {
    start: TextSize,
    end: TextSize,
}

impl TextSize {
    #[must_use]
    pub const fn from(offset: u32) -> Self {
        Self(offset)
    }

    #[must_use]
    pub const fn into(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Byte offset from a `usize`, saturating at `u32::MAX`.
    #[must_use]
    pub fn of(offset: usize) -> Self {
        Self(u32::try_from(offset).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub const fn to_usize(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }
}

impl From<TextSize> for usize {
    fn from(size: TextSize) -> Self {
        size.0 as Self
    }
}

impl From<TextSize> for u32 {
    fn from(size: TextSize) -> Self {
        size.0
    }
}

impl std::ops::Add<Self> for TextSize {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign<Self> for TextSize {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::ops::Sub<Self> for TextSize {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for TextSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TextRange {
    #[must_use]
    pub const fn new(start: TextSize, end: TextSize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn at(start: TextSize, len: TextSize) -> Self {
        Self::new(start, TextSize(start.0.saturating_add(len.0)))
    }

    /// Empty range at `offset`.
    #[must_use]
    pub const fn empty(offset: TextSize) -> Self {
        Self::new(offset, offset)
    }

    #[must_use]
    pub const fn start(self) -> TextSize {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> TextSize {
        self.end
    }

    #[must_use]
    pub const fn len(self) -> TextSize {
        TextSize(self.end.0 - self.start.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    #[must_use]
    pub const fn contains(self, offset: TextSize) -> bool {
        offset.0 >= self.start.0 && offset.0 < self.end.0
    }

    #[must_use]
    pub const fn contains_range(self, other: Self) -> bool {
        other.start.0 >= self.start.0 && other.end.0 <= self.end.0
    }

    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let start = self.start.0.max(other.start.0);
        let end = self.end.0.min(other.end.0);

        if start < end {
            Some(Self::new(TextSize(start), TextSize(end)))
        } else {
            None
        }
    }

    /// Smallest range covering both.
    #[must_use]
    pub fn cover(self, other: Self) -> Self {
        Self::new(
            TextSize(self.start.0.min(other.start.0)),
            TextSize(self.end.0.max(other.end.0)),
        )
    }

    #[must_use]
    pub const fn to_std(self) -> std::ops::Range<usize> {
        self.start.0 as usize..self.end.0 as usize
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.0, self.end.0)
    }
}

#[cfg(feature = "diagnostics")]
impl From<TextRange> for miette::SourceSpan {
    fn from(range: TextRange) -> Self {
        use miette::SourceOffset;
        Self::new(
            SourceOffset::from(range.start().to_usize()),
            range.len().to_usize(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(TextSize::from(start), TextSize::from(end))
    }

    #[test]
    fn test_text_size_arithmetic_saturates() {
        let mut size = TextSize::from(u32::MAX - 1);
        size += TextSize::from(5);
        assert_eq!(size.into(), u32::MAX);
        assert_eq!((TextSize::from(3) - TextSize::from(10)).into(), 0);
        assert_eq!(TextSize::from(3).checked_sub(TextSize::from(4)), None);
    }

    #[test]
    fn test_text_range_at_and_len() {
        let r = TextRange::at(TextSize::from(10), TextSize::from(5));
        assert_eq!(r, range(10, 15));
        assert_eq!(r.len(), TextSize::from(5));
        assert!(!r.is_empty());
        assert!(TextRange::empty(TextSize::from(9)).is_empty());
    }

    #[test]
    fn test_text_range_contains_is_half_open() {
        let r = range(10, 20);
        assert!(r.contains(TextSize::from(10)));
        assert!(!r.contains(TextSize::from(20)));
        assert!(r.contains_range(range(12, 20)));
        assert!(!r.contains_range(range(5, 12)));
    }

    #[test]
    fn test_text_range_intersect_and_cover() {
        assert_eq!(range(10, 20).intersect(range(15, 25)), Some(range(15, 20)));
        assert_eq!(range(10, 20).intersect(range(20, 30)), None);
        assert_eq!(range(10, 20).cover(range(4, 12)), range(4, 20));
    }

    #[test]
    fn test_text_range_display() {
        assert_eq!(range(8, 10).to_string(), "8..10");
    }
}
