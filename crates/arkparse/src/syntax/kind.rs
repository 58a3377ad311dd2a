#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grammar symbol identifier used as a node kind.
///
/// Kinds are indices into a [`ParseTable`](crate::table::ParseTable)'s symbol
/// list: terminals first (starting with [`SyntaxKind::END`]), then
/// non-terminals. Human-readable names live in the table, so a kind is only
/// meaningful together with the language that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SyntaxKind(pub u16);

impl SyntaxKind {
    /// End of input. Always terminal `0`.
    pub const END: Self = Self(0);
    /// Error nodes and unrecognized characters.
    pub const ERROR: Self = Self(u16::MAX);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            f.write_str("ERROR")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Field name identifier, an index into the table's field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct FieldId(pub u16);

impl FieldId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}
