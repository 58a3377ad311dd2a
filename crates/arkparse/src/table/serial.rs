//! Versioned table artifact
//!
//! Tables are stored as JSON. The `format` header is read first so that a
//! table written by an incompatible major version is refused before the rest
//! of the document is interpreted.

use crate::table::{Action, ParseTable};
use std::fmt;

#[cfg(feature = "serialize")]
use crate::error::TableLoadError;

/// Version of the serialized table layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FormatVersion {
    pub major: u16,
    pub minor: u16,
}

/// Layout version written by this build
pub const FORMAT_VERSION: FormatVersion = FormatVersion { major: 1, minor: 0 };

impl FormatVersion {
    /// Whether a runtime at `self` can load a table written at `other`.
    #[must_use]
    pub const fn can_load(self, other: Self) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(feature = "serialize")]
#[derive(serde::Deserialize)]
struct Header {
    format: FormatVersion,
}

#[cfg(feature = "serialize")]
impl ParseTable {
    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TableLoadError::Malformed`] if serialization fails.
    pub fn to_json(&self) -> Result<String, TableLoadError> {
        serde_json::to_string(self).map_err(|e| TableLoadError::Malformed(e.to_string()))
    }

    /// Serialize to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TableLoadError::Malformed`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, TableLoadError> {
        serde_json::to_string_pretty(self).map_err(|e| TableLoadError::Malformed(e.to_string()))
    }

    /// Load a table written by [`ParseTable::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`TableLoadError::IncompatibleVersion`] for a different major
    /// format version and [`TableLoadError::Malformed`] for anything that
    /// does not describe a consistent table.
    pub fn from_json(json: &str) -> Result<Self, TableLoadError> {
        let header: Header =
            serde_json::from_str(json).map_err(|e| TableLoadError::Malformed(e.to_string()))?;
        if !FORMAT_VERSION.can_load(header.format) {
            return Err(TableLoadError::IncompatibleVersion {
                found: header.format.to_string(),
                expected: FORMAT_VERSION.major,
            });
        }
        let table: Self =
            serde_json::from_str(json).map_err(|e| TableLoadError::Malformed(e.to_string()))?;
        table.validate().map_err(TableLoadError::Malformed)?;
        Ok(table)
    }
}

impl ParseTable {
    /// Check that every index in the table points at something.
    #[cfg_attr(not(feature = "serialize"), allow(dead_code))]
    pub(crate) fn validate(&self) -> Result<(), String> {
        let states = self.states.len();
        let symbols = self.symbols.len();
        if states == 0 {
            return Err("table has no states".into());
        }
        if self.terminal_count as usize > symbols || self.patterns.len() != self.terminal_count as usize {
            return Err("terminal count disagrees with symbols".into());
        }
        if self.start_kind.index() >= symbols {
            return Err("start symbol out of range".into());
        }
        for (id, state) in self.states.iter().enumerate() {
            if state.lex_mode as usize >= self.lex_modes.len() {
                return Err(format!("state {id} has an unknown lex mode"));
            }
            for (kind, actions) in &state.actions {
                if kind.index() >= self.terminal_count as usize {
                    return Err(format!("state {id} has an action on a non-terminal"));
                }
                for action in actions {
                    let ok = match action {
                        Action::Shift(target) => (*target as usize) < states,
                        Action::Reduce(production) => (*production as usize) < self.productions.len(),
                        Action::Accept => true,
                    };
                    if !ok {
                        return Err(format!("state {id} has an out-of-range action"));
                    }
                }
            }
            if state.gotos.iter().any(|(kind, target)| kind.index() >= symbols || *target as usize >= states) {
                return Err(format!("state {id} has an out-of-range goto"));
            }
        }
        if self.productions.iter().any(|p| p.lhs.index() >= symbols) {
            return Err("production with unknown left-hand side".into());
        }
        let all_terminals = self.extras.iter().chain(&self.externals).chain(&self.recover);
        if all_terminals.into_iter().any(|k| k.index() >= self.terminal_count as usize) {
            return Err("token list refers to a non-terminal".into());
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "serialize"))]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, TokenPattern};
    use crate::table::compile;

    fn table() -> ParseTable {
        let grammar = GrammarBuilder::new("t")
            .start("s")
            .token("id", TokenPattern::regex("[a-z]+"))
            .rule("s", Expr::repeat1(Expr::field("item", Expr::sym("id"))))
            .build()
            .unwrap();
        compile(&grammar).unwrap()
    }

    #[test]
    fn test_json_preserves_table() {
        let table = table();
        let loaded = ParseTable::from_json(&table.to_json().unwrap()).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_incompatible_major_version_refused() {
        let json = table().to_json().unwrap();
        let bumped = json.replacen("\"major\":1", "\"major\":2", 1);
        match ParseTable::from_json(&bumped) {
            Err(TableLoadError::IncompatibleVersion { found, expected }) => {
                assert_eq!(found, "2.0");
                assert_eq!(expected, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_newer_minor_version_loads() {
        let json = table().to_json().unwrap();
        let bumped = json.replacen("\"minor\":0", "\"minor\":7", 1);
        assert!(ParseTable::from_json(&bumped).is_ok());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            ParseTable::from_json("{\"format\":{\"major\":1,\"minor\":0}}"),
            Err(TableLoadError::Malformed(_))
        ));
        assert!(matches!(ParseTable::from_json("not json"), Err(TableLoadError::Malformed(_))));
    }
}
