//! arkparse tools
//!
//! The `arkparse` command-line program: compiles grammar files into
//! serialized parse tables and parses ArkTS sources with the built-in
//! grammar.

pub mod cli;
pub mod commands;
pub mod compile;

pub use commands::{ToolError, run};
