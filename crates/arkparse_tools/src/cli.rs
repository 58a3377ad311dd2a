//! Command-line interface for arkparse

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "arkparse")]
#[command(about = "Compile grammars and parse ArkTS sources")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a grammar source file into a serialized parse table
    Compile {
        /// Grammar source file
        grammar: PathBuf,

        /// Table output file (default: the grammar path with a `.json` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write indented JSON
        #[arg(long)]
        pretty: bool,

        /// Fail on conflicts that precedence and directives leave unresolved
        #[arg(long)]
        no_glr: bool,

        /// Conflict strategies to try, in order
        #[arg(long, value_delimiter = ',', default_value = "precedence,directives")]
        conflict_order: Vec<Strategy>,

        /// Also write Rust constants for the table's kinds and fields
        #[arg(long)]
        bindings: Option<PathBuf>,

        /// Render grammar errors with source snippets
        #[arg(long)]
        fancy: bool,
    },

    /// Parse a source file with the built-in ArkTS grammar and print the tree
    Parse {
        /// Source file
        input: PathBuf,

        /// Print errors as JSON instead of the tree
        #[arg(long)]
        json: bool,

        /// Exit with a failure code when the tree contains errors
        #[arg(long)]
        check: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    Precedence,
    Directives,
}

impl From<Strategy> for arkparse::ConflictStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Precedence => Self::Precedence,
            Strategy::Directives => Self::Directives,
        }
    }
}
