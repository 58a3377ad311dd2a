//! Command implementations

use crate::cli::Commands;
use crate::compile::{compile_source, render_bindings, render_error};
use arkparse::{Cancelled, CompileOptions, Language, Parser, TableLoadError};
use miette::{NamedSource, Report};
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a command, already formatted for the terminal
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Grammar diagnostic, rendered with its location
    #[error("{0}")]
    Grammar(String),

    #[error(transparent)]
    Table(#[from] TableLoadError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("built-in ArkTS grammar: {0}")]
    Language(String),
}

fn read(path: &Path) -> Result<String, ToolError> {
    fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn write(path: &Path, contents: &str) -> Result<(), ToolError> {
    fs::write(path, contents).map_err(|source| ToolError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Run one command.
///
/// # Errors
///
/// I/O failures, grammar diagnostics and table serialization failures.
pub fn run(command: Commands) -> Result<ExitCode, ToolError> {
    match command {
        Commands::Compile {
            grammar,
            output,
            pretty,
            no_glr,
            conflict_order,
            bindings,
            fancy,
        } => {
            let source = read(&grammar)?;
            let options = CompileOptions::default()
                .with_glr_fallback(!no_glr)
                .with_conflict_order(conflict_order.into_iter().map(Into::into).collect::<Vec<_>>());
            let table = match compile_source(&source, &options) {
                Ok(table) => table,
                Err(err) => {
                    let filename = grammar.display().to_string();
                    if fancy {
                        let report = Report::new(err).with_source_code(NamedSource::new(filename, source));
                        return Err(ToolError::Grammar(format!("{report:?}")));
                    }
                    return Err(ToolError::Grammar(render_error(&err, &source, &filename)));
                }
            };

            let output = output.unwrap_or_else(|| grammar.with_extension("json"));
            let json = if pretty { table.to_json_pretty()? } else { table.to_json()? };
            write(&output, &json)?;
            eprintln!(
                "{}: {} states, {} symbols, {} split points -> {}",
                table.grammar_name(),
                table.state_count(),
                table.symbol_count(),
                table.split_point_count(),
                output.display()
            );
            if let Some(path) = bindings {
                write(&path, &render_bindings(&table))?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Parse { input, json, check } => parse(&input, json, check),
    }
}

fn parse(input: &Path, json: bool, check: bool) -> Result<ExitCode, ToolError> {
    let bytes = fs::read(input).map_err(|source| ToolError::Io {
        path: input.display().to_string(),
        source,
    })?;
    let language = Language::arkts().map_err(|err| ToolError::Language(err.to_string()))?;
    let tree = Parser::new(Arc::new(language)).parse_bytes(&bytes)?;
    let errors = tree.errors();

    if json {
        let entries: Vec<_> = errors
            .iter()
            .map(|error| {
                serde_json::json!({
                    "kind": error.kind,
                    "missing": error.missing,
                    "start": error.range.start().to_usize(),
                    "end": error.range.end().to_usize(),
                    "line": error.start.row + 1,
                    "column": error.start.column + 1,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(entries));
    } else {
        println!("{}", tree.to_sexp());
        for error in &errors {
            if error.missing {
                eprintln!("{}:{}: missing {}", input.display(), error.start, error.kind);
            } else {
                eprintln!("{}:{}: unexpected input", input.display(), error.start);
            }
        }
    }

    Ok(if check && !errors.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

