//! CLI support for dictquery
//!
//! Provides programmatic access to the `dq` commands so they can be
//! embedded in other tools.

mod inspect;
mod query;

pub use inspect::{dump_ast, dump_segments, dump_tokens};
pub use query::{Engine, QueryCommand, QueryOutcome, execute_query, render_output};

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Lexing, parsing or evaluating the path failed
    #[error("{0}")]
    Query(#[from] crate::Error),

    /// JSON parsing or rendering error
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No input provided
    #[error("No input provided. Use --file, --input or pipe JSON to stdin.")]
    NoInput,
}

impl From<crate::LexError> for CliError {
    fn from(e: crate::LexError) -> Self {
        CliError::Query(e.into())
    }
}
