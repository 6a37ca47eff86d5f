//! Execute dictquery paths against JSON input

use super::CliError;
use crate::{
    CompiledPath, QueryOptions, ScriptRegistry, json_to_value, query_segments, query_with,
    segment::parse_segments_with_limit, value_to_json,
};

/// Which pipeline evaluates the path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Engine {
    /// Tokenizer, parser and tree-walking evaluator
    #[default]
    Ast,
    /// Flat segment list with fan-out
    Segments,
}

/// Options for the query command
#[derive(Debug, Clone, Default)]
pub struct QueryCommand {
    /// The path to evaluate
    pub path: String,
    /// JSON input string
    pub input: Option<String>,
    pub engine: Engine,
    pub options: QueryOptions,
    /// Only validate syntax, don't execute
    pub syntax_only: bool,
    /// Flatten nested sequences in the result
    pub flatten: bool,
}

/// Result of a query operation
#[derive(Debug)]
pub enum QueryOutcome {
    /// Syntax validation passed
    SyntaxValid,
    /// Query executed successfully with JSON output
    Success(serde_json::Value),
}

/// Execute a query command
pub fn execute_query(command: &QueryCommand) -> Result<QueryOutcome, CliError> {
    let max_depth = command.options.max_depth;

    if command.syntax_only {
        match command.engine {
            Engine::Ast => {
                CompiledPath::parse_with_limit(&command.path, max_depth)?;
            }
            Engine::Segments => {
                parse_segments_with_limit(&command.path, max_depth)?;
            }
        }
        return Ok(QueryOutcome::SyntaxValid);
    }

    let json_str = command.input.as_ref().ok_or(CliError::NoInput)?;
    let document = json_to_value(serde_json::from_str(json_str)?);

    let result = match command.engine {
        Engine::Ast => query_with(
            &document,
            &command.path,
            &command.options,
            &ScriptRegistry::default(),
        )?,
        Engine::Segments => query_segments(&document, &command.path, &command.options)?,
    };

    let result = if command.flatten { result.flatten() } else { result };
    Ok(QueryOutcome::Success(value_to_json(result)))
}

/// Render an outcome for printing: pretty JSON unless `compact`
pub fn render_output(outcome: &QueryOutcome, compact: bool) -> Result<String, CliError> {
    match outcome {
        QueryOutcome::SyntaxValid => Ok("Syntax is valid".to_string()),
        QueryOutcome::Success(output) if compact => Ok(serde_json::to_string(output)?),
        QueryOutcome::Success(output) => Ok(serde_json::to_string_pretty(output)?),
    }
}
