//! # dictquery
//!
//! A JSONPath-inspired path language for selecting, filtering and slicing
//! values out of JSON-like documents.
//!
//! ```
//! use dictquery::{Value, query};
//! use serde_json::json;
//!
//! let doc = Value::from(json!({
//!     "list": [{"id": 1, "v": [5, 6]}, {"id": 2, "v": [1, 2]}, {"id": 2, "v": [9, 9]}]
//! }));
//!
//! let result = query(&doc, "list['id'==2].v", false).unwrap();
//! assert_eq!(result, Value::from(json!([[1, 2], [9, 9]])));
//! ```
//!
//! Paths go through [`Lexer`], [`Parser`] and [`Evaluator`]. The
//! [`segment`] module holds a second, flat pipeline that cuts the path into
//! segments and fans the remainder out over wildcard and filter matches.

pub mod ast;
pub mod convert;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod lexer;
pub mod parser;
pub mod script;
pub mod segment;
pub mod slice;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

use std::{fmt, str::FromStr};

pub use ast::{BinOp, Expr, ExprKind, Token, TokenKind};
pub use convert::{json_to_value, value_to_json};
pub use error::Error;
pub use evaluator::{EvalContext, EvalError, Evaluator};
pub use expression::{BracketExpr, parse_bracket_expression};
pub use lexer::{LexError, Lexer, Position};
pub use parser::{DEFAULT_MAX_DEPTH, ParseError, Parser, parse_path};
pub use script::{NoScripts, ScriptError, ScriptRegistry, ScriptResolver};
pub use segment::{PathSegment, SegmentWalker, parse_segments, segments_to_path};
pub use slice::{SliceError, SliceSpec};
pub use value::{Map, Value};

/// Knobs shared by both pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Return an empty sequence instead of a path, type or arithmetic error
    pub suppress_errors: bool,
    /// Nesting limit for parsing and evaluation
    pub max_depth: usize,
    /// Retry a missing key as an anchored regex (segment pipeline only)
    pub regex_keys: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            suppress_errors: false,
            max_depth: DEFAULT_MAX_DEPTH,
            regex_keys: true,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suppress_errors(mut self, suppress_errors: bool) -> Self {
        self.suppress_errors = suppress_errors;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_regex_keys(mut self, regex_keys: bool) -> Self {
        self.regex_keys = regex_keys;
        self
    }
}

/// A parsed path that can be evaluated against many documents.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPath {
    expr: Expr,
}

impl CompiledPath {
    pub fn parse(path: &str) -> Result<Self, Error> {
        Self::parse_with_limit(path, DEFAULT_MAX_DEPTH)
    }

    pub fn parse_with_limit(path: &str, max_depth: usize) -> Result<Self, Error> {
        let expr = Parser::new(Lexer::new(path))?
            .with_max_depth(max_depth)
            .parse()?;
        Ok(CompiledPath { expr })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate against `document`. Each call gets its own context.
    pub fn evaluate(
        &self,
        document: &Value,
        options: &QueryOptions,
        resolver: &dyn ScriptResolver,
    ) -> Result<Value, Error> {
        let result = Evaluator::new(document, resolver)
            .with_max_depth(options.max_depth)
            .evaluate(&self.expr)
            .map_err(Error::from);
        suppress(result, options)
    }
}

impl FromStr for CompiledPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

fn suppress(result: Result<Value, Error>, options: &QueryOptions) -> Result<Value, Error> {
    match result {
        Err(err) if options.suppress_errors && err.is_suppressible() => {
            #[cfg(feature = "trace")]
            tracing::debug!(error = %err, "suppressed query error");
            Ok(Value::Array(Vec::new()))
        }
        result => result,
    }
}

/// Run `path` against `document` with no scripts or variables.
///
/// With `suppress_errors` a path that does not fit the document yields an
/// empty sequence. Lexical and syntax errors are always returned.
pub fn query(document: &Value, path: &str, suppress_errors: bool) -> Result<Value, Error> {
    let options = QueryOptions::default().with_suppress_errors(suppress_errors);
    query_with(document, path, &options, &NoScripts)
}

/// Run `path` with explicit options and a script/variable resolver.
#[cfg_attr(feature = "trace", tracing::instrument(level = "debug", skip(document, options, resolver), err))]
pub fn query_with(
    document: &Value,
    path: &str,
    options: &QueryOptions,
    resolver: &dyn ScriptResolver,
) -> Result<Value, Error> {
    CompiledPath::parse_with_limit(path, options.max_depth)?.evaluate(document, options, resolver)
}

/// Run `path` through the segment pipeline.
pub fn query_segments(document: &Value, path: &str, options: &QueryOptions) -> Result<Value, Error> {
    SegmentWalker::new(options.clone()).query(document, path)
}
