//! Flat path-segment pipeline.
//!
//! A path is cut into an ordered list of [`PathSegment`]s which
//! [`SegmentWalker`] applies to the document one at a time. Wildcards,
//! filters and slices fan the rest of the path out over every selected
//! element, collecting the non-empty branch results.

use std::fmt;

use regex::Regex;

use crate::{
    QueryOptions,
    ast::expressions::{is_identifier, quote},
    error::Error,
    evaluator::EvalError,
    expression::{BracketExpr, Depth, parse_at},
    lexer::{LexError, Position},
    parser::{DEFAULT_MAX_DEPTH, ParseError},
    value::{Map, Value},
};

/// One step of a flat path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Wildcard,
    /// A filter or slice
    Expression(BracketExpr),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) if is_identifier(key) => write!(f, ".{key}"),
            PathSegment::Key(key) => write!(f, "[{}]", quote(key)),
            PathSegment::Index(index) => write!(f, "[{index}]"),
            PathSegment::Wildcard => write!(f, "[*]"),
            PathSegment::Expression(expr) => write!(f, "[{expr}]"),
        }
    }
}

/// Render segments back into a path that parses to the same segments.
pub fn segments_to_path(segments: &[PathSegment]) -> String {
    let path: String = segments.iter().map(ToString::to_string).collect();
    match path.strip_prefix('.') {
        Some(rest) => rest.to_string(),
        None => path,
    }
}

/// Split `path` into segments with the default nesting limit.
///
/// ```
/// use dictquery::segment::{PathSegment, parse_segments};
///
/// let segments = parse_segments(r"root.key\.01[2]").unwrap();
/// assert_eq!(
///     segments,
///     vec![
///         PathSegment::Key("root".to_string()),
///         PathSegment::Key("key.01".to_string()),
///         PathSegment::Index(2),
///     ]
/// );
/// ```
pub fn parse_segments(path: &str) -> Result<Vec<PathSegment>, Error> {
    parse_segments_with_limit(path, DEFAULT_MAX_DEPTH)
}

pub fn parse_segments_with_limit(path: &str, max_depth: usize) -> Result<Vec<PathSegment>, Error> {
    if path.trim().is_empty() {
        return Err(ParseError::EmptyPath.into());
    }
    parse_segments_at(path, Depth::new(max_depth))
}

fn buffer_segment(buffer: &str, escaped: bool) -> PathSegment {
    if !escaped {
        if buffer == "*" {
            return PathSegment::Wildcard;
        }
        if buffer.bytes().all(|b| b.is_ascii_digit())
            && let Ok(index) = buffer.parse::<usize>()
        {
            return PathSegment::Index(index);
        }
    }
    PathSegment::Key(buffer.to_string())
}

/// Offset of the `]` closing the bracket opened just before `from`
fn closing_bracket(chars: &[char], from: usize) -> Option<usize> {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut i = from;

    while i < chars.len() {
        let c = chars[i];
        match (quote, c) {
            (_, '\\') => i += 1,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') if depth == 0 => return Some(i),
            (None, ']') => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}

pub(crate) fn parse_segments_at(path: &str, depth: Depth) -> Result<Vec<PathSegment>, Error> {
    let text = path.trim();
    let text = text.strip_prefix('$').unwrap_or(text);
    let chars: Vec<char> = text.chars().collect();

    let mut segments = Vec::new();
    let mut buffer = String::new();
    let mut buffer_escaped = false;

    let flush = |segments: &mut Vec<PathSegment>, buffer: &mut String, escaped: &mut bool| {
        if !buffer.is_empty() {
            segments.push(buffer_segment(buffer, *escaped));
            buffer.clear();
        }
        *escaped = false;
    };

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let Some(&next) = chars.get(i + 1) else {
                    return Err(LexError::UnexpectedChar {
                        ch: '\\',
                        position: Position::new(1, i + 1),
                    }
                    .into());
                };
                buffer.push(next);
                buffer_escaped = true;
                i += 1;
            }
            '.' => flush(&mut segments, &mut buffer, &mut buffer_escaped),
            '[' => {
                flush(&mut segments, &mut buffer, &mut buffer_escaped);
                let close = closing_bracket(&chars, i + 1).ok_or_else(|| ParseError::UnclosedBracket {
                    path: path.to_string(),
                    offset: i,
                })?;
                let inner: String = chars[i + 1..close].iter().collect();
                segments.push(match parse_at(&inner, depth)? {
                    BracketExpr::Index(index) => PathSegment::Index(index),
                    BracketExpr::Key(key) | BracketExpr::Name(key) => PathSegment::Key(key),
                    BracketExpr::Wildcard => PathSegment::Wildcard,
                    expr => PathSegment::Expression(expr),
                });
                i = close;
            }
            ']' => {
                return Err(ParseError::InvalidExpression {
                    text: path.to_string(),
                }
                .into());
            }
            c => buffer.push(c),
        }
        i += 1;
    }
    flush(&mut segments, &mut buffer, &mut buffer_escaped);

    Ok(segments)
}

/// How a fan-out step merges its branch results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fan {
    /// Drop empty branch results
    Wildcard,
    /// Drop empty branch results and duplicates
    Filter,
    /// Keep every branch result
    Slice,
}

/// Applies segment lists to documents.
///
/// ```
/// use dictquery::{QueryOptions, Value, segment::SegmentWalker};
/// use serde_json::json;
///
/// let doc = Value::from(json!({"list": [{"id": 1, "v": [5, 6]}, {"id": 2, "v": [1, 2]}]}));
/// let walker = SegmentWalker::new(QueryOptions::default());
///
/// assert_eq!(walker.query(&doc, "list['id'==2].v").unwrap(), Value::from(json!([[1, 2]])));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SegmentWalker {
    options: QueryOptions,
}

impl SegmentWalker {
    pub fn new(options: QueryOptions) -> Self {
        SegmentWalker { options }
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Parse `path` and apply it to `document`.
    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip(self, document), err))]
    pub fn query(&self, document: &Value, path: &str) -> Result<Value, Error> {
        let segments = parse_segments_with_limit(path, self.options.max_depth)?;
        self.query_segments(document, &segments)
    }

    /// Apply already parsed segments. `suppress_errors` is honored here.
    pub fn query_segments(&self, document: &Value, segments: &[PathSegment]) -> Result<Value, Error> {
        match self.walk(document, segments, 0) {
            Err(err) if self.options.suppress_errors && err.is_suppressible() => {
                #[cfg(feature = "trace")]
                tracing::debug!(error = %err, "suppressed query error");
                Ok(Value::Array(Vec::new()))
            }
            result => result,
        }
    }

    /// A nested branch. Failures that could be suppressed come back as an
    /// empty sequence whatever the caller's options say.
    pub(crate) fn walk_branch(
        &self,
        value: &Value,
        segments: &[PathSegment],
        depth: usize,
    ) -> Result<Value, Error> {
        match self.walk(value, segments, depth + 1) {
            Err(err) if err.is_suppressible() => {
                #[cfg(feature = "trace")]
                tracing::trace!(error = %err, "branch discarded");
                Ok(Value::Array(Vec::new()))
            }
            result => result,
        }
    }

    fn walk(&self, value: &Value, segments: &[PathSegment], depth: usize) -> Result<Value, Error> {
        if depth > self.options.max_depth {
            return Err(EvalError::NestingTooDeep {
                limit: self.options.max_depth,
            }
            .into());
        }

        let mut current = value;
        for (idx, segment) in segments.iter().enumerate() {
            let rest = &segments[idx + 1..];
            current = match (segment, current) {
                (PathSegment::Wildcard, Value::Array(items)) => {
                    return self.fan_out(items, rest, depth, Fan::Wildcard);
                }
                (PathSegment::Wildcard, Value::Object(map)) => {
                    return self.fan_out(map.values(), rest, depth, Fan::Wildcard);
                }
                (PathSegment::Index(index), Value::Array(items)) => {
                    items.get(*index).ok_or_else(|| EvalError::IndexOutOfRange {
                        index: i64::try_from(*index).unwrap_or(i64::MAX),
                        len: items.len(),
                    })?
                }
                (PathSegment::Index(index), Value::Object(map)) => {
                    let key = index.to_string();
                    match map.get(&key) {
                        Some(value) => value,
                        None => return self.missing_key(map, &key, rest, depth),
                    }
                }
                (PathSegment::Key(key), Value::Object(map)) => match map.get(key) {
                    Some(value) => value,
                    None => return self.missing_key(map, key, rest, depth),
                },
                (PathSegment::Expression(BracketExpr::Slice(spec)), Value::Array(items)) => {
                    let candidates: Vec<&Value> = items.iter().collect();
                    return self.fan_out(spec.apply(&candidates), rest, depth, Fan::Slice);
                }
                (PathSegment::Expression(expr), Value::Array(items)) => {
                    let candidates: Vec<&Value> = items.iter().collect();
                    let selected = expr.select_at(&candidates, self, depth)?;
                    #[cfg(feature = "trace")]
                    tracing::debug!(filter = %expr, matched = selected.len(), "filter applied");
                    return self.fan_out(selected, rest, depth, Fan::Filter);
                }
                (segment, other) => {
                    return Err(EvalError::PathMismatch {
                        segment: segment.to_string(),
                        found: other.type_name(),
                    }
                    .into());
                }
            };
        }

        Ok(current.clone())
    }

    fn fan_out<'v>(
        &self,
        items: impl IntoIterator<Item = &'v Value>,
        rest: &[PathSegment],
        depth: usize,
        fan: Fan,
    ) -> Result<Value, Error> {
        let mut results: Vec<Value> = Vec::new();

        for item in items {
            let result = match self.walk(item, rest, depth + 1) {
                Ok(result) => result,
                Err(err) if err.is_suppressible() => {
                    #[cfg(feature = "trace")]
                    tracing::trace!(error = %err, "branch discarded");
                    continue;
                }
                Err(err) => return Err(err),
            };
            // A slice keeps every element it selected, empty ones included
            if fan != Fan::Slice && matches!(&result, Value::Array(values) if values.is_empty()) {
                continue;
            }
            if fan == Fan::Filter && results.iter().any(|seen| seen.loose_eq(&result)) {
                continue;
            }
            results.push(result);
        }

        Ok(Value::Array(results))
    }

    /// Absent key on a mapping. With `regex_keys` the key is retried as a
    /// pattern that must match a whole key.
    fn missing_key(
        &self,
        map: &Map,
        key: &str,
        rest: &[PathSegment],
        depth: usize,
    ) -> Result<Value, Error> {
        let not_found = || -> Error {
            EvalError::KeyNotFound {
                key: key.to_string(),
            }
            .into()
        };

        if !self.options.regex_keys {
            return Err(not_found());
        }
        let Ok(pattern) = Regex::new(&format!("^(?:{key})$")) else {
            return Err(not_found());
        };

        let matched: Vec<&Value> = map
            .iter()
            .filter(|(candidate, _)| pattern.is_match(candidate))
            .map(|(_, value)| value)
            .collect();

        #[cfg(feature = "trace")]
        tracing::debug!(pattern = key, matched = matched.len(), "regex key fallback");

        if matched.is_empty() {
            return Err(not_found());
        }
        if rest.is_empty() {
            return Ok(Value::Array(matched.into_iter().cloned().collect()));
        }
        self.fan_out(matched, rest, depth, Fan::Wildcard)
    }
}
