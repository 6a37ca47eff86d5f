//! Bracket expression sub-grammar.
//!
//! Used by the segment pipeline, where the text between `[` and `]` has
//! already been cut out of the path. Recognized forms, tried in order:
//!
//! 1. `( ... )` wrapping the whole text
//! 2. `left && right` / `left || right`, split at the rightmost operator
//!    outside parentheses and quotes
//! 3. `key OP value` with `OP` one of `== != <= >= < >`
//! 4. a non-negative integer index
//! 5. a quoted key
//! 6. a bare identifier
//! 7. `*`
//! 8. a `start:end:step` slice

use std::fmt;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{anychar, char, digit1, multispace0},
    combinator::{all_consuming, map, map_opt, map_res, opt, recognize},
    multi::many1,
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, tuple},
};

use crate::{
    ast::{BinOp, expressions::quote},
    error::Error,
    lexer::Position,
    parser::{DEFAULT_MAX_DEPTH, ParseError},
    segment::{PathSegment, SegmentWalker, parse_segments_at},
    slice::{SliceBound, SliceError, SliceSpec},
    value::Value,
};

type PResult<'a, O> = IResult<&'a str, O>;

/// Recursion budget shared by the bracket and segment parsers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Depth {
    level: usize,
    limit: usize,
}

impl Depth {
    pub(crate) fn new(limit: usize) -> Self {
        Depth { level: 0, limit }
    }

    pub(crate) fn deeper(self) -> Result<Depth, ParseError> {
        if self.level >= self.limit {
            return Err(ParseError::NestingTooDeep {
                limit: self.limit,
                position: Position::default(),
            });
        }
        Ok(Depth {
            level: self.level + 1,
            limit: self.limit,
        })
    }
}

/// A `key OP value` filter. The key is a nested path evaluated on each
/// candidate element; a quoted key is a single literal key.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub key: String,
    pub quoted: bool,
    pub op: BinOp,
    pub value: Value,
    path: Vec<PathSegment>,
}

impl Comparison {
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    fn matches(&self, item: &Value, walker: &SegmentWalker, depth: usize) -> Result<bool, Error> {
        let found = walker.walk_branch(item, &self.path, depth)?;
        Ok(match self.op {
            BinOp::Equal => found.loose_eq(&self.value),
            BinOp::NotEqual => !found.loose_eq(&self.value),
            op => found.compare(&self.value).is_some_and(|ordering| match op {
                BinOp::LessThan => ordering.is_lt(),
                BinOp::GreaterThan => ordering.is_gt(),
                BinOp::LessEqual => ordering.is_le(),
                BinOp::GreaterEqual => ordering.is_ge(),
                _ => false,
            }),
        })
    }
}

/// Parsed bracket contents.
#[derive(Debug, Clone, PartialEq)]
pub enum BracketExpr {
    /// `&&` or `||` over two filters
    Logical {
        left: Box<BracketExpr>,
        op: BinOp,
        right: Box<BracketExpr>,
    },
    Comparison(Comparison),
    Index(usize),
    /// Quoted key
    Key(String),
    /// Bare identifier key
    Name(String),
    Wildcard,
    Slice(SliceSpec),
}

impl BracketExpr {
    /// Whether this expression selects from a sequence rather than naming a
    /// single position or key.
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            BracketExpr::Logical { .. } | BracketExpr::Comparison(_) | BracketExpr::Slice(_)
        )
    }

    /// Select the candidates this filter or slice keeps, in input order.
    pub fn select<'v>(
        &self,
        items: &[&'v Value],
        walker: &SegmentWalker,
    ) -> Result<Vec<&'v Value>, Error> {
        self.select_at(items, walker, 0)
    }

    pub(crate) fn select_at<'v>(
        &self,
        items: &[&'v Value],
        walker: &SegmentWalker,
        depth: usize,
    ) -> Result<Vec<&'v Value>, Error> {
        match self {
            BracketExpr::Logical { left, op, right } => {
                let selected = left.select_at(items, walker, depth)?;
                if *op == BinOp::And {
                    if selected.is_empty() {
                        return Ok(selected);
                    }
                    return right.select_at(&selected, walker, depth);
                }

                let others = right.select_at(items, walker, depth)?;
                let mut union: Vec<&Value> = Vec::new();
                for &item in items {
                    if (selected.contains(&item) || others.contains(&item)) && !union.contains(&item) {
                        union.push(item);
                    }
                }
                Ok(union)
            }
            BracketExpr::Comparison(comparison) => {
                let mut selected = Vec::new();
                for &item in items {
                    if comparison.matches(item, walker, depth)? {
                        selected.push(item);
                    }
                }
                Ok(selected)
            }
            BracketExpr::Slice(spec) => Ok(spec.apply(items)),
            other => Err(ParseError::InvalidExpression {
                text: other.to_string(),
            }
            .into()),
        }
    }
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Integer(n) => n.to_string(),
        Value::Float(n) => format!("{n:?}"),
        Value::Boolean(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.type_name().to_string(),
    }
}

impl fmt::Display for BracketExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketExpr::Logical { left, op, right } => write!(f, "({left} {op} {right})"),
            BracketExpr::Comparison(c) => {
                if c.quoted {
                    write!(f, "{} {} {}", quote(&c.key), c.op, render_literal(&c.value))
                } else {
                    write!(f, "{} {} {}", c.key, c.op, render_literal(&c.value))
                }
            }
            BracketExpr::Index(n) => write!(f, "{n}"),
            BracketExpr::Key(key) => f.write_str(&quote(key)),
            BracketExpr::Name(name) => f.write_str(name),
            BracketExpr::Wildcard => f.write_str("*"),
            BracketExpr::Slice(spec) => write!(f, "{spec}"),
        }
    }
}

// --- Scanning helpers ---

/// Byte offsets of the characters outside quotes, paired with the
/// parenthesis depth before each one. Escaped characters are skipped.
fn unquoted_chars(text: &str) -> Vec<(usize, char, i32)> {
    let mut out = Vec::new();
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => {
                    out.push((i, c, depth));
                    depth += 1;
                }
                ')' => {
                    depth -= 1;
                    out.push((i, c, depth));
                }
                _ => out.push((i, c, depth)),
            },
        }
    }
    out
}

/// The inside of `( ... )` if those parentheses wrap the whole text.
fn strip_wrapping_parens(text: &str) -> Option<&str> {
    if !text.starts_with('(') || !text.ends_with(')') {
        return None;
    }
    let last = text.len() - 1;
    let closes_early = unquoted_chars(text)
        .iter()
        .any(|&(i, c, depth)| c == ')' && depth == 0 && i != last);
    if closes_early {
        return None;
    }
    Some(&text[1..last])
}

/// Rightmost `&&` or `||` outside parentheses and quotes.
fn find_outer_logical(text: &str) -> Option<(usize, BinOp)> {
    let chars = unquoted_chars(text);
    chars
        .windows(2)
        .rev()
        .find_map(|pair| match (pair[0], pair[1]) {
            ((i, '&', 0), (j, '&', 0)) if j == i + 1 => Some((i, BinOp::And)),
            ((i, '|', 0), (j, '|', 0)) if j == i + 1 => Some((i, BinOp::Or)),
            _ => None,
        })
}

// --- Combinators ---

fn double_quoted(input: &str) -> PResult<'_, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(is_not("\\\""), '\\', anychar)),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

fn single_quoted(input: &str) -> PResult<'_, String> {
    delimited(
        char('\''),
        map(
            opt(escaped_transform(is_not("\\'"), '\\', anychar)),
            Option::unwrap_or_default,
        ),
        char('\''),
    )(input)
}

fn quoted(input: &str) -> PResult<'_, String> {
    alt((double_quoted, single_quoted))(input)
}

fn integer(input: &str) -> PResult<'_, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i64>)(input)
}

fn float(input: &str) -> PResult<'_, f64> {
    map_res(recognize_float, str::parse::<f64>)(input)
}

fn index_literal(input: &str) -> PResult<'_, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}

fn identifier(input: &str) -> PResult<'_, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// A bare comparison key: a segment path, with `\` escaping the next char
fn bare_key(input: &str) -> PResult<'_, &str> {
    recognize(many1(alt((
        recognize(pair(char('\\'), anychar)),
        is_not("=!<>\\'\" \t\r\n"),
    ))))(input)
}

fn comparison_op(input: &str) -> PResult<'_, BinOp> {
    map_opt(
        alt((tag("=="), tag("!="), tag("<="), tag(">="), tag("<"), tag(">"))),
        BinOp::from_symbol,
    )(input)
}

/// `key OP`, leaving the value text as the remainder
fn comparison_head(input: &str) -> PResult<'_, ((String, bool), BinOp)> {
    pair(
        alt((
            map(quoted, |key| (key, true)),
            map(bare_key, |key: &str| (key.to_string(), false)),
        )),
        delimited(multispace0, comparison_op, multispace0),
    )(input)
}

/// Bound text between colons; blank parts are omitted bounds
fn slice_bound(input: &str) -> PResult<'_, &str> {
    map(is_not(":"), str::trim)(input)
}

type SliceParts<'a> = (Option<&'a str>, char, Option<&'a str>, Option<Option<&'a str>>);

fn slice_parts(input: &str) -> PResult<'_, SliceParts<'_>> {
    all_consuming(tuple((
        opt(slice_bound),
        char(':'),
        opt(slice_bound),
        opt(preceded(char(':'), opt(slice_bound))),
    )))(input)
}

/// Comparison value: quoted string, number, keyword, or the bare text itself
fn literal_value(text: &str) -> Value {
    if let Ok((_, s)) = all_consuming(quoted)(text) {
        return Value::String(s);
    }
    if let Ok((_, n)) = all_consuming(integer)(text) {
        return Value::Integer(n);
    }
    if let Ok((_, n)) = all_consuming(float)(text) {
        return Value::Float(n);
    }
    match text {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        "null" => Value::Null,
        other => Value::String(other.to_string()),
    }
}

fn slice_value(text: Option<&str>, bound: SliceBound) -> Result<Option<i64>, SliceError> {
    match text {
        None | Some("") => Ok(None),
        Some(text) => text.parse::<i64>().map(Some).map_err(|_| SliceError::BoundNotInteger {
            bound,
            found: text.to_string(),
        }),
    }
}

// --- Entry points ---

/// Parse the text between `[` and `]` with the default nesting limit.
///
/// ```
/// use dictquery::expression::{BracketExpr, parse_bracket_expression};
///
/// assert_eq!(parse_bracket_expression("3").unwrap(), BracketExpr::Index(3));
/// assert_eq!(
///     parse_bracket_expression("'id' == 2 && 'v' > 1").unwrap().to_string(),
///     r#"("id" == 2 && "v" > 1)"#
/// );
/// ```
pub fn parse_bracket_expression(text: &str) -> Result<BracketExpr, Error> {
    parse_bracket_expression_with_limit(text, DEFAULT_MAX_DEPTH)
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", ret, err))]
pub fn parse_bracket_expression_with_limit(text: &str, max_depth: usize) -> Result<BracketExpr, Error> {
    parse_at(text, Depth::new(max_depth))
}

pub(crate) fn parse_at(text: &str, depth: Depth) -> Result<BracketExpr, Error> {
    let depth = depth.deeper()?;
    let text = text.trim();
    let invalid = || -> Error {
        ParseError::InvalidExpression {
            text: text.to_string(),
        }
        .into()
    };

    if text.is_empty() {
        return Err(invalid());
    }

    if let Some(inner) = strip_wrapping_parens(text) {
        return parse_at(inner, depth);
    }

    if let Some((at, op)) = find_outer_logical(text) {
        let left = parse_at(&text[..at], depth)?;
        let right = parse_at(&text[at + 2..], depth)?;
        if !left.is_filter() || !right.is_filter() {
            return Err(invalid());
        }
        return Ok(BracketExpr::Logical {
            left: Box::new(left),
            op,
            right: Box::new(right),
        });
    }

    if let Ok((rest, ((key, quoted), op))) = comparison_head(text) {
        let value = rest.trim();
        if !value.is_empty() {
            let path = if quoted {
                vec![PathSegment::Key(key.clone())]
            } else {
                parse_segments_at(&key, depth)?
            };
            return Ok(BracketExpr::Comparison(Comparison {
                key,
                quoted,
                op,
                value: literal_value(value),
                path,
            }));
        }
    }

    if let Ok((_, index)) = all_consuming(index_literal)(text) {
        return Ok(BracketExpr::Index(index));
    }
    if let Ok((_, key)) = all_consuming(quoted)(text) {
        return Ok(BracketExpr::Key(key));
    }
    if let Ok((_, name)) = all_consuming(identifier)(text) {
        return Ok(BracketExpr::Name(name.to_string()));
    }
    if text == "*" {
        return Ok(BracketExpr::Wildcard);
    }
    if let Ok((_, (start, _, end, step))) = slice_parts(text) {
        let spec = SliceSpec::new(
            slice_value(start, SliceBound::Start)?,
            slice_value(end, SliceBound::End)?,
            slice_value(step.flatten(), SliceBound::Step)?,
        )?;
        return Ok(BracketExpr::Slice(spec));
    }

    Err(invalid())
}
