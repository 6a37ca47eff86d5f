use std::fmt;

use indexmap::IndexMap;

use crate::{ast::BinOp, lexer::Position};

/// Abstract Syntax Tree node representing a parsed path expression.
///
/// Every node owns its children and records the source position of the
/// token that started it, so evaluation errors can point back into the path.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

/// The node variants of an [`Expr`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // References
    /// Root document marker (`$` followed by `.`, `[` or nothing)
    ///
    /// # Example
    /// ```text
    /// $.store.book
    /// ```
    Root,

    /// Root-level wildcard: a leading bare `*`, or the implicit one in front
    /// of a path that opens with `.`
    ///
    /// # Example
    /// ```text
    /// *.name
    /// .name
    /// ```
    RootWildcard,

    /// Bare identifier. The first one evaluated resolves against the document root.
    ///
    /// # Example
    /// ```text
    /// root
    /// ```
    Name(String),

    /// Variable reference (`$name`)
    ///
    /// # Examples
    /// ```text
    /// $threshold
    /// ```
    VarRef(String),

    /// Call into a registered script
    ///
    /// # Examples
    /// ```text
    /// @now()
    /// @math.clamp($x, 0, max=10)
    /// ```
    ScriptCall {
        module_path: Vec<String>,
        name: String,
        args: Vec<Expr>,
        kwargs: IndexMap<String, Expr>,
    },

    // Literals
    /// Literal integer
    Integer(i64),

    /// Literal floating point number
    Float(f64),

    /// String literal. Inside a filter it first tries to name a key of the
    /// current item.
    ///
    /// # Example
    /// ```text
    /// "id"
    /// ```
    String(String),

    /// Boolean literal (`true`, `false`)
    Boolean(bool),

    /// Null literal
    Null,

    // Operations
    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    // Access
    /// Member access
    ///
    /// # Examples
    /// ```text
    /// root.name
    /// root."key.with.dots"
    /// root.*
    /// ```
    Key {
        object: Box<Expr>,
        key: String,
        wildcard: bool,
    },

    /// Bracket access: positional index, key lookup or filter predicate
    ///
    /// # Examples
    /// ```text
    /// list[0]
    /// list["name"]
    /// list["id" == 2]
    /// list[*]
    /// ```
    Index { object: Box<Expr>, index: Box<Expr> },

    /// The `*` marker inside brackets. Only appears as an `Index` index.
    Wildcard,

    /// Slice access with optional bounds
    ///
    /// # Examples
    /// ```text
    /// list[1:4]
    /// list[::-1]
    /// ```
    Slice {
        object: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, position: Position) -> Self {
        Expr { kind, position }
    }

    /// True if this node is one of the literal variants
    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Integer(_)
                | ExprKind::Float(_)
                | ExprKind::String(_)
                | ExprKind::Boolean(_)
                | ExprKind::Null
        )
    }
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Quote `text` as a double-quoted path string literal
pub(crate) fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_identifier(name) && !matches!(name, "true" | "false" | "null") {
        return f.write_str(name);
    }
    for (i, c) in name.chars().enumerate() {
        let plain = c.is_alphabetic() || c == '_' || (i > 0 && c.is_ascii_digit());
        if !plain || (i == 0 && matches!(name, "true" | "false" | "null")) {
            write!(f, "\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

fn write_args(
    f: &mut fmt::Formatter<'_>,
    args: &[Expr],
    kwargs: &IndexMap<String, Expr>,
) -> fmt::Result {
    let mut first = true;
    for arg in args {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{arg}")?;
    }
    for (key, value) in kwargs {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{key}={value}")?;
    }
    Ok(())
}

/// Renders the node back into path syntax. Re-parsing the output selects
/// the same values; binary operations are always parenthesized.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Root => write!(f, "$"),
            ExprKind::RootWildcard | ExprKind::Wildcard => write!(f, "*"),
            ExprKind::Name(name) => write_name(f, name),
            ExprKind::VarRef(name) => {
                write!(f, "$")?;
                write_name(f, name)
            }
            ExprKind::ScriptCall {
                module_path,
                name,
                args,
                kwargs,
            } => {
                write!(f, "@")?;
                for module in module_path {
                    write!(f, "{module}.")?;
                }
                write!(f, "{name}(")?;
                write_args(f, args, kwargs)?;
                write!(f, ")")
            }
            ExprKind::Integer(n) => write!(f, "{n}"),
            ExprKind::Float(n) => write!(f, "{n:?}"),
            ExprKind::String(s) => f.write_str(&quote(s)),
            ExprKind::Boolean(b) => write!(f, "{b}"),
            ExprKind::Null => write!(f, "null"),
            ExprKind::BinaryOp { op, left, right } => write!(f, "({left} {op} {right})"),
            ExprKind::Key {
                object,
                key,
                wildcard,
            } => {
                if *wildcard {
                    write!(f, "{object}.*")
                } else if is_identifier(key) {
                    write!(f, "{object}.{key}")
                } else {
                    write!(f, "{object}.{}", quote(key))
                }
            }
            ExprKind::Index { object, index } => write!(f, "{object}[{index}]"),
            ExprKind::Slice {
                object,
                start,
                end,
                step,
            } => {
                write!(f, "{object}[")?;
                if let Some(start) = start {
                    write!(f, "{start}")?;
                }
                write!(f, ":")?;
                if let Some(end) = end {
                    write!(f, "{end}")?;
                }
                if let Some(step) = step {
                    write!(f, ":{step}")?;
                }
                write!(f, "]")
            }
        }
    }
}
