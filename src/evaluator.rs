use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{
    ast::{BinOp, Expr, ExprKind},
    lexer::Position,
    parser::DEFAULT_MAX_DEPTH,
    script::{Kwargs, ScriptError, ScriptResolver},
    slice::{SliceBound, SliceError, SliceSpec},
    value::Value,
};

/// Per-query evaluation state.
///
/// A fresh context is created for every top-level evaluation. Filters hand a
/// copy holding the candidate element to the predicate, so nothing the
/// predicate does leaks back to the caller or to the next candidate.
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Set until the first bare name has been resolved against the document
    pub is_root_query: bool,
    /// The element a filter predicate is currently testing
    pub current_item: Option<Value>,
    depth: usize,
}

impl EvalContext {
    pub fn new() -> Self {
        EvalContext {
            is_root_query: true,
            current_item: None,
            depth: 0,
        }
    }

    /// Create a new context with the filter candidate installed
    pub fn with_current_item(&self, item: Value) -> Self {
        EvalContext {
            is_root_query: self.is_root_query,
            current_item: Some(item),
            depth: self.depth,
        }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during evaluation.
///
/// Everything except [`EvalError::Script`] describes a path that does not fit
/// the document it was applied to.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Bare identifier used after root resolution
    #[error("name error at {position}: '{name}' is not defined")]
    UndefinedName { name: String, position: Position },

    /// Missing key where the path requires one
    #[error("path error: key '{key}' not found")]
    KeyNotFound { key: String },

    #[error("path error: index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// A path step applied to the wrong kind of value
    #[error("path error: cannot apply '{segment}' to {found}")]
    PathMismatch {
        segment: String,
        found: &'static str,
    },

    #[error("type error at {position}: {message}")]
    Type { message: String, position: Position },

    #[error("unsupported operator '{op}' for {left} and {right} at {position}")]
    UnsupportedOperator {
        op: BinOp,
        left: &'static str,
        right: &'static str,
        position: Position,
    },

    #[error("arithmetic error at {position}: division by zero")]
    DivisionByZero { position: Position },

    #[error("arithmetic error at {position}: integer overflow in '{op}'")]
    Overflow { op: BinOp, position: Position },

    #[error(transparent)]
    Slice(#[from] SliceError),

    #[error("evaluation nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Tree-walking interpreter for parsed paths.
///
/// # Examples
///
/// ```
/// use dictquery::{Evaluator, Value, parser::parse_path, script::NoScripts};
/// use serde_json::json;
///
/// let doc = Value::from(json!({"root": {"list": [{"id": 1}, {"id": 2}]}}));
/// let expr = parse_path("root.list['id' == 2]").unwrap();
///
/// let result = Evaluator::new(&doc, &NoScripts).evaluate(&expr).unwrap();
/// assert_eq!(result, Value::from(json!([{"id": 2}])));
/// ```
pub struct Evaluator<'a> {
    document: &'a Value,
    resolver: &'a dyn ScriptResolver,
    max_depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(document: &'a Value, resolver: &'a dyn ScriptResolver) -> Self {
        Evaluator {
            document,
            resolver,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Evaluate `expr` against the document with a fresh context.
    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip_all, fields(path = %expr), err))]
    pub fn evaluate(&self, expr: &Expr) -> Result<Value, EvalError> {
        let mut ctx = EvalContext::new();
        self.eval_expr(expr, &mut ctx)
    }

    /// Evaluate `expr` with a caller-supplied context.
    pub fn evaluate_in(&self, expr: &Expr, ctx: &mut EvalContext) -> Result<Value, EvalError> {
        self.eval_expr(expr, ctx)
    }

    fn eval_expr(&self, expr: &Expr, ctx: &mut EvalContext) -> Result<Value, EvalError> {
        if ctx.depth >= self.max_depth {
            return Err(EvalError::NestingTooDeep {
                limit: self.max_depth,
            });
        }
        ctx.depth += 1;
        let result = self.eval_node(expr, ctx);
        ctx.depth -= 1;
        result
    }

    fn eval_node(&self, expr: &Expr, ctx: &mut EvalContext) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Integer(n) => Ok(Value::Integer(*n)),
            ExprKind::Float(n) => Ok(Value::Float(*n)),
            ExprKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::String(s) => {
                // Inside a filter a string first names a key of the candidate
                if let Some(Value::Object(item)) = &ctx.current_item
                    && let Some(value) = item.get(s)
                {
                    return Ok(value.clone());
                }
                Ok(Value::String(s.clone()))
            }
            ExprKind::Root | ExprKind::RootWildcard => {
                ctx.is_root_query = false;
                Ok(self.document.clone())
            }
            ExprKind::Name(name) => {
                if ctx.is_root_query {
                    ctx.is_root_query = false;
                    #[cfg(feature = "trace")]
                    tracing::trace!(name = %name, "resolving root name");
                    return Ok(access_key(self.document, name));
                }
                Err(EvalError::UndefinedName {
                    name: name.clone(),
                    position: expr.position,
                })
            }
            ExprKind::VarRef(name) => {
                ctx.is_root_query = false;
                if let Some(value) = self.resolver.lookup_variable(name) {
                    return Ok(value);
                }
                Ok(self
                    .document
                    .as_object()
                    .and_then(|root| root.get(name))
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            ExprKind::ScriptCall {
                module_path,
                name,
                args,
                kwargs,
            } => {
                // Arguments reach the document through `$name`, not bare names
                ctx.is_root_query = false;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval_expr(arg, ctx)?);
                }
                let mut kwarg_values = Kwargs::with_capacity(kwargs.len());
                for (key, arg) in kwargs {
                    kwarg_values.insert(key.clone(), self.eval_expr(arg, ctx)?);
                }
                let namespace = module_path.join(".");
                let namespace = (!namespace.is_empty()).then_some(namespace.as_str());
                Ok(self
                    .resolver
                    .resolve_and_call(name, namespace, arg_values, kwarg_values)?)
            }
            ExprKind::BinaryOp { op, left, right } => {
                let left_val = self.eval_expr(left, ctx)?;
                match op {
                    BinOp::And => {
                        if !left_val.is_truthy() {
                            return Ok(Value::Boolean(false));
                        }
                        let right_val = self.eval_expr(right, ctx)?;
                        Ok(Value::Boolean(right_val.is_truthy()))
                    }
                    BinOp::Or => {
                        if left_val.is_truthy() {
                            return Ok(Value::Boolean(true));
                        }
                        let right_val = self.eval_expr(right, ctx)?;
                        Ok(Value::Boolean(right_val.is_truthy()))
                    }
                    _ => {
                        let right_val = self.eval_expr(right, ctx)?;
                        apply_binop(*op, &left_val, &right_val, expr.position)
                    }
                }
            }
            ExprKind::Key {
                object,
                key,
                wildcard,
            } => {
                let obj_value = self.eval_expr(object, ctx)?;
                if *wildcard {
                    Ok(wildcard_values(obj_value))
                } else {
                    Ok(access_key(&obj_value, key))
                }
            }
            ExprKind::Index { object, index } => {
                let obj_value = self.eval_expr(object, ctx)?;
                if obj_value.is_null() {
                    return Ok(Value::Null);
                }
                match (&index.kind, obj_value) {
                    (ExprKind::Wildcard, obj_value) => Ok(wildcard_values(obj_value)),
                    (ExprKind::BinaryOp { .. }, Value::Array(items)) => {
                        Ok(Value::Array(self.filter_array(&items, index, ctx)?))
                    }
                    (ExprKind::String(key), obj_value) => Ok(access_key(&obj_value, key)),
                    (_, obj_value) => {
                        let key = self.eval_expr(index, ctx)?;
                        apply_index(&obj_value, &key, index.position)
                    }
                }
            }
            ExprKind::Wildcard => Err(EvalError::Type {
                message: "'*' is only valid inside brackets".to_string(),
                position: expr.position,
            }),
            ExprKind::Slice {
                object,
                start,
                end,
                step,
            } => {
                let obj_value = self.eval_expr(object, ctx)?;
                if obj_value.is_null() {
                    return Ok(Value::Null);
                }
                let spec = SliceSpec::new(
                    self.eval_bound(start.as_deref(), SliceBound::Start, ctx)?,
                    self.eval_bound(end.as_deref(), SliceBound::End, ctx)?,
                    self.eval_bound(step.as_deref(), SliceBound::Step, ctx)?,
                )?;
                match obj_value {
                    Value::Array(items) => Ok(Value::Array(spec.apply(&items))),
                    Value::String(s) => {
                        let chars: Vec<char> = s.chars().collect();
                        Ok(Value::String(spec.apply(&chars).into_iter().collect()))
                    }
                    other => Err(EvalError::Type {
                        message: format!("cannot slice {}", other.type_name()),
                        position: expr.position,
                    }),
                }
            }
        }
    }

    fn eval_bound(
        &self,
        bound: Option<&Expr>,
        which: SliceBound,
        ctx: &mut EvalContext,
    ) -> Result<Option<i64>, EvalError> {
        let Some(bound) = bound else {
            return Ok(None);
        };
        match self.eval_expr(bound, ctx)? {
            Value::Integer(n) => Ok(Some(n)),
            other => Err(SliceError::BoundNotInteger {
                bound: which,
                found: render_scalar(&other),
            }
            .into()),
        }
    }

    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip(self, items, ctx), fields(candidates = items.len()), err))]
    fn filter_array(
        &self,
        items: &[Value],
        predicate: &Expr,
        ctx: &EvalContext,
    ) -> Result<Vec<Value>, EvalError> {
        let mut result = Vec::new();

        for item in items {
            let mut item_ctx = ctx.with_current_item(item.clone());

            let keep = self.eval_expr(predicate, &mut item_ctx)?;

            if keep.is_truthy() {
                result.push(item.clone());
            }
        }

        #[cfg(feature = "trace")]
        tracing::debug!(matched = result.len(), "filter applied");
        Ok(result)
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Float(n) => format!("{n:?}"),
        Value::String(s) => format!("\"{s}\""),
        Value::Integer(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => other.type_name().to_string(),
    }
}

/// Explicit wildcard: mapping values in order, sequences unchanged, anything else null
fn wildcard_values(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Array(map.into_values().collect()),
        arr @ Value::Array(_) => arr,
        _ => Value::Null,
    }
}

/// Permissive key access: a missing key is null, and a sequence projects the
/// key over every element that has it.
pub(crate) fn access_key(object: &Value, key: &str) -> Value {
    match object {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter_map(|item| item.as_object().and_then(|m| m.get(key)).cloned())
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// Resolve a possibly negative position against `len`
pub(crate) fn resolve_position(index: i64, len: usize) -> Result<usize, EvalError> {
    let resolved = if index < 0 {
        i64::try_from(len).ok().and_then(|l| l.checked_add(index))
    } else {
        Some(index)
    };
    resolved
        .and_then(|i| usize::try_from(i).ok())
        .filter(|i| *i < len)
        .ok_or(EvalError::IndexOutOfRange { index, len })
}

fn apply_index(object: &Value, key: &Value, position: Position) -> Result<Value, EvalError> {
    match (object, key) {
        (Value::Array(items), Value::Integer(n)) => {
            Ok(items[resolve_position(*n, items.len())?].clone())
        }
        (Value::Array(_), Value::String(k)) => Ok(access_key(object, k)),
        (Value::Array(_), other) => Err(EvalError::Type {
            message: format!("array index must be an integer, got {}", other.type_name()),
            position,
        }),
        (Value::String(s), Value::Integer(n)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::String(chars[resolve_position(*n, chars.len())?].to_string()))
        }
        (Value::Object(map), Value::String(k)) => Ok(map.get(k).cloned().unwrap_or(Value::Null)),
        (Value::Object(map), Value::Integer(k)) => {
            Ok(map.get(&k.to_string()).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::Float(k)) => {
            Ok(map.get(&k.to_string()).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::Boolean(k)) => {
            Ok(map.get(&k.to_string()).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(_), other) => Err(EvalError::Type {
            message: format!("cannot use {} as an object key", other.type_name()),
            position,
        }),
        _ => Ok(Value::Null),
    }
}

fn apply_binop(op: BinOp, left: &Value, right: &Value, position: Position) -> Result<Value, EvalError> {
    use std::cmp::Ordering;

    let ordered = |test: fn(Ordering) -> bool| match left.compare(right) {
        Some(ordering) => Ok(Value::Boolean(test(ordering))),
        None => Err(EvalError::Type {
            message: format!(
                "cannot compare {} {} {}",
                left.type_name(),
                op,
                right.type_name()
            ),
            position,
        }),
    };

    match op {
        BinOp::Equal => Ok(Value::Boolean(left.loose_eq(right))),
        BinOp::NotEqual => Ok(Value::Boolean(!left.loose_eq(right))),
        BinOp::LessThan => ordered(Ordering::is_lt),
        BinOp::GreaterThan => ordered(Ordering::is_gt),
        BinOp::LessEqual => ordered(Ordering::is_le),
        BinOp::GreaterEqual => ordered(Ordering::is_ge),
        BinOp::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinOp::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
        BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide => {
            arithmetic(op, left, right, position)
        }
    }
}

fn arithmetic(op: BinOp, left: &Value, right: &Value, position: Position) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => integer_arithmetic(op, *a, *b, position),
        (Value::Float(a), Value::Float(b)) => float_arithmetic(op, *a, *b, position),
        (Value::Integer(a), Value::Float(b)) => {
            mixed_arithmetic(op, Decimal::from_i64(*a), Decimal::from_f64(*b), *a as f64, *b, position)
        }
        (Value::Float(a), Value::Integer(b)) => {
            mixed_arithmetic(op, Decimal::from_f64(*a), Decimal::from_i64(*b), *a, *b as f64, position)
        }
        (Value::String(a), Value::String(b)) if op == BinOp::Add => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (Value::Array(a), Value::Array(b)) if op == BinOp::Add => {
            Ok(Value::Array(a.iter().chain(b).cloned().collect()))
        }
        (a, b) => Err(EvalError::UnsupportedOperator {
            op,
            left: a.type_name(),
            right: b.type_name(),
            position,
        }),
    }
}

fn integer_arithmetic(op: BinOp, a: i64, b: i64, position: Position) -> Result<Value, EvalError> {
    let overflow = || EvalError::Overflow { op, position };
    match op {
        BinOp::Add => a.checked_add(b).map(Value::Integer).ok_or_else(overflow),
        BinOp::Subtract => a.checked_sub(b).map(Value::Integer).ok_or_else(overflow),
        BinOp::Multiply => a.checked_mul(b).map(Value::Integer).ok_or_else(overflow),
        BinOp::Divide => {
            if b == 0 {
                return Err(EvalError::DivisionByZero { position });
            }
            // Exact division stays an integer
            match a.checked_rem(b) {
                Some(0) => a.checked_div(b).map(Value::Integer).ok_or_else(overflow),
                _ => Ok(Value::Float(a as f64 / b as f64)),
            }
        }
        _ => unreachable!("integer_arithmetic called with {op}"),
    }
}

fn float_arithmetic(op: BinOp, a: f64, b: f64, position: Position) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Subtract => Ok(Value::Float(a - b)),
        BinOp::Multiply => Ok(Value::Float(a * b)),
        BinOp::Divide if b == 0.0 => Err(EvalError::DivisionByZero { position }),
        BinOp::Divide => Ok(Value::Float(a / b)),
        _ => unreachable!("float_arithmetic called with {op}"),
    }
}

/// Integer/float mixes go through `Decimal` so that e.g. `1 + 0.5 * 2`
/// lands on an exact integer instead of a float approximation.
fn mixed_arithmetic(
    op: BinOp,
    a_dec: Option<Decimal>,
    b_dec: Option<Decimal>,
    a: f64,
    b: f64,
    position: Position,
) -> Result<Value, EvalError> {
    if op == BinOp::Divide && b == 0.0 {
        return Err(EvalError::DivisionByZero { position });
    }

    if let Some(ad) = a_dec
        && let Some(bd) = b_dec
    {
        let rd = match op {
            BinOp::Add => ad.checked_add(bd),
            BinOp::Subtract => ad.checked_sub(bd),
            BinOp::Multiply => ad.checked_mul(bd),
            BinOp::Divide => ad.checked_div(bd),
            _ => None,
        };
        if let Some(rd) = rd {
            if rd.is_integer()
                && let Some(r) = rd.to_i64()
            {
                return Ok(Value::Integer(r));
            } else if let Some(r) = rd.to_f64() {
                return Ok(Value::Float(r));
            }
        }
    }

    float_arithmetic(op, a, b, position)
}
