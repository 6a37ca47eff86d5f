//! Variable and script resolution for `$name` and `@name(...)` references.
//!
//! The evaluator only sees the [`ScriptResolver`] trait. [`ScriptRegistry`]
//! is the stock implementation: callables registered under dotted names,
//! plain variables, and a small set of builtins.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{ast::expressions::is_identifier, convert::value_to_json, value::Value};

/// Keyword arguments in call order
pub type Kwargs = IndexMap<String, Value>;

/// Signature of a registered script. An `Err` carries a message for the caller.
pub type ScriptFn = dyn Fn(&[Value], &Kwargs) -> Result<Value, String> + Send + Sync;

fn qualified(namespace: &Option<String>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{ns}.{name}"),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("no script named '{}' is registered", qualified(.namespace, .name))]
    Unresolved {
        name: String,
        namespace: Option<String>,
    },

    #[error("script '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("invalid script registration name '{name}'")]
    InvalidRegistration { name: String },
}

/// Capability the evaluator calls for variable references and script calls.
pub trait ScriptResolver {
    /// Value bound to `$name`, if any.
    fn lookup_variable(&self, name: &str) -> Option<Value>;

    /// Find the callable for `name` (optionally under `namespace`, a
    /// dot-joined module path) and invoke it.
    fn resolve_and_call(
        &self,
        name: &str,
        namespace: Option<&str>,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Value, ScriptError>;
}

/// A resolver with no variables and no scripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScripts;

impl ScriptResolver for NoScripts {
    fn lookup_variable(&self, _name: &str) -> Option<Value> {
        None
    }

    fn resolve_and_call(
        &self,
        name: &str,
        namespace: Option<&str>,
        _args: Vec<Value>,
        _kwargs: Kwargs,
    ) -> Result<Value, ScriptError> {
        Err(ScriptError::Unresolved {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        })
    }
}

/// Registry of scripts and variables.
///
/// A call `@a.b.name(...)` is resolved by trying `a.b.name`, then `a.name`,
/// then the global `name`, and finally the builtins (when enabled).
///
/// ```
/// use dictquery::script::{ScriptRegistry, ScriptResolver, Kwargs};
/// use dictquery::Value;
///
/// let mut registry = ScriptRegistry::default();
/// registry
///     .register("math.double", |args, _| match args.first() {
///         Some(Value::Integer(n)) => Ok(Value::Integer(n * 2)),
///         _ => Err("expected an integer".to_string()),
///     })
///     .unwrap();
///
/// let result = registry
///     .resolve_and_call("double", Some("math"), vec![Value::Integer(21)], Kwargs::new())
///     .unwrap();
/// assert_eq!(result, Value::Integer(42));
/// ```
pub struct ScriptRegistry {
    scripts: HashMap<String, Box<ScriptFn>>,
    variables: HashMap<String, Value>,
    builtins: bool,
}

impl ScriptRegistry {
    /// Creates an empty registry without builtins.
    pub fn new() -> Self {
        ScriptRegistry {
            scripts: HashMap::new(),
            variables: HashMap::new(),
            builtins: false,
        }
    }

    /// Register `script` under a dotted name such as `"clamp"` or `"math.clamp"`.
    pub fn register<F>(&mut self, name: &str, script: F) -> Result<&mut Self, ScriptError>
    where
        F: Fn(&[Value], &Kwargs) -> Result<Value, String> + Send + Sync + 'static,
    {
        if !name.split('.').all(is_identifier) {
            return Err(ScriptError::InvalidRegistration {
                name: name.to_string(),
            });
        }
        self.scripts.insert(name.to_string(), Box::new(script));
        Ok(self)
    }

    /// Bind a variable for `$name` references.
    pub fn define(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    fn resolve(&self, name: &str, namespace: Option<&str>) -> Option<&ScriptFn> {
        let mut scope = namespace.filter(|ns| !ns.is_empty());
        while let Some(ns) = scope {
            if let Some(script) = self.scripts.get(&format!("{ns}.{name}")) {
                return Some(script.as_ref());
            }
            scope = ns.rsplit_once('.').map(|(parent, _)| parent);
        }
        self.scripts.get(name).map(|script| script.as_ref())
    }
}

impl Default for ScriptRegistry {
    /// Creates a registry with the builtins enabled.
    fn default() -> Self {
        ScriptRegistry {
            builtins: true,
            ..ScriptRegistry::new()
        }
    }
}

impl std::fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.scripts.keys().collect();
        names.sort();
        f.debug_struct("ScriptRegistry")
            .field("scripts", &names)
            .field("variables", &self.variables)
            .field("builtins", &self.builtins)
            .finish()
    }
}

impl ScriptResolver for ScriptRegistry {
    fn lookup_variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn resolve_and_call(
        &self,
        name: &str,
        namespace: Option<&str>,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Value, ScriptError> {
        let namespace = namespace.filter(|ns| !ns.is_empty()).map(str::to_string);
        let failed = |message: String| ScriptError::Failed {
            name: qualified(&namespace, name),
            message,
        };

        if let Some(script) = self.resolve(name, namespace.as_deref()) {
            #[cfg(feature = "trace")]
            tracing::trace!(script = name, ?namespace, "calling registered script");
            return script(&args, &kwargs).map_err(failed);
        }

        if self.builtins
            && let Some(builtin) = builtin(name)
        {
            return builtin(&args).map_err(failed);
        }

        Err(ScriptError::Unresolved {
            name: name.to_string(),
            namespace,
        })
    }
}

// ========================================
// Builtins
// ========================================

type Builtin = fn(&[Value]) -> Result<Value, String>;

fn builtin(name: &str) -> Option<Builtin> {
    Some(match name {
        "len" => builtin_len,
        "upper" => builtin_upper,
        "lower" => builtin_lower,
        "str" => builtin_str,
        "int" => builtin_int,
        "float" => builtin_float,
        "abs" => builtin_abs,
        "max" => builtin_max,
        "min" => builtin_min,
        "sum" => builtin_sum,
        _ => return None,
    })
}

fn single(args: &[Value]) -> Result<&Value, String> {
    match args {
        [value] => Ok(value),
        _ => Err(format!("expected 1 argument, got {}", args.len())),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => value_to_json(other.clone()).to_string(),
    }
}

fn builtin_len(args: &[Value]) -> Result<Value, String> {
    let len = match single(args)? {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(format!("{} has no length", other.type_name())),
    };
    i64::try_from(len)
        .map(Value::Integer)
        .map_err(|_| "length out of range".to_string())
}

fn builtin_upper(args: &[Value]) -> Result<Value, String> {
    match single(args)? {
        Value::String(s) => Ok(Value::String(s.to_uppercase())),
        other => Err(format!("upper expects a string, got {}", other.type_name())),
    }
}

fn builtin_lower(args: &[Value]) -> Result<Value, String> {
    match single(args)? {
        Value::String(s) => Ok(Value::String(s.to_lowercase())),
        other => Err(format!("lower expects a string, got {}", other.type_name())),
    }
}

fn builtin_str(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(render(single(args)?)))
}

fn builtin_int(args: &[Value]) -> Result<Value, String> {
    match single(args)? {
        Value::Integer(n) => Ok(Value::Integer(*n)),
        Value::Float(n) if n.is_finite() => Ok(Value::Integer(n.trunc() as i64)),
        Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("invalid integer literal '{s}'")),
        other => Err(format!("cannot convert {} to integer", other.type_name())),
    }
}

fn builtin_float(args: &[Value]) -> Result<Value, String> {
    match single(args)? {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("invalid float literal '{s}'")),
        other => other
            .as_float()
            .map(Value::Float)
            .ok_or_else(|| format!("cannot convert {} to float", other.type_name())),
    }
}

fn builtin_abs(args: &[Value]) -> Result<Value, String> {
    match single(args)? {
        Value::Integer(n) => n
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string()),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        other => Err(format!("abs expects a number, got {}", other.type_name())),
    }
}

/// A single array argument is unpacked, otherwise the arguments themselves are used
fn operands(args: &[Value]) -> &[Value] {
    match args {
        [Value::Array(items)] => items,
        _ => args,
    }
}

fn extreme(args: &[Value], keep: std::cmp::Ordering) -> Result<Value, String> {
    let mut items = operands(args).iter();
    let mut best = items
        .next()
        .ok_or_else(|| "expected at least one value".to_string())?;
    for item in items {
        match item.compare(best) {
            Some(ordering) if ordering == keep => best = item,
            Some(_) => {}
            None => {
                return Err(format!(
                    "cannot compare {} with {}",
                    item.type_name(),
                    best.type_name()
                ));
            }
        }
    }
    Ok(best.clone())
}

fn builtin_max(args: &[Value]) -> Result<Value, String> {
    extreme(args, std::cmp::Ordering::Greater)
}

fn builtin_min(args: &[Value]) -> Result<Value, String> {
    extreme(args, std::cmp::Ordering::Less)
}

fn builtin_sum(args: &[Value]) -> Result<Value, String> {
    let mut int_total: i64 = 0;
    let mut float_total: Option<f64> = None;
    for item in operands(args) {
        match item {
            Value::Integer(n) => match float_total.as_mut() {
                Some(total) => *total += *n as f64,
                None => {
                    int_total = int_total
                        .checked_add(*n)
                        .ok_or_else(|| "integer overflow".to_string())?;
                }
            },
            Value::Float(n) => {
                *float_total.get_or_insert(int_total as f64) += n;
            }
            other => return Err(format!("cannot sum {}", other.type_name())),
        }
    }
    Ok(float_total.map(Value::Float).unwrap_or(Value::Integer(int_total)))
}
