use std::cmp::Ordering;

use indexmap::IndexMap;

/// Ordered mapping used for document objects.
///
/// Keys keep their insertion order so wildcard selections return values in
/// the same order the document declared them.
pub type Map = IndexMap<String, Value>;

/// A document value queried by path expressions.
///
/// This type represents all JSON types with a distinction between
/// integers and floats (unlike standard JSON which only has "number").
///
/// # Examples
///
/// ```
/// use dictquery::Value;
/// use dictquery::value::Map;
///
/// let null = Value::Null;
/// let integer = Value::Integer(42);
/// let string = Value::String("hello".to_string());
///
/// let array = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
///
/// let mut obj = Map::new();
/// obj.insert("key".to_string(), Value::String("value".to_string()));
/// let object = Value::Object(obj);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// JSON null
    #[default]
    Null,

    /// JSON boolean (true/false)
    Boolean(bool),

    /// Floating-point number
    Float(f64),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// UTF-8 string
    String(String),

    /// Ordered sequence of values
    Array(Vec<Value>),

    /// Object with unique string keys in insertion order
    Object(Map),
}

impl Value {
    /// Check if the value is truthy (for filter predicates)
    ///
    /// Zero, empty strings, empty collections and null are falsy.
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Float(n) => *n != 0.0,
            Integer(n) => *n != 0,
            String(s) => !s.is_empty(),
            Array(arr) => !arr.is_empty(),
            Object(obj) => !obj.is_empty(),
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as integer. Floats are never truncated.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Equality as used by `==`, `!=` and result de-duplication.
    ///
    /// Integers and floats compare numerically; everything else compares
    /// structurally.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.loose_eq(other)))
            }
            (a, b) => a == b,
        }
    }

    /// Ordering as used by `<`, `<=`, `>`, `>=`.
    ///
    /// Numbers order numerically, strings lexicographically and booleans
    /// `false < true`. Any other pairing has no ordering and returns `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Recursively flatten nested arrays into a single array.
    ///
    /// Non-array values are returned unchanged.
    ///
    /// ```
    /// use dictquery::Value;
    ///
    /// let nested = Value::Array(vec![
    ///     Value::Integer(1),
    ///     Value::Array(vec![Value::Integer(2), Value::Array(vec![Value::Integer(3)])]),
    /// ]);
    /// assert_eq!(
    ///     nested.flatten(),
    ///     Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
    /// );
    /// ```
    pub fn flatten(self) -> Value {
        fn collect(value: Value, out: &mut Vec<Value>) {
            match value {
                Value::Array(items) => {
                    for item in items {
                        collect(item, out);
                    }
                }
                other => out.push(other),
            }
        }

        match self {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    collect(item, &mut out);
                }
                Value::Array(out)
            }
            other => other,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}
