//! Log call arguments and the default formatter that renders them.

use std::fmt::Write as _;

const ESC: &str = "\x1b";
/// Bright red, as used for error messages and viewer tags.
pub const BRIGHT_RED: &str = "1;31";

/// Wraps `text` in an ANSI color sequence.
pub fn colorize(color: &str, text: &str) -> String {
    format!("{ESC}[{color}m{text}{ESC}[0m")
}

/// A single argument of a log call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An error message with its chain of causes, outermost first.
    Error {
        message: String,
        causes: Vec<String>,
    },
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
    Function(String),
}

impl Value {
    /// Captures an error and its `source()` chain.
    pub fn error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Value::Error {
            message: err.to_string(),
            causes,
        }
    }

    /// Builds an object from key/value pairs, keeping their order.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Renders any `Debug` value as a plain string argument.
    pub fn debug<T: std::fmt::Debug + ?Sized>(value: &T) -> Self {
        Value::Str(format!("{value:?}"))
    }

    fn is_composite(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, isize);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or_else(|_| Value::Str(v.to_string()), Value::Int)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::from(v as u64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or_else(|| Value::Str(n.to_string()), Value::Float),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Controls the structural dump of composite values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectOptions {
    /// Nesting levels shown before collapsing to `[Array]` / `[Object]`.
    pub depth: usize,
    pub colors: bool,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            depth: 2,
            colors: true,
        }
    }
}

/// Renders call arguments the way `console.log` would, joined with one space.
pub fn to_debug_string(opts: &InspectOptions, args: &[Value]) -> String {
    args.iter()
        .map(|arg| render_arg(opts, arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_arg(opts: &InspectOptions, arg: &Value) -> String {
    match arg {
        Value::Undefined => "--undefined--".to_string(),
        Value::Null => "--null--".to_string(),
        Value::Str(s) if s.is_empty() => "''".to_string(),
        Value::Str(s) => s.clone(),
        Value::Error { message, causes } => {
            let mut out = if opts.colors {
                colorize(BRIGHT_RED, message)
            } else {
                message.clone()
            };
            for cause in causes {
                let _ = write!(out, "\n    caused by: {cause}");
            }
            out
        }
        Value::Array(_) | Value::Object(_) => {
            let mut out = String::new();
            inspect(&mut out, arg, 0, opts.depth);
            out
        }
        other => scalar(other),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => s.clone(),
        Value::Function(name) if name.is_empty() => "[Function (anonymous)]".to_string(),
        Value::Function(name) => format!("[Function: {name}]"),
        Value::Error { message, .. } => format!("[Error: {message}]"),
        Value::Array(_) => "[Array]".to_string(),
        Value::Object(_) => "[Object]".to_string(),
    }
}

fn inspect(out: &mut String, value: &Value, level: usize, max_depth: usize) {
    match value {
        Value::Array(items) if level > max_depth && !items.is_empty() => out.push_str("[Array]"),
        Value::Object(entries) if level > max_depth && !entries.is_empty() => {
            out.push_str("[Object]");
        }
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push_str("[ ");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                inspect(out, item, level + 1, max_depth);
            }
            out.push_str(" ]");
        }
        Value::Object(entries) => {
            if entries.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{ ");
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(key);
                out.push_str(": ");
                inspect(out, item, level + 1, max_depth);
            }
            out.push_str(" }");
        }
        Value::Str(s) => {
            let _ = write!(out, "'{s}'");
        }
        other if !other.is_composite() => out.push_str(&scalar(other)),
        _ => {}
    }
}

/// Builds a `Vec<Value>` from heterogeneous arguments.
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::Value::from($arg)),*]
    };
}
