//! Builtin functions, receiver functions, and the caller-supplied extension table.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::EvalError;

/// Global functions available to every expression.
pub const BUILTIN_FUNCTIONS: &[&str] = &["string", "int", "double", "size", "has", "concat"];

/// Functions callable in receiver style, e.g. `name.startsWith("web")`.
pub const RECEIVER_FUNCTIONS: &[&str] =
    &["size", "startsWith", "endsWith", "contains", "matches", "lowerAscii", "upperAscii"];

/// A caller-supplied function over evaluated arguments.
///
/// Errors are plain messages; the evaluator wraps them with the function name.
pub type ExtensionFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Extension functions merged over the builtin set.
///
/// An extension registered under a builtin's name replaces the builtin. Receiver
/// calls `x.f(a)` also reach an extension `f` as `f(x, a)`.
///
/// # Examples
///
/// ```rust
/// use refgraph_cli::expression::{EvalContext, FunctionTable, evaluate};
/// use serde_json::{Value, json};
///
/// let functions = FunctionTable::new().with_function("double_it", |args: &[Value]| {
///     args.first()
///         .and_then(Value::as_i64)
///         .map(|n| json!(n * 2))
///         .ok_or_else(|| "expected an integer".to_string())
/// });
/// let ctx = EvalContext::new().with_functions(functions);
/// assert_eq!(evaluate("double_it(21)", &ctx).unwrap(), json!(42));
/// ```
#[derive(Clone, Default)]
pub struct FunctionTable {
    extensions: HashMap<String, ExtensionFn>,
}

impl FunctionTable {
    /// An empty table: builtins only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension, returning the table.
    #[must_use]
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    /// Register an extension in place.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.extensions.insert(name.into(), Arc::new(function));
    }

    /// Copy every extension of `other` into this table, replacing same-named entries.
    pub fn merge(&mut self, other: &FunctionTable) {
        for (name, function) in &other.extensions {
            self.extensions.insert(name.clone(), Arc::clone(function));
        }
    }

    /// Whether `name` is a registered extension.
    pub fn is_extension(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// Whether `name` is callable as a global function.
    pub fn contains(&self, name: &str) -> bool {
        self.is_extension(name) || BUILTIN_FUNCTIONS.contains(&name)
    }

    /// Whether `name` is callable in receiver style.
    pub fn contains_method(&self, name: &str) -> bool {
        self.is_extension(name) || RECEIVER_FUNCTIONS.contains(&name)
    }

    /// Sorted extension names.
    pub fn extension_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.extensions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub(crate) fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        if let Some(function) = self.extensions.get(name) {
            return call_extension(name, function, args);
        }
        match name {
            "string" => to_string(single(name, args)?).map(Value::String),
            "int" => to_int(single(name, args)?),
            "double" => to_double(single(name, args)?),
            "size" => size(single(name, args)?),
            "has" => has(args),
            "concat" => concat(args),
            _ => Err(EvalError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }

    pub(crate) fn call_method(
        &self,
        name: &str,
        receiver: &Value,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        if let Some(function) = self.extensions.get(name) {
            let mut all = Vec::with_capacity(args.len() + 1);
            all.push(receiver.clone());
            all.extend_from_slice(args);
            return call_extension(name, function, &all);
        }
        match name {
            "size" => {
                arity(name, args, 0)?;
                size(receiver)
            }
            "startsWith" | "endsWith" | "contains" => {
                arity(name, args, 1)?;
                let text = expect_str(name, receiver)?;
                let needle = expect_str(name, &args[0])?;
                let result = match name {
                    "startsWith" => text.starts_with(needle),
                    "endsWith" => text.ends_with(needle),
                    _ => text.contains(needle),
                };
                Ok(Value::Bool(result))
            }
            "matches" => {
                arity(name, args, 1)?;
                let text = expect_str(name, receiver)?;
                let pattern = expect_str(name, &args[0])?;
                let regex = regex::Regex::new(pattern).map_err(|e| EvalError::InvalidArgument {
                    function: name.to_string(),
                    message: format!("invalid regular expression '{pattern}': {e}"),
                })?;
                Ok(Value::Bool(regex.is_match(text)))
            }
            "lowerAscii" => {
                arity(name, args, 0)?;
                Ok(Value::String(expect_str(name, receiver)?.to_ascii_lowercase()))
            }
            "upperAscii" => {
                arity(name, args, 0)?;
                Ok(Value::String(expect_str(name, receiver)?.to_ascii_uppercase()))
            }
            _ => Err(EvalError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable").field("extensions", &self.extension_names()).finish()
    }
}

/// CEL-style type name of a value, used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

fn call_extension(name: &str, function: &ExtensionFn, args: &[Value]) -> Result<Value, EvalError> {
    function(args).map_err(|message| EvalError::Extension {
        function: name.to_string(),
        message,
    })
}

fn arity(function: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::InvalidArgument {
            function: function.to_string(),
            message: format!("expected {expected} argument(s), got {}", args.len()),
        })
    }
}

fn single<'a>(function: &str, args: &'a [Value]) -> Result<&'a Value, EvalError> {
    arity(function, args, 1)?;
    Ok(&args[0])
}

fn mismatch(operation: &str, expected: &str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        operation: operation.to_string(),
        expected: expected.to_string(),
        found: type_name(found).to_string(),
    }
}

fn expect_str<'a>(function: &str, value: &'a Value) -> Result<&'a str, EvalError> {
    value.as_str().ok_or_else(|| mismatch(function, "string", value))
}

pub(crate) fn to_string(value: &Value) -> Result<String, EvalError> {
    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string()),
        },
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).map_err(|e| EvalError::InvalidArgument {
                function: "string".to_string(),
                message: e.to_string(),
            })?
        }
    })
}

fn to_int(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::from(i));
            }
            let f = n.as_f64().unwrap_or(f64::NAN);
            if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(Value::from(f.trunc() as i64))
            } else {
                Err(EvalError::Overflow {
                    operation: "int()".to_string(),
                })
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|e| {
            EvalError::InvalidArgument {
                function: "int".to_string(),
                message: format!("cannot convert '{s}' to int: {e}"),
            }
        }),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        other => Err(mismatch("int()", "int, double, string or bool", other)),
    }
}

fn to_double(value: &Value) -> Result<Value, EvalError> {
    let f = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().map_err(|e| EvalError::InvalidArgument {
            function: "double".to_string(),
            message: format!("cannot convert '{s}' to double: {e}"),
        })?,
        other => return Err(mismatch("double()", "int, double or string", other)),
    };
    serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(|| EvalError::Overflow {
        operation: "double()".to_string(),
    })
}

fn size(value: &Value) -> Result<Value, EvalError> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(mismatch("size()", "string, list or map", other)),
    };
    Ok(Value::from(len as u64))
}

/// Value form of `has`: `has(x)` is a not-null test, `has(container, key)` a
/// membership test. The field-selection form is handled by the evaluator.
pub(crate) fn has(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [value] => Ok(Value::Bool(!value.is_null())),
        [Value::Object(map), Value::String(key)] => {
            Ok(Value::Bool(map.get(key).is_some_and(|v| !v.is_null())))
        }
        [Value::Array(items), Value::Number(index)] => {
            Ok(Value::Bool(index.as_u64().is_some_and(|i| (i as usize) < items.len())))
        }
        [Value::Null, _] => Ok(Value::Bool(false)),
        [container, _] => Err(mismatch("has()", "map or list container", container)),
        _ => Err(EvalError::InvalidArgument {
            function: "has".to_string(),
            message: format!("expected 1 or 2 arguments, got {}", args.len()),
        }),
    }
}

/// Variadic string join. `null` contributes nothing; other scalars are
/// rendered as with `string()`.
fn concat(args: &[Value]) -> Result<Value, EvalError> {
    let mut out = String::new();
    for arg in args {
        match arg {
            Value::Null => {}
            Value::Array(_) | Value::Object(_) => {
                return Err(mismatch("concat()", "string or scalar", arg));
            }
            other => out.push_str(&to_string(other)?),
        }
    }
    Ok(Value::String(out))
}
