//! CEL-like expression evaluation.
//!
//! Expressions are small formulas over resource manifests:
//!
//! ```text
//! concat("http://", svc.status.clusterIP)
//! app.status.readyReplicas >= app.spec.replicas ? "ready" : "pending"
//! has(db.status.podIP) && db.spec.ports.exists(p, p.port == 5432)
//! ```
//!
//! Free variables are resource ids (and `schema`); they are bound to full
//! manifests in an [`EvalContext`] and the evaluator navigates fields itself.
//! [`parse`] produces a reusable [`CompiledExpression`]; [`evaluate`] parses and
//! evaluates in one step; [`validate`] checks syntax without evaluating.
//!
//! # Builtins
//!
//! | Function | Meaning |
//! |----------|---------|
//! | `string(x)`, `int(x)`, `double(x)` | conversions |
//! | `size(x)` | length of a string, list or map |
//! | `has(a.b)` / `has(x, key)` / `has(x)` | field presence, key presence, not-null |
//! | `concat(a, b, ...)` | variadic string join |
//!
//! Receiver functions: `size`, `startsWith`, `endsWith`, `contains`, `matches`,
//! `lowerAscii`, `upperAscii`. Macros: `map`, `filter`, `all`, `exists`.
//! Caller-supplied extensions in a [`FunctionTable`] override builtins.

pub mod builders;

mod ast;
mod error;
mod eval;
mod functions;
mod lexer;
mod parser;

pub use builders::{CelBuilders, ExprPart, quote, render_reference};
pub use error::{CelExpressionError, EvalError};
pub use functions::{BUILTIN_FUNCTIONS, ExtensionFn, FunctionTable, RECEIVER_FUNCTIONS, type_name};

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::references::SymbolicReference;
use ast::Expr;

/// Variable bindings and functions for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// Variable name to bound value, typically resource id to manifest
    pub variables: HashMap<String, Value>,
    /// Extension functions merged over the builtins
    pub functions: FunctionTable,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable, returning the context.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Use the given extension table.
    #[must_use]
    pub fn with_functions(mut self, functions: FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    /// Bind a variable in place.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }
}

/// A parsed expression, reusable across contexts.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    ast: Expr,
}

impl CompiledExpression {
    /// The original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a context.
    ///
    /// # Errors
    ///
    /// Returns [`CelExpressionError`] carrying the expression text and the
    /// underlying [`EvalError`].
    pub fn evaluate(&self, context: &EvalContext) -> Result<Value, CelExpressionError> {
        eval::Evaluator::new(context)
            .eval(&self.ast)
            .map_err(|cause| CelExpressionError::new(&self.source, cause))
    }

    /// References lexically embedded in the expression, in source order.
    ///
    /// Each maximal static member chain rooted at a free variable becomes one
    /// reference; `schema` chains map to the schema sentinel.
    pub fn references(&self) -> Vec<SymbolicReference> {
        ast::collect(&self.ast).references
    }

    /// Free variable names, in source order.
    pub fn free_variables(&self) -> Vec<String> {
        ast::collect(&self.ast).variables
    }

    /// Function names the expression calls that `functions` cannot satisfy.
    pub fn unknown_functions(&self, functions: &FunctionTable) -> Vec<String> {
        let mut called = Vec::new();
        ast::called_functions(&self.ast, &mut called);
        let mut unknown: Vec<String> = Vec::new();
        for (name, receiver) in called {
            let known = if receiver {
                functions.contains_method(&name)
            } else {
                functions.contains(&name)
            };
            if !known && !unknown.contains(&name) {
                unknown.push(name);
            }
        }
        unknown
    }
}

/// Parse expression text.
///
/// # Examples
///
/// ```rust
/// use refgraph_cli::expression::{EvalContext, parse};
/// use serde_json::json;
///
/// let compiled = parse("size(app.spec.containers) > 0").unwrap();
/// assert_eq!(compiled.free_variables(), vec!["app"]);
///
/// let ctx = EvalContext::new().with_variable("app", json!({"spec": {"containers": [{}]}}));
/// assert_eq!(compiled.evaluate(&ctx).unwrap(), json!(true));
/// ```
///
/// # Errors
///
/// Returns [`CelExpressionError`] with an [`EvalError::Parse`] cause.
pub fn parse(expression: &str) -> Result<CompiledExpression, CelExpressionError> {
    let wrap = |cause| CelExpressionError::new(expression, cause);
    let tokens = lexer::Lexer::new(expression).tokenize().map_err(wrap)?;
    let ast = parser::Parser::new(tokens).parse().map_err(wrap)?;
    Ok(CompiledExpression {
        source: expression.to_string(),
        ast,
    })
}

/// Parse and evaluate in one step.
///
/// ```rust
/// use refgraph_cli::expression::{EvalContext, evaluate};
/// use serde_json::json;
///
/// let ctx = EvalContext::new().with_variable("svc", json!({"status": {"clusterIP": "10.0.0.1"}}));
/// let url = evaluate(r#"concat("http://", svc.status.clusterIP)"#, &ctx).unwrap();
/// assert_eq!(url, json!("http://10.0.0.1"));
/// ```
pub fn evaluate(expression: &str, context: &EvalContext) -> Result<Value, CelExpressionError> {
    parse(expression)?.evaluate(context)
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpressionValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Check that an expression parses. Never fails.
pub fn validate(expression: &str) -> ExpressionValidation {
    match parse(expression) {
        Ok(_) => ExpressionValidation {
            valid: true,
            error: None,
        },
        Err(e) => ExpressionValidation {
            valid: false,
            error: Some(e.cause.to_string()),
        },
    }
}

/// Check that an expression parses and only calls functions available in `functions`.
pub fn validate_with(expression: &str, functions: &FunctionTable) -> ExpressionValidation {
    let compiled = match parse(expression) {
        Ok(compiled) => compiled,
        Err(e) => {
            return ExpressionValidation {
                valid: false,
                error: Some(e.cause.to_string()),
            };
        }
    };
    match compiled.unknown_functions(functions).first() {
        Some(name) => ExpressionValidation {
            valid: false,
            error: Some(
                EvalError::UnknownFunction {
                    name: name.clone(),
                }
                .to_string(),
            ),
        },
        None => ExpressionValidation {
            valid: true,
            error: None,
        },
    }
}
