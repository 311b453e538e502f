//! Expression evaluation errors.

use thiserror::Error;

/// Underlying cause of an expression failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    /// Expression text is not well formed
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte offset of the offending token
        position: usize,
        /// What the parser expected or found
        message: String,
    },

    /// A free variable has no binding in the context
    #[error("Unknown variable '{name}'")]
    UnknownVariable {
        /// The unbound variable
        name: String,
    },

    /// A variable could not be bound because its resource was unavailable
    #[error("Variable '{name}' is unavailable: {reason}")]
    VariableUnavailable {
        /// The variable that failed to bind
        name: String,
        /// Why the backing resource could not be obtained
        reason: String,
    },

    /// Call to a function that is neither builtin nor an extension
    #[error("Unknown function '{name}'")]
    UnknownFunction {
        /// The function name
        name: String,
    },

    /// Field selection on a map that lacks the key
    #[error("No such key '{key}' (available: {})", format_available(.available))]
    NoSuchKey {
        /// The missing key
        key: String,
        /// Keys present on the map
        available: Vec<String>,
    },

    /// List index outside the list bounds
    #[error("Index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// List length
        len: usize,
    },

    /// Operand types do not fit the operation
    #[error("Type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The operation being performed
        operation: String,
        /// Accepted operand type(s)
        expected: String,
        /// Actual operand type
        found: String,
    },

    /// Integer or float division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Arithmetic overflow or non-finite float result
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// The operation that overflowed
        operation: String,
    },

    /// Wrong number or shape of arguments to a function
    #[error("Invalid arguments to {function}: {message}")]
    InvalidArgument {
        /// The function called
        function: String,
        /// What was wrong
        message: String,
    },

    /// Collection macro input exceeds the iteration bound
    #[error("Collection of {size} elements exceeds the limit of {limit}")]
    CollectionTooLarge {
        /// Input size
        size: usize,
        /// Configured bound
        limit: usize,
    },

    /// An extension function reported a failure
    #[error("Extension function '{function}' failed: {message}")]
    Extension {
        /// The extension name
        function: String,
        /// Message returned by the extension
        message: String,
    },
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

/// An expression failed to parse or evaluate.
///
/// Carries the original expression text alongside the underlying cause so the
/// failure is actionable without inspecting evaluator state.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Failed to evaluate expression '{expression}': {cause}")]
pub struct CelExpressionError {
    /// The original expression text
    pub expression: String,
    /// What went wrong
    #[source]
    pub cause: EvalError,
}

impl CelExpressionError {
    /// Wrap a cause with the expression text.
    pub fn new(expression: impl Into<String>, cause: EvalError) -> Self {
        Self {
            expression: expression.into(),
            cause,
        }
    }
}
