//! Tree-walking interpreter.

use serde_json::{Number, Value};
use std::cmp::Ordering;

use super::EvalContext;
use super::ast::{BinaryOp, Expr, UnaryOp};
use super::error::EvalError;
use super::functions::{self, type_name};
use crate::constants::MAX_COLLECTION_ITEMS;

/// Numeric view over JSON numbers.
#[derive(Clone, Copy, Debug)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Self> {
        let Value::Number(n) = value else {
            return None;
        };
        if let Some(i) = n.as_i64() {
            Some(Num::Int(i))
        } else {
            n.as_f64().map(Num::Float)
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn float(value: f64, operation: &str) -> Result<Value, EvalError> {
    Number::from_f64(value).map(Value::Number).ok_or_else(|| EvalError::Overflow {
        operation: operation.to_string(),
    })
}

fn mismatch(operation: impl Into<String>, expected: &str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        operation: operation.into(),
        expected: expected.to_string(),
        found: type_name(found).to_string(),
    }
}

/// Equality with numeric cross-type comparison (`1 == 1.0`).
fn values_equal(left: &Value, right: &Value) -> bool {
    match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => match (left, right) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| values_equal(v, w)))
            }
            _ => left == right,
        },
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    let ordering = match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => Some(a.cmp(&b)),
        (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        _ => match (left, right) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => {
                return Err(EvalError::TypeMismatch {
                    operation: format!("'{}'", op.symbol()),
                    expected: "matching numbers, strings or bools".to_string(),
                    found: format!("{} and {}", type_name(left), type_name(right)),
                });
            }
        },
    };
    ordering.ok_or_else(|| EvalError::TypeMismatch {
        operation: format!("'{}'", op.symbol()),
        expected: "comparable numbers".to_string(),
        found: "NaN".to_string(),
    })
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    let symbol = op.symbol();
    match (op, &left, &right) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => return Ok(Value::String(format!("{a}{b}"))),
        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
            let mut joined = a.clone();
            joined.extend(b.iter().cloned());
            return Ok(Value::Array(joined));
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (Num::of(&left), Num::of(&right)) else {
        return Err(EvalError::TypeMismatch {
            operation: format!("'{symbol}'"),
            expected: match op {
                BinaryOp::Add => "numbers, strings or lists".to_string(),
                _ => "numbers".to_string(),
            },
            found: format!("{} and {}", type_name(&left), type_name(&right)),
        });
    };

    let overflow = || EvalError::Overflow {
        operation: format!("'{symbol}'"),
    };
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Mod if b == 0 => return Err(EvalError::DivisionByZero),
                BinaryOp::Div => a.checked_div(b),
                BinaryOp::Mod => a.checked_rem(b),
                _ => None,
            };
            result.map(Value::from).ok_or_else(overflow)
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div if b == 0.0 => return Err(EvalError::DivisionByZero),
                BinaryOp::Div => a / b,
                BinaryOp::Mod => {
                    return Err(EvalError::TypeMismatch {
                        operation: "'%'".to_string(),
                        expected: "int operands".to_string(),
                        found: "double".to_string(),
                    });
                }
                _ => return Err(overflow()),
            };
            float(result, &format!("'{symbol}'"))
        }
    }
}

/// Interpreter state for one evaluation.
pub(crate) struct Evaluator<'c> {
    context: &'c EvalContext,
    scopes: Vec<(String, Value)>,
}

impl<'c> Evaluator<'c> {
    pub fn new(context: &'c EvalContext) -> Self {
        Self {
            context,
            scopes: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some((_, value)) = self.scopes.iter().rev().find(|(bound, _)| bound == name) {
            return Ok(value.clone());
        }
        self.context.variables.get(name).cloned().ok_or_else(|| EvalError::UnknownVariable {
            name: name.to_string(),
        })
    }

    fn eval_bool(&mut self, expr: &Expr, operation: &str) -> Result<bool, EvalError> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(operation, "bool", &other)),
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self.lookup(name),
            Expr::Member {
                target,
                field,
            } => {
                let target = self.eval(target)?;
                select(&target, field)
            }
            Expr::Index {
                target,
                index,
            } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_into(&target, &index)
            }
            Expr::Call {
                function,
                args,
            } => {
                if function == "has" && !self.context.functions.is_extension("has") {
                    return self.eval_has(args);
                }
                let values = args.iter().map(|arg| self.eval(arg)).collect::<Result<Vec<_>, _>>()?;
                self.context.functions.call(function, &values)
            }
            Expr::Method {
                target,
                method,
                args,
            } => {
                if let Some(variable) = expr.macro_variable() {
                    return self.eval_macro(target, method, variable, &args[1]);
                }
                let receiver = self.eval(target)?;
                let values = args.iter().map(|arg| self.eval(arg)).collect::<Result<Vec<_>, _>>()?;
                self.context.functions.call_method(method, &receiver, &values)
            }
            Expr::Unary {
                op,
                operand,
            } => {
                let value = self.eval(operand)?;
                match (op, &value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Not, other) => Err(mismatch("'!'", "bool", other)),
                    (UnaryOp::Neg, other) => match Num::of(other) {
                        Some(Num::Int(i)) => i.checked_neg().map(Value::from).ok_or_else(|| {
                            EvalError::Overflow {
                                operation: "unary '-'".to_string(),
                            }
                        }),
                        Some(Num::Float(f)) => float(-f, "unary '-'"),
                        None => Err(mismatch("unary '-'", "number", other)),
                    },
                }
            }
            Expr::Binary {
                op,
                left,
                right,
            } => self.eval_binary(*op, left, right),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(condition, "'?:' condition")? {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Expr::List(items) => {
                items.iter().map(|item| self.eval(item)).collect::<Result<Vec<_>, _>>().map(Value::Array)
            }
            Expr::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::String(s) => s,
                        other => return Err(mismatch("map literal key", "string", &other)),
                    };
                    map.insert(key, self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        match op {
            BinaryOp::And => {
                Ok(Value::Bool(self.eval_bool(left, "'&&'")? && self.eval_bool(right, "'&&'")?))
            }
            BinaryOp::Or => {
                Ok(Value::Bool(self.eval_bool(left, "'||'")? || self.eval_bool(right, "'||'")?))
            }
            _ => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                match op {
                    BinaryOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
                    BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
                    BinaryOp::Lt => Ok(Value::Bool(compare(op, &left, &right)?.is_lt())),
                    BinaryOp::Le => Ok(Value::Bool(compare(op, &left, &right)?.is_le())),
                    BinaryOp::Gt => Ok(Value::Bool(compare(op, &left, &right)?.is_gt())),
                    BinaryOp::Ge => Ok(Value::Bool(compare(op, &left, &right)?.is_ge())),
                    BinaryOp::In => match &right {
                        Value::Array(items) => {
                            Ok(Value::Bool(items.iter().any(|item| values_equal(&left, item))))
                        }
                        Value::Object(map) => match &left {
                            Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
                            other => Err(mismatch("'in' on a map", "string key", other)),
                        },
                        other => Err(mismatch("'in'", "list or map", other)),
                    },
                    _ => arithmetic(op, left, right),
                }
            }
        }
    }

    /// `has(a.b)` tests field presence on `a`; other forms test values.
    fn eval_has(&mut self, args: &[Expr]) -> Result<Value, EvalError> {
        if let [
            Expr::Member {
                target,
                field,
            },
        ] = args
        {
            return match self.eval(target) {
                Ok(Value::Object(map)) => {
                    Ok(Value::Bool(map.get(field).is_some_and(|v| !v.is_null())))
                }
                Ok(_) | Err(EvalError::NoSuchKey { .. }) => Ok(Value::Bool(false)),
                Err(e) => Err(e),
            };
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match self.eval(arg) {
                Ok(value) => values.push(value),
                Err(EvalError::NoSuchKey { .. } | EvalError::IndexOutOfBounds { .. })
                    if args.len() == 1 =>
                {
                    return Ok(Value::Bool(false));
                }
                Err(e) => return Err(e),
            }
        }
        functions::has(&values)
    }

    fn eval_macro(
        &mut self,
        target: &Expr,
        method: &str,
        variable: &str,
        body: &Expr,
    ) -> Result<Value, EvalError> {
        let items: Vec<Value> = match self.eval(target)? {
            Value::Array(items) => items,
            Value::Object(map) => map.into_iter().map(|(k, _)| Value::String(k)).collect(),
            other => return Err(mismatch(format!("{method}()"), "list or map", &other)),
        };
        if items.len() > MAX_COLLECTION_ITEMS {
            return Err(EvalError::CollectionTooLarge {
                size: items.len(),
                limit: MAX_COLLECTION_ITEMS,
            });
        }

        let operation = format!("{method}() predicate");
        let mut mapped = Vec::new();
        for item in items {
            self.scopes.push((variable.to_string(), item.clone()));
            let result = self.eval(body);
            self.scopes.pop();
            let result = result?;

            match method {
                "map" => mapped.push(result),
                _ => {
                    let Value::Bool(matched) = result else {
                        return Err(mismatch(operation, "bool", &result));
                    };
                    match method {
                        "filter" if matched => mapped.push(item),
                        "all" if !matched => return Ok(Value::Bool(false)),
                        "exists" if matched => return Ok(Value::Bool(true)),
                        _ => {}
                    }
                }
            }
        }
        Ok(match method {
            "all" => Value::Bool(true),
            "exists" => Value::Bool(false),
            _ => Value::Array(mapped),
        })
    }
}

fn select(target: &Value, field: &str) -> Result<Value, EvalError> {
    match target {
        Value::Object(map) => map.get(field).cloned().ok_or_else(|| EvalError::NoSuchKey {
            key: field.to_string(),
            available: map.keys().cloned().collect(),
        }),
        other => Err(mismatch(format!("field selection '.{field}'"), "map", other)),
    }
}

fn index_into(target: &Value, index: &Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::Array(items), index) => {
            let Some(Num::Int(i)) = Num::of(index) else {
                return Err(mismatch("list index", "int", index));
            };
            usize::try_from(i)
                .ok()
                .and_then(|u| items.get(u))
                .cloned()
                .ok_or(EvalError::IndexOutOfBounds {
                    index: i,
                    len: items.len(),
                })
        }
        (Value::Object(_), Value::String(key)) => select(target, key),
        (Value::Object(_), other) => Err(mismatch("map index", "string", other)),
        (other, _) => Err(mismatch("index", "list or map", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{EvalContext, parse};
    use serde_json::json;

    fn eval(expression: &str, ctx: &EvalContext) -> Result<Value, EvalError> {
        parse(expression).map_err(|e| e.cause)?.evaluate(ctx).map_err(|e| e.cause)
    }

    fn ctx() -> EvalContext {
        EvalContext::new()
            .with_variable("svc", json!({"status": {"clusterIP": "10.0.0.1", "ports": [80, 443]}}))
            .with_variable("app", json!({"spec": {"replicas": 3}, "status": {"readyReplicas": 2}}))
    }

    #[test]
    fn test_arithmetic() {
        let ctx = ctx();
        assert_eq!(eval("1 + 2 * 3", &ctx).unwrap(), json!(7));
        assert_eq!(eval("7 / 2", &ctx).unwrap(), json!(3));
        assert_eq!(eval("7 % 4", &ctx).unwrap(), json!(3));
        assert_eq!(eval("1.5 + 1", &ctx).unwrap(), json!(2.5));
        assert_eq!(eval("'a' + 'b'", &ctx).unwrap(), json!("ab"));
        assert_eq!(eval("[1] + [2]", &ctx).unwrap(), json!([1, 2]));
        assert_eq!(eval("1 / 0", &ctx).unwrap_err(), EvalError::DivisionByZero);
        assert!(matches!(
            eval("9223372036854775807 + 1", &ctx).unwrap_err(),
            EvalError::Overflow { .. }
        ));
    }

    #[test]
    fn test_comparison_and_logic() {
        let ctx = ctx();
        assert_eq!(eval("app.status.readyReplicas < app.spec.replicas", &ctx).unwrap(), json!(true));
        assert_eq!(eval("1 == 1.0", &ctx).unwrap(), json!(true));
        assert_eq!(eval("'b' > 'a' && !false", &ctx).unwrap(), json!(true));
        assert_eq!(eval("443 in svc.status.ports", &ctx).unwrap(), json!(true));
        assert_eq!(eval("'clusterIP' in svc.status", &ctx).unwrap(), json!(true));
        assert!(matches!(eval("1 < 'a'", &ctx).unwrap_err(), EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        let ctx = ctx();
        assert_eq!(eval("false && missing.field", &ctx).unwrap(), json!(false));
        assert_eq!(eval("true || missing.field", &ctx).unwrap(), json!(true));
        assert_eq!(eval("true ? 1 : missing", &ctx).unwrap(), json!(1));
    }

    #[test]
    fn test_missing_key_and_unknown_variable() {
        let ctx = ctx();
        match eval("svc.status.podIP", &ctx).unwrap_err() {
            EvalError::NoSuchKey {
                key,
                available,
            } => {
                assert_eq!(key, "podIP");
                assert_eq!(available, vec!["clusterIP", "ports"]);
            }
            other => panic!("expected NoSuchKey, got {other:?}"),
        }
        assert_eq!(
            eval("nope.status", &ctx).unwrap_err(),
            EvalError::UnknownVariable {
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_has_macro() {
        let ctx = ctx();
        assert_eq!(eval("has(svc.status.clusterIP)", &ctx).unwrap(), json!(true));
        assert_eq!(eval("has(svc.status.podIP)", &ctx).unwrap(), json!(false));
        assert_eq!(eval("has(svc.spec.selector)", &ctx).unwrap(), json!(false));
        assert_eq!(eval("has(svc.status, 'ports')", &ctx).unwrap(), json!(true));
        assert_eq!(eval("has(svc.status.ports[5])", &ctx).unwrap(), json!(false));
    }

    #[test]
    fn test_macros() {
        let ctx = ctx();
        assert_eq!(eval("svc.status.ports.map(p, p + 1)", &ctx).unwrap(), json!([81, 444]));
        assert_eq!(eval("svc.status.ports.filter(p, p > 100)", &ctx).unwrap(), json!([443]));
        assert_eq!(eval("svc.status.ports.all(p, p > 0)", &ctx).unwrap(), json!(true));
        assert_eq!(eval("svc.status.ports.exists(p, p == 22)", &ctx).unwrap(), json!(false));
        assert!(matches!(
            eval("svc.status.ports.all(p, p)", &ctx).unwrap_err(),
            EvalError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_macro_variable_shadows_context() {
        let ctx = ctx();
        assert_eq!(eval("[1, 2].map(svc, svc * 10)", &ctx).unwrap(), json!([10, 20]));
    }

    #[test]
    fn test_collection_limit() {
        let big: Vec<i64> = (0..(MAX_COLLECTION_ITEMS as i64 + 1)).collect();
        let ctx = EvalContext::new().with_variable("big", json!({"items": big}));
        assert!(matches!(
            eval("big.items.exists(x, x < 0)", &ctx).unwrap_err(),
            EvalError::CollectionTooLarge { .. }
        ));
    }

    #[test]
    fn test_map_literal_and_index() {
        let ctx = ctx();
        assert_eq!(eval("{'a': 1, 'b': 2}['b']", &ctx).unwrap(), json!(2));
        assert_eq!(eval("svc.status.ports[1]", &ctx).unwrap(), json!(443));
        assert!(matches!(
            eval("svc.status.ports[2]", &ctx).unwrap_err(),
            EvalError::IndexOutOfBounds { index: 2, len: 2 }
        ));
    }
}
