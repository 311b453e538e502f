//! Expression syntax tree and static analysis over it.

use serde_json::Value;

use crate::constants::{SCHEMA_RESOURCE_ID, SCHEMA_VARIABLE};
use crate::references::{FieldPath, PathSegment, SymbolicReference};

/// Receiver-style macros that bind an iteration variable.
pub(crate) const MACROS: &[&str] = &["map", "filter", "all", "exists"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

/// Expression node
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    Member {
        target: Box<Expr>,
        field: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    Method {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
}

impl Expr {
    /// The iteration variable when this node is a macro invocation.
    pub fn macro_variable(&self) -> Option<&str> {
        match self {
            Expr::Method {
                method,
                args,
                ..
            } if MACROS.contains(&method.as_str()) && args.len() == 2 => match &args[0] {
                Expr::Ident(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Decompose a static member chain such as `svc.status.ingress[0].ip`.
///
/// Returns the root identifier and the path below it. Index segments count as
/// static only when they are integer literals or string literals that form a
/// valid path key.
fn member_chain(expr: &Expr) -> Option<(&str, Vec<PathSegment>)> {
    match expr {
        Expr::Ident(name) => Some((name, Vec::new())),
        Expr::Member {
            target,
            field,
        } => {
            let (root, mut segments) = member_chain(target)?;
            segments.push(PathSegment::Key(field.clone()));
            Some((root, segments))
        }
        Expr::Index {
            target,
            index,
        } => {
            let segment = match index.as_ref() {
                Expr::Literal(Value::Number(n)) => PathSegment::Index(usize::try_from(n.as_u64()?).ok()?),
                Expr::Literal(Value::String(key))
                    if !key.is_empty() && !key.contains(['.', '[', ']']) =>
                {
                    PathSegment::Key(key.clone())
                }
                _ => return None,
            };
            let (root, mut segments) = member_chain(target)?;
            segments.push(segment);
            Some((root, segments))
        }
        _ => None,
    }
}

/// Free variables and references found by [`collect`].
#[derive(Debug, Default)]
pub(crate) struct Symbols {
    pub variables: Vec<String>,
    pub references: Vec<SymbolicReference>,
}

impl Symbols {
    fn add_variable(&mut self, name: &str) {
        if !self.variables.iter().any(|v| v == name) {
            self.variables.push(name.to_string());
        }
    }

    fn add_reference(&mut self, root: &str, segments: Vec<PathSegment>) {
        let resource_id = if root == SCHEMA_VARIABLE {
            SCHEMA_RESOURCE_ID
        } else {
            root
        };
        let reference =
            SymbolicReference::new(resource_id, FieldPath::from_segments(segments).to_string());
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
    }
}

/// Collect free variables and maximal static member chains rooted at them.
///
/// Variables bound by `map`/`filter`/`all`/`exists` are excluded inside the
/// macro body. `true`, `false` and `null` never reach this point as identifiers.
pub(crate) fn collect(expr: &Expr) -> Symbols {
    let mut symbols = Symbols::default();
    let mut bound = Vec::new();
    visit(expr, &mut bound, &mut symbols);
    symbols
}

fn visit(expr: &Expr, bound: &mut Vec<String>, symbols: &mut Symbols) {
    if let Some((root, segments)) = member_chain(expr) {
        if !bound.iter().any(|b| b == root) {
            symbols.add_variable(root);
            symbols.add_reference(root, segments);
        }
        return;
    }

    match expr {
        Expr::Literal(_) | Expr::Ident(_) => {}
        Expr::Member {
            target,
            ..
        } => visit(target, bound, symbols),
        Expr::Index {
            target,
            index,
        } => {
            visit(target, bound, symbols);
            visit(index, bound, symbols);
        }
        Expr::Call {
            args,
            ..
        } => {
            for arg in args {
                visit(arg, bound, symbols);
            }
        }
        Expr::Method {
            target,
            args,
            ..
        } => {
            visit(target, bound, symbols);
            if let Some(variable) = expr.macro_variable() {
                bound.push(variable.to_string());
                visit(&args[1], bound, symbols);
                bound.pop();
            } else {
                for arg in args {
                    visit(arg, bound, symbols);
                }
            }
        }
        Expr::Unary {
            operand,
            ..
        } => visit(operand, bound, symbols),
        Expr::Binary {
            left,
            right,
            ..
        } => {
            visit(left, bound, symbols);
            visit(right, bound, symbols);
        }
        Expr::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            visit(condition, bound, symbols);
            visit(then_branch, bound, symbols);
            visit(else_branch, bound, symbols);
        }
        Expr::List(items) => {
            for item in items {
                visit(item, bound, symbols);
            }
        }
        Expr::Map(entries) => {
            for (key, value) in entries {
                visit(key, bound, symbols);
                visit(value, bound, symbols);
            }
        }
    }
}

/// Every global function name and receiver method name used in the tree.
pub(crate) fn called_functions(expr: &Expr, out: &mut Vec<(String, bool)>) {
    match expr {
        Expr::Literal(_) | Expr::Ident(_) => {}
        Expr::Member {
            target,
            ..
        } => called_functions(target, out),
        Expr::Index {
            target,
            index,
        } => {
            called_functions(target, out);
            called_functions(index, out);
        }
        Expr::Call {
            function,
            args,
        } => {
            out.push((function.clone(), false));
            args.iter().for_each(|arg| called_functions(arg, out));
        }
        Expr::Method {
            target,
            method,
            args,
        } => {
            if expr.macro_variable().is_none() {
                out.push((method.clone(), true));
            }
            called_functions(target, out);
            args.iter().for_each(|arg| called_functions(arg, out));
        }
        Expr::Unary {
            operand,
            ..
        } => called_functions(operand, out),
        Expr::Binary {
            left,
            right,
            ..
        } => {
            called_functions(left, out);
            called_functions(right, out);
        }
        Expr::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            called_functions(condition, out);
            called_functions(then_branch, out);
            called_functions(else_branch, out);
        }
        Expr::List(items) => items.iter().for_each(|item| called_functions(item, out)),
        Expr::Map(entries) => {
            for (key, value) in entries {
                called_functions(key, out);
                called_functions(value, out);
            }
        }
    }
}
