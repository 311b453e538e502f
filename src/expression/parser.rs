//! Recursive-descent parser for expressions.
//!
//! Precedence, lowest first: ternary, `||`, `&&`, relations (`== != < <= > >= in`),
//! additive, multiplicative, unary, postfix (member access, indexing, calls).

use serde_json::Value;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::error::EvalError;
use super::lexer::{Token, TokenKind};
use crate::constants::MAX_EXPRESSION_DEPTH;

/// Parser over a token stream
pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse(mut self) -> Result<Expr, EvalError> {
        let expr = self.parse_ternary()?;
        match self.peek() {
            TokenKind::Eof => Ok(expr),
            other => Err(self.error(format!("unexpected {other} after expression"))),
        }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens.get(self.pos).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.pos)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), EvalError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {kind}, found {}", self.peek())))
        }
    }

    fn error(&self, message: String) -> EvalError {
        EvalError::Parse {
            position: self.position(),
            message,
        }
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(self.error(format!(
                "expression nesting exceeds {MAX_EXPRESSION_DEPTH} levels"
            )));
        }
        Ok(())
    }

    /// Release `levels` taken by [`Self::enter`] in an operator or postfix loop.
    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn parse_ternary(&mut self) -> Result<Expr, EvalError> {
        self.enter()?;
        let condition = self.parse_or()?;
        let expr = if self.eat(&TokenKind::Question) {
            let then_branch = self.parse_ternary()?;
            self.expect(&TokenKind::Colon)?;
            let else_branch = self.parse_ternary()?;
            Expr::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            }
        } else {
            condition
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_and()?;
        let mut levels = 0;
        while self.eat(&TokenKind::OrOr) {
            self.enter()?;
            levels += 1;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.leave(levels);
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_relation()?;
        let mut levels = 0;
        while self.eat(&TokenKind::AndAnd) {
            self.enter()?;
            levels += 1;
            let right = self.parse_relation()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.leave(levels);
        Ok(left)
    }

    fn parse_relation(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_additive()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::Ident(name) if name == "in" => BinaryOp::In,
                _ => break,
            };
            self.advance();
            self.enter()?;
            levels += 1;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        self.leave(levels);
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_multiplicative()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.enter()?;
            levels += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        self.leave(levels);
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            self.enter()?;
            levels += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.leave(levels);
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary()?;
        self.depth -= 1;

        // Fold negative numeric literals so `-1` is a constant
        let expr = match (op, operand) {
            (UnaryOp::Neg, Expr::Literal(Value::Number(n))) if n.as_i64().is_some() => {
                Expr::Literal(Value::from(-n.as_i64().unwrap_or_default()))
            }
            (UnaryOp::Neg, Expr::Literal(Value::Number(n))) if n.is_f64() => {
                Expr::Literal(Value::from(-n.as_f64().unwrap_or_default()))
            }
            (op, operand) => Expr::Unary {
                op,
                operand: Box::new(operand),
            },
        };
        Ok(expr)
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_primary()?;
        let mut levels = 0;
        loop {
            if matches!(self.peek(), TokenKind::Dot | TokenKind::LBracket) {
                self.enter()?;
                levels += 1;
            }
            if self.eat(&TokenKind::Dot) {
                let name = match self.advance() {
                    TokenKind::Ident(name) => name,
                    other => {
                        self.pos -= 1;
                        return Err(self.error(format!("expected field name, found {other}")));
                    }
                };
                if self.eat(&TokenKind::LParen) {
                    let args = self.parse_arguments(&TokenKind::RParen)?;
                    expr = Expr::Method {
                        target: Box::new(expr),
                        method: name,
                        args,
                    };
                } else {
                    expr = Expr::Member {
                        target: Box::new(expr),
                        field: name,
                    };
                }
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_ternary()?;
                self.expect(&TokenKind::RBracket)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                self.leave(levels);
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let start = self.pos;
        match self.advance() {
            TokenKind::Int(value) => Ok(Expr::Literal(Value::from(value))),
            TokenKind::Double(value) => Ok(Expr::Literal(Value::from(value))),
            TokenKind::Str(value) => Ok(Expr::Literal(Value::String(value))),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "in" => {
                    self.pos = start;
                    Err(self.error("unexpected keyword 'in'".to_string()))
                }
                _ => {
                    if self.eat(&TokenKind::LParen) {
                        let args = self.parse_arguments(&TokenKind::RParen)?;
                        Ok(Expr::Call {
                            function: name,
                            args,
                        })
                    } else {
                        Ok(Expr::Ident(name))
                    }
                }
            },
            TokenKind::LParen => {
                let expr = self.parse_ternary()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => Ok(Expr::List(self.parse_arguments(&TokenKind::RBracket)?)),
            TokenKind::LBrace => self.parse_map(),
            other => {
                self.pos = start;
                Err(self.error(format!("unexpected {other}")))
            }
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_arguments(&mut self, close: &TokenKind) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(args);
            }
            args.push(self.parse_ternary()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close)?;
                return Ok(args);
            }
        }
    }

    fn parse_map(&mut self) -> Result<Expr, EvalError> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&TokenKind::RBrace) {
                return Ok(Expr::Map(entries));
            }
            let key = self.parse_ternary()?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_ternary()?;
            entries.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBrace)?;
                return Ok(Expr::Map(entries));
            }
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
