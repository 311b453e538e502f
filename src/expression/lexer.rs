//! Lexer: tokenizes expression text.
//!
//! Produces the flat token stream the parser consumes. Positions are byte offsets
//! into the original expression so errors can point at the offending character.

use super::error::EvalError;

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// Byte offset of the token start
    pub pos: usize,
}

/// Token types
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Int(i64),
    Double(f64),
    Str(String),

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Colon,
    Question,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Int(value) => write!(f, "integer {value}"),
            Self::Double(value) => write!(f, "number {value}"),
            Self::Str(_) => write!(f, "string literal"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::LBrace => write!(f, "'{{'"),
            Self::RBrace => write!(f, "'}}'"),
            Self::Dot => write!(f, "'.'"),
            Self::Comma => write!(f, "','"),
            Self::Colon => write!(f, "':'"),
            Self::Question => write!(f, "'?'"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Star => write!(f, "'*'"),
            Self::Slash => write!(f, "'/'"),
            Self::Percent => write!(f, "'%'"),
            Self::Bang => write!(f, "'!'"),
            Self::EqEq => write!(f, "'=='"),
            Self::NotEq => write!(f, "'!='"),
            Self::Lt => write!(f, "'<'"),
            Self::Le => write!(f, "'<='"),
            Self::Gt => write!(f, "'>'"),
            Self::Ge => write!(f, "'>='"),
            Self::AndAnd => write!(f, "'&&'"),
            Self::OrOr => write!(f, "'||'"),
            Self::Eof => write!(f, "end of expression"),
        }
    }
}

/// Lexer for expression text
pub(crate) struct Lexer<'s> {
    input: &'s str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'s> Lexer<'s> {
    /// Create a new lexer from expression text
    pub fn new(input: &'s str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>, EvalError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&(offset, ch)) = self.chars.get(self.pos) else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos: self.input.len(),
                });
                break;
            };
            let kind = self.next_token(offset, ch)?;
            tokens.push(Token {
                kind,
                pos: offset,
            });
        }
        Ok(tokens)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_at(0) {
            if c.is_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self, offset: usize, ch: char) -> Result<TokenKind, EvalError> {
        let two = |lexer: &mut Self, kind: TokenKind| -> Result<TokenKind, EvalError> {
            lexer.pos += 2;
            Ok(kind)
        };
        let one = |lexer: &mut Self, kind: TokenKind| -> Result<TokenKind, EvalError> {
            lexer.pos += 1;
            Ok(kind)
        };

        match ch {
            '(' => one(self, TokenKind::LParen),
            ')' => one(self, TokenKind::RParen),
            '[' => one(self, TokenKind::LBracket),
            ']' => one(self, TokenKind::RBracket),
            '{' => one(self, TokenKind::LBrace),
            '}' => one(self, TokenKind::RBrace),
            ',' => one(self, TokenKind::Comma),
            ':' => one(self, TokenKind::Colon),
            '?' => one(self, TokenKind::Question),
            '+' => one(self, TokenKind::Plus),
            '-' => one(self, TokenKind::Minus),
            '*' => one(self, TokenKind::Star),
            '/' => one(self, TokenKind::Slash),
            '%' => one(self, TokenKind::Percent),
            '.' if !self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                one(self, TokenKind::Dot)
            }
            '=' if self.peek_at(1) == Some('=') => two(self, TokenKind::EqEq),
            '!' if self.peek_at(1) == Some('=') => two(self, TokenKind::NotEq),
            '!' => one(self, TokenKind::Bang),
            '<' if self.peek_at(1) == Some('=') => two(self, TokenKind::Le),
            '<' => one(self, TokenKind::Lt),
            '>' if self.peek_at(1) == Some('=') => two(self, TokenKind::Ge),
            '>' => one(self, TokenKind::Gt),
            '&' if self.peek_at(1) == Some('&') => two(self, TokenKind::AndAnd),
            '|' if self.peek_at(1) == Some('|') => two(self, TokenKind::OrOr),
            '"' | '\'' => self.read_string(offset, ch),
            '`' => self.read_quoted_identifier(offset),
            c if c.is_ascii_digit() || c == '.' => self.read_number(offset),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            other => Err(EvalError::Parse {
                position: offset,
                message: format!("unexpected character '{other}'"),
            }),
        }
    }

    fn read_identifier(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some(c) = self.peek_at(0) {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        TokenKind::Ident(name)
    }

    /// Backtick-quoted identifier, for resource ids such as `web-db` that are
    /// not plain identifiers. No escapes; the name may not contain a backtick.
    fn read_quoted_identifier(&mut self, offset: usize) -> Result<TokenKind, EvalError> {
        self.pos += 1;
        let mut name = String::new();
        loop {
            match self.peek_at(0) {
                Some('`') => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.pos += 1;
                }
                None => {
                    return Err(EvalError::Parse {
                        position: offset,
                        message: "unterminated quoted identifier".to_string(),
                    });
                }
            }
        }
        if name.is_empty() {
            return Err(EvalError::Parse {
                position: offset,
                message: "empty quoted identifier".to_string(),
            });
        }
        Ok(TokenKind::Ident(name))
    }

    fn read_number(&mut self, offset: usize) -> Result<TokenKind, EvalError> {
        let mut text = String::new();
        let mut is_double = false;
        while let Some(c) = self.peek_at(0) {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.' && !is_double && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
            {
                is_double = true;
                text.push(c);
            } else if (c == 'e' || c == 'E') && !text.is_empty() {
                is_double = true;
                text.push(c);
                if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                    text.push(sign);
                    self.pos += 1;
                }
            } else {
                break;
            }
            self.pos += 1;
        }

        let error = |message: String| EvalError::Parse {
            position: offset,
            message,
        };
        if is_double {
            text.parse::<f64>()
                .map(TokenKind::Double)
                .map_err(|e| error(format!("invalid number '{text}': {e}")))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|e| error(format!("invalid integer '{text}': {e}")))
        }
    }

    fn read_string(&mut self, offset: usize, quote: char) -> Result<TokenKind, EvalError> {
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(c) = self.peek_at(0) else {
                return Err(EvalError::Parse {
                    position: offset,
                    message: "unterminated string literal".to_string(),
                });
            };
            self.pos += 1;
            match c {
                c if c == quote => return Ok(TokenKind::Str(value)),
                '\\' => {
                    let escaped = self.peek_at(0).ok_or_else(|| EvalError::Parse {
                        position: offset,
                        message: "unterminated escape sequence".to_string(),
                    })?;
                    self.pos += 1;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' | '"' | '\'' => escaped,
                        other => {
                            return Err(EvalError::Parse {
                                position: offset,
                                message: format!("unknown escape sequence '\\{other}'"),
                            });
                        }
                    });
                }
                c => value.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_member_chain() {
        assert_eq!(
            kinds("svc.status.ingress[0]"),
            vec![
                TokenKind::Ident("svc".into()),
                TokenKind::Dot,
                TokenKind::Ident("status".into()),
                TokenKind::Dot,
                TokenKind::Ident("ingress".into()),
                TokenKind::LBracket,
                TokenKind::Int(0),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_operators_and_literals() {
        assert_eq!(
            kinds("a >= 1.5 && b != 'x\\'y' || !c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ge,
                TokenKind::Double(1.5),
                TokenKind::AndAnd,
                TokenKind::Ident("b".into()),
                TokenKind::NotEq,
                TokenKind::Str("x'y".into()),
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("concat(\"abc").tokenize().unwrap_err();
        assert!(matches!(err, EvalError::Parse { position: 7, .. }));
    }

    #[test]
    fn test_quoted_identifier() {
        assert_eq!(
            kinds("`web-db`.status"),
            vec![
                TokenKind::Ident("web-db".into()),
                TokenKind::Dot,
                TokenKind::Ident("status".into()),
                TokenKind::Eof,
            ]
        );
        assert!(Lexer::new("`web-db.status").tokenize().is_err());
        assert!(Lexer::new("``.status").tokenize().is_err());
    }

    #[test]
    fn test_unexpected_character() {
        assert!(Lexer::new("a # b").tokenize().is_err());
    }
}
