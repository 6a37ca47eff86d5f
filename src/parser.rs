use indexmap::IndexMap;

use crate::{
    ast::{BinOp, Expr, ExprKind, Token, TokenKind},
    lexer::{LexError, Lexer, Position, unescape_name, unescape_string},
};

/// Default limit for nested brackets, parentheses, call arguments and
/// operator/access chains.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Errors raised while turning a path string into an AST.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("lexical error: {0}")]
    Lex(#[from] LexError),

    #[error("syntax error at {position}: expected {}, found {found}", .expected.join(" or "))]
    UnexpectedToken {
        found: String,
        expected: Vec<&'static str>,
        position: Position,
    },

    #[error("syntax error at {position}: unexpected {found} after complete expression")]
    TrailingInput { found: String, position: Position },

    #[error("syntax error at {position}: invalid number literal '{text}'")]
    InvalidNumber { text: String, position: Position },

    #[error("syntax error at {position}: nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize, position: Position },

    #[error("syntax error at {position}: positional argument follows keyword argument")]
    PositionalAfterKeyword { position: Position },

    #[error("syntax error at {position}: keyword argument '{name}' given twice")]
    DuplicateKeyword { name: String, position: Position },

    #[error("invalid expression: '{text}'")]
    InvalidExpression { text: String },

    #[error("unclosed bracket at offset {offset} in '{path}'")]
    UnclosedBracket { path: String, offset: usize },

    #[error("empty path")]
    EmptyPath,
}

impl ParseError {
    fn unexpected(token: &Token, expected: &[&'static str]) -> Self {
        ParseError::UnexpectedToken {
            found: token.describe(),
            expected: expected.to_vec(),
            position: token.position,
        }
    }
}

/// Recursive-descent parser over a fully scanned token stream.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    /// Scan the lexer's input and prepare to parse it.
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        Ok(Self::from_tokens(lexer.tokenize()?))
    }

    /// Build a parser from already scanned tokens. Whitespace tokens are
    /// dropped and a missing `End` token is supplied.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| !t.is(TokenKind::Whitespace))
            .collect();
        if !tokens.last().is_some_and(|t| t.is(TokenKind::End)) {
            let position = tokens.last().map(|t| t.position).unwrap_or_default();
            tokens.push(Token::new(TokenKind::End, "", position));
        }
        Parser {
            tokens,
            position: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn current_token(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek_token(&self, offset: usize) -> &Token {
        &self.tokens[(self.position + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current_token().is(kind)
    }

    fn check_operator(&self, symbol: &str) -> bool {
        self.current_token().is_operator(symbol)
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected(self.current_token(), &[expected]))
        }
    }

    fn too_deep(&self) -> ParseError {
        ParseError::NestingTooDeep {
            limit: self.max_depth,
            position: self.current_token().position,
        }
    }

    fn follows_open_group(&self) -> bool {
        self.position
            .checked_sub(1)
            .and_then(|prev| self.tokens.get(prev))
            .is_some_and(|prev| {
                matches!(
                    prev.kind,
                    TokenKind::LParen | TokenKind::LBracket | TokenKind::Comma
                ) || prev.is_operator("=")
            })
    }

    /// Run `f` one nesting level deeper.
    fn descend<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= self.max_depth {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Left-deep chains count against the same budget as nesting, since the
    /// evaluator recurses through them.
    fn check_chain(&self, chain: usize) -> Result<(), ParseError> {
        if self.depth + chain > self.max_depth {
            return Err(self.too_deep());
        }
        Ok(())
    }

    /// Parse a complete path. Anything left over besides `End` is an error.
    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip(self), err))]
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenKind::End) {
            return Err(ParseError::EmptyPath);
        }
        let expr = self.parse_expression()?;
        if !self.check(TokenKind::End) {
            let token = self.current_token();
            return Err(ParseError::TrailingInput {
                found: token.describe(),
                position: token.position,
            });
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_logical()
    }

    fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        let position = left.position;
        Expr::new(
            ExprKind::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            position,
        )
    }

    /// `&&` and `||` share one tier
    fn parse_logical(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        let mut chain = 0;

        loop {
            let op = match self.current_token() {
                t if t.is_operator("&&") => BinOp::And,
                t if t.is_operator("||") => BinOp::Or,
                _ => break,
            };
            self.advance();
            chain += 1;
            self.check_chain(chain)?;
            let right = self.parse_comparison()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        let mut chain = 0;

        loop {
            let op = match self.current_token() {
                t if t.is(TokenKind::Operator) => match BinOp::from_symbol(&t.text) {
                    Some(op) if op.is_comparison() => op,
                    _ => break,
                },
                _ => break,
            };
            self.advance();
            chain += 1;
            self.check_chain(chain)?;
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        let mut chain = 0;

        loop {
            let op = match self.current_token() {
                t if t.is_operator("+") => BinOp::Add,
                t if t.is_operator("-") => BinOp::Subtract,
                _ => break,
            };
            self.advance();
            chain += 1;
            self.check_chain(chain)?;
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_access()?;
        let mut chain = 0;

        loop {
            let op = match self.current_token() {
                t if t.is_operator("*") => BinOp::Multiply,
                t if t.is_operator("/") => BinOp::Divide,
                _ => break,
            };
            self.advance();
            chain += 1;
            self.check_chain(chain)?;
            let right = self.parse_access()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    /// A primary followed by any number of `.key` and `[...]` accesses
    fn parse_access(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        let mut chain = 0;

        loop {
            if self.check(TokenKind::Dot) {
                let dot = self.advance();
                // `.[` is the same as `[`
                if self.check(TokenKind::LBracket) {
                    continue;
                }
                expr = self.parse_access_key(expr, dot.position)?;
            } else if self.check(TokenKind::LBracket) {
                expr = self.parse_bracket(expr)?;
            } else {
                break;
            }
            chain += 1;
            self.check_chain(chain)?;
        }
        Ok(expr)
    }

    fn parse_access_key(&mut self, object: Expr, position: Position) -> Result<Expr, ParseError> {
        let token = self.current_token();
        let (key, wildcard) = match token.kind {
            TokenKind::Name => (unescape_name(&token.text), false),
            TokenKind::String => (unescape_string(&token.text), false),
            TokenKind::Operator if token.text == "*" => ("*".to_string(), true),
            _ => {
                return Err(ParseError::unexpected(
                    token,
                    &["name", "string", "'*'", "'['"],
                ));
            }
        };
        self.advance();

        Ok(Expr::new(
            ExprKind::Key {
                object: Box::new(object),
                key,
                wildcard,
            },
            position,
        ))
    }

    /// Bracket contents: `[*]`, `["key"]`, `[start:end:step]`, or any expression
    fn parse_bracket(&mut self, object: Expr) -> Result<Expr, ParseError> {
        let open = self.expect(TokenKind::LBracket, "'['")?;

        self.descend(|p| {
            let index_of = |object: Expr, index: Expr| {
                Expr::new(
                    ExprKind::Index {
                        object: Box::new(object),
                        index: Box::new(index),
                    },
                    open.position,
                )
            };

            if p.check_operator("*") {
                let star = p.advance();
                p.expect(TokenKind::RBracket, "']'")?;
                return Ok(index_of(object, Expr::new(ExprKind::Wildcard, star.position)));
            }

            // Quoted key fast path
            if p.check(TokenKind::String) && p.peek_token(1).is(TokenKind::RBracket) {
                let token = p.advance();
                p.advance();
                let key = Expr::new(ExprKind::String(unescape_string(&token.text)), token.position);
                return Ok(index_of(object, key));
            }

            if p.check(TokenKind::Colon) {
                return p.parse_slice(object, None, open.position);
            }

            let first = p.parse_expression()?;
            if p.check(TokenKind::Colon) {
                return p.parse_slice(object, Some(first), open.position);
            }

            p.expect(TokenKind::RBracket, "']'")?;
            Ok(index_of(object, first))
        })
    }

    /// Remainder of a slice, from the first `:` through `]`
    fn parse_slice(
        &mut self,
        object: Expr,
        start: Option<Expr>,
        position: Position,
    ) -> Result<Expr, ParseError> {
        self.expect(TokenKind::Colon, "':'")?;

        let end = if self.check(TokenKind::Colon) || self.check(TokenKind::RBracket) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        let step = if self.check(TokenKind::Colon) {
            self.advance();
            if self.check(TokenKind::RBracket) {
                None
            } else {
                Some(self.parse_expression()?)
            }
        } else {
            None
        };

        self.expect(TokenKind::RBracket, "']'")?;

        Ok(Expr::new(
            ExprKind::Slice {
                object: Box::new(object),
                start: start.map(Box::new),
                end: end.map(Box::new),
                step: step.map(Box::new),
            },
            position,
        ))
    }

    fn parse_number(token: &Token, negative: bool) -> Result<ExprKind, ParseError> {
        let text = if negative {
            format!("-{}", token.text)
        } else {
            token.text.clone()
        };
        let invalid = || ParseError::InvalidNumber {
            text: text.clone(),
            position: token.position,
        };

        if text.contains(['.', 'e', 'E']) {
            text.parse::<f64>().map(ExprKind::Float).map_err(|_| invalid())
        } else {
            text.parse::<i64>().map(ExprKind::Integer).map_err(|_| invalid())
        }
    }

    /// Atoms: names, literals, `$var`, `@script(...)`, `(expr)`, and the
    /// root markers `$`, `*` and a leading `.`
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let at_start = self.position == 0;
        let token = self.current_token().clone();
        let position = token.position;

        let kind = match token.kind {
            TokenKind::Name => {
                self.advance();
                match token.text.as_str() {
                    "true" => ExprKind::Boolean(true),
                    "false" => ExprKind::Boolean(false),
                    "null" => ExprKind::Null,
                    raw => ExprKind::Name(unescape_name(raw)),
                }
            }
            TokenKind::Number => {
                self.advance();
                Self::parse_number(&token, false)?
            }
            TokenKind::String => {
                self.advance();
                ExprKind::String(unescape_string(&token.text))
            }
            TokenKind::VarSign => {
                self.advance();
                if self.check(TokenKind::Name) {
                    let name = self.advance();
                    ExprKind::VarRef(unescape_name(&name.text))
                } else {
                    ExprKind::Root
                }
            }
            TokenKind::ScriptSign => return self.parse_script_call(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.descend(|p| p.parse_expression())?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            // Leading `.`: implicit root wildcard, the dot is consumed by parse_access
            TokenKind::Dot if at_start => ExprKind::RootWildcard,
            // `*` opens an operand only at the start of a (sub)expression
            TokenKind::Operator if token.text == "*" && (at_start || self.follows_open_group()) => {
                self.advance();
                ExprKind::RootWildcard
            }
            TokenKind::Operator if token.text == "-" && self.peek_token(1).is(TokenKind::Number) => {
                self.advance();
                let number = self.advance();
                Self::parse_number(&number, true)?
            }
            _ => return Err(ParseError::unexpected(&token, &["expression"])),
        };

        Ok(Expr::new(kind, position))
    }

    /// `@[module.]name` with an optional `(args)` list
    fn parse_script_call(&mut self) -> Result<Expr, ParseError> {
        let at = self.expect(TokenKind::ScriptSign, "'@'")?;

        let mut path = vec![unescape_name(&self.expect(TokenKind::Name, "script name")?.text)];
        while self.check(TokenKind::Dot) && self.peek_token(1).is(TokenKind::Name) {
            self.advance();
            path.push(unescape_name(&self.advance().text));
        }
        let name = path.pop().unwrap_or_default();

        let (args, kwargs) = if self.check(TokenKind::LParen) {
            self.descend(|p| p.parse_call_args())?
        } else {
            (Vec::new(), IndexMap::new())
        };

        Ok(Expr::new(
            ExprKind::ScriptCall {
                module_path: path,
                name,
                args,
                kwargs,
            },
            at.position,
        ))
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, IndexMap<String, Expr>), ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        let mut kwargs = IndexMap::new();

        while !self.check(TokenKind::RParen) {
            if self.check(TokenKind::Name) && self.peek_token(1).is_operator("=") {
                let key = self.advance();
                self.advance();
                let name = unescape_name(&key.text);
                let value = self.parse_expression()?;
                if kwargs.contains_key(&name) {
                    return Err(ParseError::DuplicateKeyword {
                        name,
                        position: key.position,
                    });
                }
                kwargs.insert(name, value);
            } else {
                if !kwargs.is_empty() {
                    return Err(ParseError::PositionalAfterKeyword {
                        position: self.current_token().position,
                    });
                }
                args.push(self.parse_expression()?);
            }

            if !self.check(TokenKind::RParen) {
                self.expect(TokenKind::Comma, "','")?;
            }
        }

        self.expect(TokenKind::RParen, "')'")?;
        Ok((args, kwargs))
    }
}

/// Tokenize and parse `path` with the default depth limit.
pub fn parse_path(path: &str) -> Result<Expr, ParseError> {
    Parser::new(Lexer::new(path))?.parse()
}
