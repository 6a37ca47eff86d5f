use std::fmt;

use crate::ast::{Token, TokenKind};

/// A 1-based line/column location in the path source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at {position}")]
    UnexpectedChar { ch: char, position: Position },

    #[error("unterminated string starting at {position}")]
    UnterminatedString { position: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnexpectedChar { position, .. } | LexError::UnterminatedString { position } => {
                *position
            }
        }
    }
}

const TWO_CHAR_OPERATORS: [&str; 6] = ["==", "!=", ">=", "<=", "&&", "||"];
const ONE_CHAR_OPERATORS: [char; 7] = ['+', '-', '*', '/', '=', '<', '>'];

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn location(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn slice_from(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn read_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Identifier characters, where a backslash takes the next character verbatim
    fn read_name(&mut self) -> Result<(), LexError> {
        while let Some(ch) = self.current_char() {
            match ch {
                '\\' => {
                    let escape_at = self.location();
                    self.advance();
                    if self.current_char().is_none() {
                        return Err(LexError::UnexpectedChar {
                            ch: '\\',
                            position: escape_at,
                        });
                    }
                    self.advance();
                }
                c if c.is_alphanumeric() || c == '_' => self.advance(),
                _ => break,
            }
        }
        Ok(())
    }

    fn read_string(&mut self, quote: char) -> Result<(), LexError> {
        let start = self.location();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(());
                }
                '\\' => {
                    self.advance();
                    if self.current_char().is_none() {
                        break;
                    }
                    self.advance();
                }
                _ => self.advance(),
            }
        }

        Err(LexError::UnterminatedString { position: start })
    }

    /// `\d+(\.\d+)?([eE][+-]?\d+)?`
    fn read_number(&mut self) {
        let digits = |lexer: &mut Lexer| {
            while lexer.current_char().is_some_and(|c| c.is_ascii_digit()) {
                lexer.advance();
            }
        };

        digits(self);

        if self.current_char() == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            digits(self);
        }

        if matches!(self.current_char(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_char(1), Some('+' | '-')));
            if self.peek_char(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..=sign {
                    self.advance();
                }
                digits(self);
            }
        }
    }

    fn read_operator(&mut self) -> bool {
        if let (Some(a), Some(b)) = (self.current_char(), self.peek_char(1)) {
            let pair: String = [a, b].iter().collect();
            if TWO_CHAR_OPERATORS.contains(&pair.as_str()) {
                self.advance();
                self.advance();
                return true;
            }
        }
        if self
            .current_char()
            .is_some_and(|c| ONE_CHAR_OPERATORS.contains(&c))
        {
            self.advance();
            return true;
        }
        false
    }

    /// Scan one token, including whitespace tokens.
    pub fn next_raw_token(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let position = self.location();

        let Some(ch) = self.current_char() else {
            return Ok(Token::new(TokenKind::End, "", position));
        };

        let kind = match ch {
            '$' => {
                self.advance();
                TokenKind::VarSign
            }
            '@' => {
                self.advance();
                TokenKind::ScriptSign
            }
            '.' => {
                self.advance();
                TokenKind::Dot
            }
            c if c.is_whitespace() => {
                self.read_whitespace();
                TokenKind::Whitespace
            }
            c if c.is_ascii_digit() => {
                self.read_number();
                TokenKind::Number
            }
            '"' | '\'' => {
                self.read_string(ch)?;
                TokenKind::String
            }
            c if c.is_alphabetic() || c == '_' || c == '\\' => {
                self.read_name()?;
                TokenKind::Name
            }
            '[' => {
                self.advance();
                TokenKind::LBracket
            }
            ']' => {
                self.advance();
                TokenKind::RBracket
            }
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            ':' => {
                self.advance();
                TokenKind::Colon
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            _ if self.read_operator() => TokenKind::Operator,
            _ => return Err(LexError::UnexpectedChar { ch, position }),
        };

        Ok(Token::new(kind, self.slice_from(start), position))
    }

    /// Next significant token; whitespace is dropped here.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            let token = self.next_raw_token()?;
            if !token.is(TokenKind::Whitespace) {
                return Ok(token);
            }
        }
    }

    /// Scan the whole input. The result always ends with an `End` token.
    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", skip(self), err))]
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.is(TokenKind::End);
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// Resolve backslash escapes in a name token
pub(crate) fn unescape_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Strip the quotes of a string token and resolve `\"`, `\'` and `\\`.
/// Any other escape sequence is kept as written.
pub(crate) fn unescape_string(raw: &str) -> String {
    let inner = raw
        .get(1..raw.len().saturating_sub(1))
        .unwrap_or_default();
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek().copied() {
                Some(next) if matches!(next, '"' | '\'' | '\\') => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}
