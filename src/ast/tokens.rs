use std::fmt;

use crate::lexer::Position;

/// The lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Variable sigil
    ///
    /// # Examples
    /// ```text
    /// $threshold
    /// $.root
    /// ```
    VarSign,

    /// Script sigil, introduces a script call
    ///
    /// # Examples
    /// ```text
    /// @now()
    /// @math.clamp(1, max=10)
    /// ```
    ScriptSign,

    /// Member access separator
    Dot,

    /// Run of whitespace. Produced by the scanner, never handed to the parser.
    Whitespace,

    /// Comparison, logical, arithmetic or keyword-assignment operator
    ///
    /// One of `== != >= <= > < && || + - * / =`.
    Operator,

    /// Identifier
    ///
    /// Starts with a letter or underscore, followed by letters, digits or
    /// underscores. A backslash escapes the next character, so `key\.01`
    /// is a single name.
    ///
    /// # Examples
    /// ```text
    /// root
    /// item_count
    /// _internal
    /// ```
    Name,

    /// Integer or float literal, with an optional exponent
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 3.14
    /// 1e-3
    /// ```
    Number,

    /// Single- or double-quoted string; `text` keeps the quotes and escapes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'key.01'
    /// ```
    String,

    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,

    /// End of input
    End,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::VarSign => "'$'",
            TokenKind::ScriptSign => "'@'",
            TokenKind::Dot => "'.'",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Operator => "operator",
            TokenKind::Name => "name",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::End => "end of input",
        };
        f.write_str(name)
    }
}

/// An immutable lexical unit: kind, raw source text and starting position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// True if this is an operator token spelled exactly `symbol`
    pub fn is_operator(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == symbol
    }

    /// Short description for diagnostics
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::End => "end of input".to_string(),
            _ => format!("'{}'", self.text),
        }
    }
}
