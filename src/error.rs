use crate::{
    evaluator::EvalError,
    lexer::LexError,
    parser::ParseError,
    script::ScriptError,
    slice::SliceError,
};

/// Any failure a query can produce.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The path contains a character that cannot be scanned
    #[error(transparent)]
    Lex(LexError),

    /// The path does not follow the grammar
    #[error(transparent)]
    Syntax(ParseError),

    /// A well-formed path did not fit the document
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    /// Whether `suppress_errors` may turn this error into an empty result.
    ///
    /// Malformed paths and broken script registrations always surface.
    pub fn is_suppressible(&self) -> bool {
        match self {
            Error::Lex(_) | Error::Syntax(_) => false,
            Error::Eval(EvalError::Script(
                ScriptError::Unresolved { .. } | ScriptError::InvalidRegistration { .. },
            )) => false,
            Error::Eval(_) => true,
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Lex(lex) => Error::Lex(lex),
            other => Error::Syntax(other),
        }
    }
}

impl From<LexError> for Error {
    fn from(err: LexError) -> Self {
        Error::Lex(err)
    }
}

impl From<SliceError> for Error {
    fn from(err: SliceError) -> Self {
        Error::Eval(EvalError::Slice(err))
    }
}

impl From<ScriptError> for Error {
    fn from(err: ScriptError) -> Self {
        Error::Eval(EvalError::Script(err))
    }
}
