// ABOUTME: Error types for the lexing, parsing, and evaluation phases

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("lone '&': expected '&&'")]
    LoneAmpersand,
    #[error("lone '|': expected '||'")]
    LonePipe,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} (line {line})")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (line {line})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("'{name}' is already defined in this scope")]
    AlreadyDefined { name: String },
    #[error("{context}: expected a number")]
    ExpectedNumber { context: &'static str },
    #[error("{context}: expected an array")]
    ExpectedArray { context: &'static str },
    #[error("array index must be a non-negative integer")]
    InvalidIndex,
    #[error("array index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    #[error("modulo operands must be integer-valued")]
    ModuloRequiresIntegers,
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("value is not callable")]
    NotCallable,
    #[error("expected {expected} argument(s), got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("return used outside of a function")]
    ReturnOutsideFunction,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: Option<usize>,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {})", self.kind, line),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind) -> Self {
        RuntimeError { kind, line: None }
    }

    pub fn at(kind: RuntimeErrorKind, line: usize) -> Self {
        RuntimeError {
            kind,
            line: Some(line),
        }
    }
}

/// Aggregate error surfaced to the CLI driver, carrying the phase that
/// failed so it can print the `<Phase> Error: ...` line spec.md §6 requires.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpretError {
    #[error("Lexing Error: {0}")]
    Lex(#[from] LexError),
    #[error("Parsing Error: {0}")]
    Parse(#[from] ParseError),
    #[error("Runtime Error: {0}")]
    Runtime(#[from] RuntimeError),
}
