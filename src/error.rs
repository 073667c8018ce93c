//! Error types for the two failure kinds the engine can produce (spec §7):
//! a [`ParseError`] during lexing/parsing/declaration, or a [`RuntimeError`]
//! raised while a statement is actually executing. Both are fatal for the
//! current `parse`/`parse_interactive` entry but leave the interpreter state
//! consistent, so the host may keep issuing further calls.

use std::error::Error;
use std::fmt::{self, Display};

/// Where in the source an error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePos {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }
}

impl Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub pos: SourcePos,
    pub message: String,
}

impl ParseError {
    pub fn new(pos: SourcePos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: parse error: {}", self.pos, self.message)
    }
}

impl Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub pos: SourcePos,
    pub message: String,
}

impl RuntimeError {
    pub fn new(pos: SourcePos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: runtime error: {}", self.pos, self.message)
    }
}

impl Error for RuntimeError {}

/// Unifies the two failure kinds for the embedding API (spec §6/§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpError {
    Parse(ParseError),
    Runtime(RuntimeError),
    /// `exit(n)` was called; not really a failure, just an unwind to the
    /// host-registered checkpoint with a status code (spec §5, §7).
    Exit(i32),
}

impl From<ParseError> for InterpError {
    fn from(e: ParseError) -> Self {
        InterpError::Parse(e)
    }
}

impl From<RuntimeError> for InterpError {
    fn from(e: RuntimeError) -> Self {
        InterpError::Runtime(e)
    }
}

impl Display for InterpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpError::Parse(e) => write!(f, "{e}"),
            InterpError::Runtime(e) => write!(f, "{e}"),
            InterpError::Exit(code) => write!(f, "exit({code})"),
        }
    }
}

impl Error for InterpError {}

pub type ParseResult<T> = Result<T, ParseError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
pub type InterpResult<T> = Result<T, InterpError>;
