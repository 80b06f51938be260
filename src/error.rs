//! Error types shared across the lexer, parser and interpreter.
//!
//! Every error carries the 1-indexed source line on which it originated,
//! matching the teacher-style `AsmError { kind, message, span }` shape but
//! split into one enum per pipeline stage, since a lex error can never be
//! confused with a runtime error by the type system.

use thiserror::Error;

/// Failure while tokenizing a single source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lex error at line {line}: {message}")]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

impl LexError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

/// Failure while assembling tokens into the `Program` AST.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

/// Failure while executing a loaded `Program`.
///
/// Runtime errors never propagate as `Result` out of the interpreter's
/// public `step`/`run` API — per the spec, a runtime error transitions the
/// worker to `Halted` and is *surfaced* via [`crate::interpreter::Interpreter::last_error`]
/// so that sibling workers are unaffected by one worker's failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("runtime error at line {line}: {message}")]
pub struct RuntimeError {
    pub line: usize,
    pub message: String,
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self { kind, line, message: message.into() }
    }
}

/// Failure compiling a full source text, wrapping whichever pipeline stage
/// caught it. `parser::parse_program` returns this so callers don't need to
/// match on two separate error types for one `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    DivisionByZero,
    ForStepZero,
    ReturnWithEmptyCallStack,
    UndefinedLabel,
    ArrayInitWithStackIndex,
    CasOnStackIndex,
    StringWhereNumberRequired,
}
