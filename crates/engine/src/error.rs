//! Error types for compiling, rewriting and evaluating expression trees.

use exprc_lexer::LexError;
use thiserror::Error;

/// A failure while turning text into a typed expression tree.
///
/// Parsing is all-or-nothing: the first error aborts the whole parse. Every variant records the
/// offending token text and its byte offset in the source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A type name could not be resolved, even after extending it with dotted segments.
    #[error("unknown type or identifier '{name}' at offset {offset}")]
    UnknownType { name: String, offset: usize },
    /// A token has no start or follow-up builder and is not a literal or identifier.
    #[error("unknown token '{token}' at offset {offset}")]
    UnknownToken { token: String, offset: usize },
    /// A closing marker without an opening one, or end of input inside an open bracket.
    #[error("mismatched bracket '{token}' at offset {offset}")]
    MismatchedBracket { token: String, offset: usize },
    /// Candidates exist for the name but none accepts the supplied arguments.
    #[error("no overload of '{name}' accepts ({arguments}) at offset {offset}")]
    NoApplicableOverload {
        name: String,
        arguments: String,
        offset: usize,
    },
    /// A parenthesized parameter list followed by `=>` could not be parsed.
    #[error("malformed lambda parameter list near '{token}' at offset {offset}")]
    MalformedLambda { token: String, offset: usize },
    #[error("unexpected token '{token}' at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },
    #[error("type '{type_name}' has no member '{name}' (offset {offset})")]
    UnknownMember {
        type_name: String,
        name: String,
        offset: usize,
    },
    #[error("{message} near '{token}' at offset {offset}")]
    TypeMismatch {
        message: String,
        token: String,
        offset: usize,
    },
    #[error("'{token}' is not assignable (offset {offset})")]
    InvalidAssignment { token: String, offset: usize },
    #[error("parameter '{name}' is declared twice (offset {offset})")]
    DuplicateParameter { name: String, offset: usize },
    #[error("invalid literal '{token}' at offset {offset}")]
    InvalidLiteral { token: String, offset: usize },
    #[error(transparent)]
    Lex(#[from] LexError),
}

impl CompileError {
    /// Byte offset of the offending token in the source text.
    pub fn offset(&self) -> usize {
        match self {
            CompileError::UnknownType { offset, .. }
            | CompileError::UnknownToken { offset, .. }
            | CompileError::MismatchedBracket { offset, .. }
            | CompileError::NoApplicableOverload { offset, .. }
            | CompileError::MalformedLambda { offset, .. }
            | CompileError::UnexpectedToken { offset, .. }
            | CompileError::UnexpectedEnd { offset }
            | CompileError::UnknownMember { offset, .. }
            | CompileError::TypeMismatch { offset, .. }
            | CompileError::InvalidAssignment { offset, .. }
            | CompileError::DuplicateParameter { offset, .. }
            | CompileError::InvalidLiteral { offset, .. } => *offset,
            CompileError::Lex(err) => err.offset(),
        }
    }

    /// Text of the offending token. Empty at end of input.
    pub fn token(&self) -> &str {
        match self {
            CompileError::UnknownType { name, .. }
            | CompileError::NoApplicableOverload { name, .. }
            | CompileError::UnknownMember { name, .. }
            | CompileError::DuplicateParameter { name, .. } => name,
            CompileError::UnknownToken { token, .. }
            | CompileError::MismatchedBracket { token, .. }
            | CompileError::MalformedLambda { token, .. }
            | CompileError::UnexpectedToken { token, .. }
            | CompileError::TypeMismatch { token, .. }
            | CompileError::InvalidAssignment { token, .. }
            | CompileError::InvalidLiteral { token, .. } => token,
            CompileError::UnexpectedEnd { .. } | CompileError::Lex(_) => "",
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>, token: &str, offset: usize) -> Self {
        CompileError::TypeMismatch {
            message: message.into(),
            token: token.to_string(),
            offset,
        }
    }
}

/// A failure while rewriting a tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// No rule matched and the transformer does not override its fallback.
    #[error("no rewrite rule for {shape} node '{node}'")]
    NoRewriteRule { shape: &'static str, node: String },
    /// A rule needs a method the type universe does not provide.
    #[error("type '{type_name}' has no method '{name}' required by the rewrite")]
    UnknownMethod { type_name: String, name: String },
    /// A rewritten node did not type-check.
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// A failure while evaluating a tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("object reference is null")]
    NullReference,
    #[error("attempted to divide by zero")]
    DivideByZero,
    #[error("arithmetic operation overflowed")]
    Overflow,
    #[error("cannot convert {from} to {to}")]
    InvalidCast { from: String, to: String },
    #[error("parameter '{0}' has no value")]
    UnboundParameter(String),
    #[error("expected {expected} arguments, got {found}")]
    ArgumentCount { expected: usize, found: usize },
    #[error("operation '{op}' is not defined for {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("{0}")]
    Native(String),
}
