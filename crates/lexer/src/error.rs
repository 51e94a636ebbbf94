//! Error types for tokenization.

use std::fmt;

use nom::error::{ErrorKind, ParseError};
use thiserror::Error;

/// Errors raised while splitting source text into tokens.
///
/// Every variant carries the byte offset in the source where the problem was found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedCharacter { found: char, offset: usize },
    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("invalid character literal at offset {offset}")]
    UnterminatedChar { offset: usize },
    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },
    #[error("expected '{expected}' at offset {offset}, found {found}")]
    MissingSymbol {
        expected: String,
        found: String,
        offset: usize,
    },
}

impl LexError {
    /// Byte offset of the error in the source text.
    pub fn offset(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { offset, .. }
            | LexError::UnterminatedString { offset }
            | LexError::UnterminatedChar { offset }
            | LexError::InvalidNumber { offset, .. }
            | LexError::MissingSymbol { offset, .. } => *offset,
        }
    }
}

/// Error type used by the nom recognizers inside the tokenizer.
///
/// This keeps a readable message next to the nom [`ErrorKind`] so the tokenizer can decide which
/// [`LexError`] to report once a recognizer fails.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanError<I> {
    /// The input position where the error occurred
    pub input: I,
    /// A description of what went wrong
    pub message: String,
    /// The kind of error (from nom)
    pub kind: ErrorKind,
}

impl<I> ScanError<I> {
    pub fn new(input: I, message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            input,
            message: message.into(),
            kind,
        }
    }

    /// Create a scan error from a nom ErrorKind with a default message.
    pub fn from_kind(input: I, kind: ErrorKind) -> Self {
        let message = match kind {
            ErrorKind::Digit => "expected a number".to_string(),
            ErrorKind::Alpha => "expected an identifier".to_string(),
            ErrorKind::Tag => "unexpected token".to_string(),
            ErrorKind::Char => "unexpected character".to_string(),
            ErrorKind::Eof => "unexpected end of input".to_string(),
            _ => format!("scan error: {:?}", kind),
        };

        Self {
            input,
            message,
            kind,
        }
    }
}

impl<I: fmt::Display> fmt::Display for ScanError<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at: {}", self.message, self.input)
    }
}

impl<I: fmt::Display + fmt::Debug> std::error::Error for ScanError<I> {}

impl<I> ParseError<I> for ScanError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        Self::from_kind(input, kind)
    }

    fn append(_input: I, _kind: ErrorKind, other: Self) -> Self {
        // The innermost error is the most specific one for single-token recognizers.
        other
    }
}
