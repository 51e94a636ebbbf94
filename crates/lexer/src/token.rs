//! Token types produced by the tokenizer.

use std::fmt;

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Identifier or keyword such as `x`, `Math` or `new`.
    Identifier,
    /// Numeric literal including its optional suffix letter (`10L`, `2.5f`).
    Number,
    /// Double-quoted string literal. The token text holds the decoded content.
    String,
    /// Single-quoted character literal. The token text holds the decoded character.
    Char,
    /// Operator or punctuation symbol matched from the symbol table.
    Symbol,
}

/// A classified lexeme with its byte offset in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }

    /// Returns whether this token is the given symbol or keyword.
    ///
    /// String and char literals never match, so `"("` does not look like an open paren.
    pub fn is(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Symbol | TokenKind::Identifier) && self.text == text
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Number | TokenKind::String | TokenKind::Char
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::String => write!(f, "\"{}\"", self.text.escape_default()),
            TokenKind::Char => write!(f, "'{}'", self.text.escape_default()),
            _ => write!(f, "{}", self.text),
        }
    }
}
