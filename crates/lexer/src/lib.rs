//! Tokenizer for textual expressions.
//!
//! The tokenizer splits source text into identifiers, literals and operator symbols. Operators
//! are recognized by longest match over a [`SymbolTable`], so `>=` is never split into `>` and
//! `=` as long as `>=` is registered.

pub mod error;
pub mod symbols;
pub mod token;
pub mod tokenizer;

pub use crate::error::{LexError, ScanError};
pub use crate::symbols::SymbolTable;
pub use crate::token::{Token, TokenKind};
pub use crate::tokenizer::{Position, Tokenizer};
