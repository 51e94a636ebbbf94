//! Builder strategies the parser dispatches tokens to.
//!
//! A [`StartBuilder`] handles the token that opens an operand: a literal, an identifier, a
//! prefix operator or a bracket. A [`FollowBuilder`] handles an operator token that follows a
//! complete left operand. Both are registered by token text in [`ParserOptions`], so adding an
//! operator means registering one more builder.
//!
//! [`ParserOptions`]: crate::options::ParserOptions

use std::fmt;

use exprc_lexer::Token;

use crate::error::CompileError;
use crate::options::OperatorDef;
use crate::parser::{ExprParser, Operand};

pub mod follow;
pub(crate) mod nodes;
pub mod start;

pub trait StartBuilder: fmt::Debug + Send + Sync {
    /// Build an operand from `token`, which has already been consumed.
    fn build(&self, parser: &mut ExprParser<'_>, token: &Token) -> Result<Operand, CompileError>;
}

pub trait FollowBuilder: fmt::Debug + Send + Sync {
    /// Combine `left` with the operator `token`, which has already been consumed, reading any
    /// right operand from `parser`.
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        op: &OperatorDef,
    ) -> Result<Operand, CompileError>;
}
