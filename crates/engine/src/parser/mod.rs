//! Operator-precedence parser that builds typed trees through pluggable builders.
//!
//! The parser itself only knows how to read an operand, how to climb the operator table and how
//! to read type names, bracketed lists and lambda heads. Everything that gives a token its
//! meaning lives in a builder registered in [`ParserOptions`].

mod context;

use std::rc::Rc;

use exprc_lexer::{Position, Token, TokenKind, Tokenizer};

pub use context::ParserContext;

use crate::ast::{Expr, ExprRef, Parameter};
use crate::compiler::Compiler;
use crate::error::CompileError;
use crate::options::ParserOptions;
use crate::resolver::Resolver;
use crate::types::{NumericRanks, Type};

/// What an operand parse produced: a value, or a type name waiting for `.member` or a cast.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Expr(ExprRef),
    Type(Type),
}

/// Tokenizer position plus bracket depth, restored together when a speculative read fails.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    position: Position,
    brackets: usize,
}

/// A single parse over one source text.
pub struct ExprParser<'c> {
    compiler: &'c Compiler,
    tokens: Tokenizer,
    context: ParserContext,
}

/// An untyped or typed lambda parameter as written.
struct ParamHead {
    name: String,
    ty: Option<Type>,
    offset: usize,
}

impl<'c> ExprParser<'c> {
    pub fn new(compiler: &'c Compiler, text: &str) -> Result<Self, CompileError> {
        let tokens = Tokenizer::new(text, &compiler.options().symbol_table())?;
        Ok(Self {
            compiler,
            tokens,
            context: ParserContext::new(),
        })
    }

    pub fn compiler(&self) -> &'c Compiler {
        self.compiler
    }

    pub fn options(&self) -> &'c ParserOptions {
        self.compiler.options()
    }

    pub fn ranks(&self) -> &'c NumericRanks {
        &self.compiler.options().ranks
    }

    pub fn resolver(&self) -> Resolver<'c> {
        self.compiler.resolver()
    }

    pub fn context(&self) -> &ParserContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ParserContext {
        &mut self.context
    }

    /// Parse the whole input as one expression.
    pub fn parse_to_end(&mut self) -> Result<ExprRef, CompileError> {
        let operand = self.read_expression(0)?;
        if let Some(token) = self.tokens.peek_token() {
            return Err(if token.is(")") || token.is("]") {
                CompileError::MismatchedBracket {
                    token: token.text.clone(),
                    offset: token.offset,
                }
            } else {
                CompileError::UnexpectedToken {
                    token: token.text.clone(),
                    offset: token.offset,
                }
            });
        }
        self.operand_value(operand, 0)
    }

    /// Read an operand, then fold in every operator that binds tighter than `floor`.
    pub fn read_expression(&mut self, floor: u8) -> Result<Operand, CompileError> {
        let mut left = self.read_primary()?;
        loop {
            let Some(next) = self.tokens.peek_token() else {
                break;
            };
            if !matches!(next.kind, TokenKind::Symbol | TokenKind::Identifier) {
                break;
            }
            let Some(op) = self.options().operators.get(&next.text) else {
                break;
            };
            if op.priority <= floor {
                break;
            }
            let Some(token) = self.tokens.read_token() else {
                break;
            };
            log::trace!("operator {} at {} (floor {floor})", token.text, token.offset);
            left = op.builder.build(self, left, &token, op)?;
        }
        Ok(left)
    }

    /// Like [`ExprParser::read_expression`], but a type name is an error.
    pub fn read_value(&mut self, floor: u8) -> Result<ExprRef, CompileError> {
        let offset = self.tokens.offset();
        let operand = self.read_expression(floor)?;
        self.operand_value(operand, offset)
    }

    /// Unwrap an operand that must be a value.
    pub fn operand_value(&self, operand: Operand, offset: usize) -> Result<ExprRef, CompileError> {
        match operand {
            Operand::Expr(expr) => Ok(expr),
            Operand::Type(ty) => Err(CompileError::type_mismatch(
                format!("type '{ty}' is used as a value"),
                &ty.to_string(),
                offset,
            )),
        }
    }

    fn read_primary(&mut self) -> Result<Operand, CompileError> {
        if let Some(lambda) = self.try_read_lambda()? {
            return Ok(Operand::Expr(lambda));
        }
        let token = self.read_token_or_end()?;
        let options = self.options();
        let builder = match token.kind {
            TokenKind::Number => &options.number_builder,
            TokenKind::String | TokenKind::Char => &options.literal_builder,
            TokenKind::Symbol | TokenKind::Identifier => {
                match options.start_builders.get(&token.text) {
                    Some(builder) => builder,
                    None if token.is_identifier() => &options.identifier_builder,
                    None => {
                        return Err(CompileError::UnknownToken {
                            token: token.text,
                            offset: token.offset,
                        });
                    }
                }
            }
        };
        builder.build(self, &token)
    }

    /// The next token, or the error for running out of input.
    ///
    /// Running out inside an open bracket reports the bracket.
    pub fn read_token_or_end(&mut self) -> Result<Token, CompileError> {
        if let Some(token) = self.tokens.read_token() {
            return Ok(token);
        }
        Err(match self.context.innermost_bracket() {
            Some((bracket, offset)) => CompileError::MismatchedBracket {
                token: bracket.clone(),
                offset: *offset,
            },
            None => CompileError::UnexpectedEnd {
                offset: self.tokens.offset(),
            },
        })
    }

    /// Consume the symbol `expected` or fail.
    pub fn expect(&mut self, expected: &str) -> Result<Token, CompileError> {
        let token = self.read_token_or_end()?;
        if token.is(expected) {
            Ok(token)
        } else {
            Err(CompileError::UnexpectedToken {
                token: token.text,
                offset: token.offset,
            })
        }
    }

    /// Consume the `close` marker of the innermost open bracket.
    pub fn expect_close(&mut self, close: &str) -> Result<(), CompileError> {
        match self.tokens.peek_token() {
            Some(token) if token.is(close) => {
                self.tokens.read_token();
                self.context.close_bracket();
                Ok(())
            }
            Some(token) if token.is(")") || token.is("]") => Err(CompileError::MismatchedBracket {
                token: token.text.clone(),
                offset: token.offset,
            }),
            Some(token) if self.closes_ahead() => Err(CompileError::UnexpectedToken {
                token: token.text.clone(),
                offset: token.offset,
            }),
            Some(token) => Err(match self.context.innermost_bracket() {
                Some((bracket, offset)) => CompileError::MismatchedBracket {
                    token: bracket.clone(),
                    offset: *offset,
                },
                None => CompileError::UnexpectedToken {
                    token: token.text.clone(),
                    offset: token.offset,
                },
            }),
            None => self.read_token_or_end().map(|_| ()),
        }
    }

    /// Whether the remaining tokens hold a close for the innermost open bracket.
    fn closes_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut n = 0;
        while let Some(token) = self.tokens.peek_nth(n) {
            if token.is("(") || token.is("[") {
                depth += 1;
            } else if token.is(")") || token.is("]") {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            n += 1;
        }
        false
    }

    /// Read a comma-separated list up to `close`. `open` has already been consumed.
    pub fn read_arguments(&mut self, open: &Token, close: &str) -> Result<Vec<ExprRef>, CompileError> {
        self.context.open_bracket(&open.text, open.offset);
        let mut args = Vec::new();
        if self.tokens.next_is(close) {
            self.expect_close(close)?;
            return Ok(args);
        }
        loop {
            args.push(self.read_value(0)?);
            if self.tokens.next_is(",") {
                self.tokens.read_token();
                continue;
            }
            self.expect_close(close)?;
            return Ok(args);
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.peek_token()
    }

    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.peek_nth(n)
    }

    pub fn next_is(&self, text: &str) -> bool {
        self.tokens.next_is(text)
    }

    pub fn read_token(&mut self) -> Option<Token> {
        self.tokens.read_token()
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            position: self.tokens.position(),
            brackets: self.context.bracket_depth(),
        }
    }

    pub(crate) fn rewind(&mut self, checkpoint: Checkpoint) {
        self.tokens.reset_position(checkpoint.position);
        self.context.truncate_brackets(checkpoint.brackets);
    }

    /// Read a type name in a type-only position such as after `new`, `is` or `as`.
    pub fn read_type(&mut self) -> Result<Type, CompileError> {
        let first = self.read_token_or_end()?;
        if !first.is_identifier() {
            return Err(CompileError::UnexpectedToken {
                token: first.text,
                offset: first.offset,
            });
        }
        self.read_type_after(&first, false)
    }

    /// Speculatively read a type name, leaving the cursor untouched if there is none.
    pub fn try_read_type(&mut self) -> Result<Option<Type>, CompileError> {
        let checkpoint = self.checkpoint();
        if !self.peek().is_some_and(Token::is_identifier) {
            return Ok(None);
        }
        match self.read_type() {
            Ok(ty) => Ok(Some(ty)),
            Err(err) => {
                log::trace!("not a type here: {err}");
                self.rewind(checkpoint);
                Ok(None)
            }
        }
    }

    /// Read the rest of a type name whose first identifier is `first`.
    ///
    /// Dotted segments are appended until the name resolves. In an expression, generic arguments
    /// are only taken if they parse, and the `?`/`[]` suffixes are left for the operators.
    pub fn read_type_after(&mut self, first: &Token, in_expression: bool) -> Result<Type, CompileError> {
        let mut name = first.text.clone();
        loop {
            let generic_args = if self.next_is(&self.options().generic_open) {
                if in_expression {
                    self.try_read_generic_params()
                } else {
                    self.tokens.read_token();
                    Some(self.read_generic_params()?)
                }
            } else {
                None
            };
            let args = generic_args.unwrap_or_default();
            if let Some(ty) = self.resolver().resolve_type_name(&name, &args) {
                return if in_expression {
                    Ok(ty)
                } else {
                    self.read_type_suffixes(ty)
                };
            }
            let dotted = self.next_is(".") && self.peek_nth(1).is_some_and(Token::is_identifier);
            if !args.is_empty() || !dotted {
                return Err(CompileError::UnknownType {
                    name,
                    offset: first.offset,
                });
            }
            self.tokens.read_token();
            if let Some(segment) = self.tokens.read_token() {
                name.push('.');
                name.push_str(&segment.text);
            }
        }
    }

    fn read_type_suffixes(&mut self, mut ty: Type) -> Result<Type, CompileError> {
        loop {
            if self.next_is("?") && self.nullable_marker_follows() {
                self.tokens.read_token();
                ty = ty.nullable();
            } else if self.next_is("[") && self.array_marker_follows() {
                self.tokens.read_token();
                let mut rank = 1;
                while self.tokens.read_symbol(",", false)? {
                    rank += 1;
                }
                self.tokens.read_symbol("]", true)?;
                ty = Type::array(ty, rank);
            } else {
                return Ok(ty);
            }
        }
    }

    /// Whether the `?` after a type name is a nullable marker rather than a conditional.
    fn nullable_marker_follows(&self) -> bool {
        let close = self.options().generic_close.as_str();
        match self.peek_nth(1) {
            None => true,
            Some(token)
                if [")", ",", "]", "[", ">", ">>", close]
                    .into_iter()
                    .any(|marker| token.is(marker)) =>
            {
                true
            }
            Some(token) if token.is_identifier() => self.peek_nth(2).is_some_and(|after| {
                after.is(",") || after.is(")") || after.is(&self.options().lambda_arrow)
            }),
            Some(_) => false,
        }
    }

    /// Whether `[` starts an array rank such as `[]` or `[,]`.
    fn array_marker_follows(&self) -> bool {
        let mut n = 1;
        while let Some(token) = self.peek_nth(n) {
            if token.is("]") {
                return true;
            }
            if !token.is(",") {
                return false;
            }
            n += 1;
        }
        false
    }

    /// Read `T1, T2>` after the generic open marker.
    pub fn read_generic_params(&mut self) -> Result<Vec<Type>, CompileError> {
        let close = self.options().generic_close.clone();
        let mut args = Vec::new();
        loop {
            args.push(self.read_type()?);
            if self.tokens.read_symbol(",", false)? {
                continue;
            }
            if self.tokens.split_symbol(&close) {
                self.tokens.read_token();
                return Ok(args);
            }
            let token = self.read_token_or_end()?;
            return Err(CompileError::UnexpectedToken {
                token: token.text,
                offset: token.offset,
            });
        }
    }

    /// Read a generic argument list if one follows, backtracking when it does not parse.
    pub fn try_read_generic_params(&mut self) -> Option<Vec<Type>> {
        let checkpoint = self.checkpoint();
        if !self.next_is(&self.options().generic_open) {
            return None;
        }
        self.tokens.read_token();
        match self.read_generic_params() {
            Ok(args) => Some(args),
            Err(_) => {
                self.rewind(checkpoint);
                None
            }
        }
    }

    /// Read a lambda if one starts here: `x => body` or `(params) => body`.
    fn try_read_lambda(&mut self) -> Result<Option<ExprRef>, CompileError> {
        let arrow = self.options().lambda_arrow.clone();
        let Some(first) = self.peek() else {
            return Ok(None);
        };
        if first.is_identifier() && self.peek_nth(1).is_some_and(|token| token.is(&arrow)) {
            let head = ParamHead {
                name: first.text.clone(),
                ty: None,
                offset: first.offset,
            };
            self.tokens.read_token();
            self.tokens.read_token();
            return self.finish_lambda(vec![head]).map(Some);
        }
        if !first.is("(") {
            return Ok(None);
        }

        let checkpoint = self.checkpoint();
        match self.read_param_heads() {
            Ok(heads) if self.next_is(&arrow) => {
                self.tokens.read_token();
                self.finish_lambda(heads).map(Some)
            }
            Ok(_) => {
                self.rewind(checkpoint);
                Ok(None)
            }
            Err(err) => {
                let failed_at = self.peek().cloned();
                self.rewind(checkpoint);
                if self.group_precedes(&arrow) {
                    let (token, offset) = match failed_at {
                        Some(token) => (token.text, token.offset),
                        None => (err.token().to_string(), err.offset()),
                    };
                    return Err(CompileError::MalformedLambda { token, offset });
                }
                log::debug!("not a lambda head: {err}");
                Ok(None)
            }
        }
    }

    /// Read `(a, int b)` as lambda parameters.
    fn read_param_heads(&mut self) -> Result<Vec<ParamHead>, CompileError> {
        self.expect("(")?;
        let mut heads = Vec::new();
        if self.tokens.read_symbol(")", false)? {
            return Ok(heads);
        }
        loop {
            let first = self.read_token_or_end()?;
            if !first.is_identifier() {
                return Err(CompileError::UnexpectedToken {
                    token: first.text,
                    offset: first.offset,
                });
            }
            let head = if self.next_is(",") || self.next_is(")") {
                ParamHead {
                    name: first.text,
                    ty: None,
                    offset: first.offset,
                }
            } else {
                let ty = self.read_type_after(&first, false)?;
                let name = self.read_token_or_end()?;
                if !name.is_identifier() {
                    return Err(CompileError::UnexpectedToken {
                        token: name.text,
                        offset: name.offset,
                    });
                }
                ParamHead {
                    name: name.text,
                    ty: Some(ty),
                    offset: name.offset,
                }
            };
            heads.push(head);
            if self.tokens.read_symbol(",", false)? {
                continue;
            }
            self.expect(")")?;
            return Ok(heads);
        }
    }

    /// Whether the balanced parenthesized group at the cursor is followed by `arrow`.
    fn group_precedes(&self, arrow: &str) -> bool {
        let mut depth = 0usize;
        let mut n = 0;
        while let Some(token) = self.peek_nth(n) {
            if token.is("(") {
                depth += 1;
            } else if token.is(")") {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return self.peek_nth(n + 1).is_some_and(|next| next.is(arrow));
                }
            }
            n += 1;
        }
        false
    }

    fn finish_lambda(&mut self, heads: Vec<ParamHead>) -> Result<ExprRef, CompileError> {
        let expected = self.context.take_expected_types().unwrap_or_default();
        let mut params: Vec<Parameter> = Vec::with_capacity(heads.len());
        for (idx, head) in heads.into_iter().enumerate() {
            if params.iter().any(|param| param.name == head.name) {
                return Err(CompileError::DuplicateParameter {
                    name: head.name,
                    offset: head.offset,
                });
            }
            let ty = head
                .ty
                .or_else(|| expected.get(idx).cloned())
                .unwrap_or_else(|| self.options().default_parameter_type.clone());
            params.push(Parameter::new(head.name, ty));
        }
        log::trace!("lambda over {} parameters", params.len());
        self.context.push_scope(params.clone());
        let body = self.read_value(0);
        self.context.pop_scope();
        Ok(Rc::new(Expr::Lambda {
            params,
            body: body?,
        }))
    }

    /// Split the next symbol so that it starts with `prefix`, see [`Tokenizer::split_symbol`].
    pub fn split_symbol(&mut self, prefix: &str) -> bool {
        self.tokens.split_symbol(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(text: &str) -> ExprRef {
        Compiler::standard()
            .parse(text)
            .unwrap_or_else(|err| panic!("{text:?} failed: {err}"))
    }

    #[test]
    fn reads_nested_generic_types() {
        let compiler = Compiler::standard();
        let mut parser = ExprParser::new(&compiler, "List<List<int>>").unwrap();
        let ty = parser.read_type().unwrap();
        assert_eq!(ty.to_string(), "List<List<int>>");
        assert!(parser.peek().is_none());
    }

    #[test]
    fn reads_nullable_and_array_suffixes() {
        let compiler = Compiler::standard();
        let mut parser = ExprParser::new(&compiler, "int?[,]").unwrap();
        assert_eq!(
            parser.read_type().unwrap(),
            Type::array(Type::Int.nullable(), 2)
        );
    }

    #[test]
    fn question_mark_before_conditional_branch_is_not_nullable() {
        let expr = parse_ok("(x) => x is int ? 1 : 2");
        let Expr::Lambda { body, .. } = &*expr else {
            panic!("expected lambda, got {expr}");
        };
        assert!(matches!(&**body, Expr::Conditional { .. }));
    }

    #[test]
    fn failed_type_read_rewinds() {
        let compiler = Compiler::standard();
        let mut parser = ExprParser::new(&compiler, "nope + 1").unwrap();
        assert_eq!(parser.try_read_type().unwrap(), None);
        assert_eq!(parser.peek().map(|token| token.text.as_str()), Some("nope"));
    }
}
