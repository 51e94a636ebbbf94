//! Builders for tokens that open an operand.

use std::str::FromStr;

use exprc_lexer::{Token, TokenKind};
use rust_decimal::Decimal;

use super::StartBuilder;
use super::nodes::{describe_args, explicit, make_unary};
use crate::ast::{Expr, ExprRef, UnaryOp};
use crate::error::CompileError;
use crate::parser::{ExprParser, Operand};
use crate::types::Type;
use crate::value::Value;

fn invalid_literal(token: &Token) -> CompileError {
    CompileError::InvalidLiteral {
        token: token.text.clone(),
        offset: token.offset,
    }
}

/// Numeric literals, typed by suffix or by shape.
#[derive(Debug)]
pub struct NumberBuilder;

impl StartBuilder for NumberBuilder {
    fn build(&self, parser: &mut ExprParser<'_>, token: &Token) -> Result<Operand, CompileError> {
        let text = token.text.as_str();
        let suffix = text
            .chars()
            .last()
            .filter(char::is_ascii_alphabetic)
            .map(|ch| ch.to_ascii_lowercase());
        let (digits, ty) = match suffix {
            Some(suffix) => match parser.options().suffixes.get(&suffix) {
                Some(ty) => (&text[..text.len() - 1], Some(ty.clone())),
                None => return Err(invalid_literal(token)),
            },
            None => (text, None),
        };
        let fractional = digits.contains(['.', 'e', 'E']);
        let value = match ty {
            Some(Type::Long) if !fractional => digits.parse().ok().map(Value::Long),
            Some(Type::Int) if !fractional => digits.parse().ok().map(Value::Int),
            Some(Type::Float) => digits.parse().ok().map(Value::Float),
            Some(Type::Double) => digits.parse().ok().map(Value::Double),
            Some(Type::Decimal) => Decimal::from_str(digits)
                .or_else(|_| Decimal::from_scientific(digits))
                .ok()
                .map(Value::Decimal),
            Some(_) => None,
            None if fractional => digits.parse().ok().map(Value::Double),
            None => digits
                .parse()
                .map(Value::Int)
                .or_else(|_| digits.parse().map(Value::Long))
                .ok(),
        };
        let value = value.ok_or_else(|| invalid_literal(token))?;
        let ty = value.runtime_type();
        Ok(Operand::Expr(Expr::constant(value, ty)))
    }
}

/// String and character literals.
#[derive(Debug)]
pub struct LiteralBuilder;

impl StartBuilder for LiteralBuilder {
    fn build(&self, _parser: &mut ExprParser<'_>, token: &Token) -> Result<Operand, CompileError> {
        let value = match token.kind {
            TokenKind::String => Value::from(token.text.as_str()),
            TokenKind::Char => {
                let mut chars = token.text.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Value::Char(ch),
                    _ => return Err(invalid_literal(token)),
                }
            }
            _ => return Err(invalid_literal(token)),
        };
        let ty = value.runtime_type();
        Ok(Operand::Expr(Expr::constant(value, ty)))
    }
}

#[derive(Debug)]
pub struct BoolBuilder(pub bool);

impl StartBuilder for BoolBuilder {
    fn build(&self, _parser: &mut ExprParser<'_>, _token: &Token) -> Result<Operand, CompileError> {
        Ok(Operand::Expr(Expr::constant(Value::Bool(self.0), Type::Bool)))
    }
}

/// `null`, typed [`Type::Null`] until something converts it.
#[derive(Debug)]
pub struct NullBuilder;

impl StartBuilder for NullBuilder {
    fn build(&self, _parser: &mut ExprParser<'_>, _token: &Token) -> Result<Operand, CompileError> {
        Ok(Operand::Expr(Expr::constant(Value::Null, Type::Null)))
    }
}

/// `(`: a cast when a type and `)` are followed by something that can start an operand,
/// otherwise a parenthesized group.
#[derive(Debug)]
pub struct ParenBuilder;

impl ParenBuilder {
    fn starts_cast_operand(parser: &ExprParser<'_>, ty: &Type) -> bool {
        let Some(next) = parser.peek() else {
            return false;
        };
        match next.kind {
            TokenKind::Number | TokenKind::String | TokenKind::Char => true,
            TokenKind::Identifier => !parser.options().operators.contains_key(&next.text),
            TokenKind::Symbol => {
                if next.is("(") || next.is("!") || next.is("~") {
                    return true;
                }
                // `(x) - 1` is a subtraction unless `x` is a primitive alias.
                ["+", "-", "++", "--"].into_iter().any(|sign| next.is(sign))
                    && parser.options().aliases.values().any(|alias| alias == ty)
            }
        }
    }
}

impl StartBuilder for ParenBuilder {
    fn build(&self, parser: &mut ExprParser<'_>, token: &Token) -> Result<Operand, CompileError> {
        let checkpoint = parser.checkpoint();
        let names_local = parser
            .peek()
            .is_some_and(|next| parser.context().lookup(&next.text).is_some());
        if !names_local
            && let Some(ty) = parser.try_read_type()?
            && parser.next_is(")")
        {
            parser.read_token();
            if Self::starts_cast_operand(parser, &ty) {
                log::trace!("cast to {ty} at {}", token.offset);
                let operand = parser.read_value(parser.options().prefix_priority)?;
                return explicit(parser.ranks(), operand, &ty, token).map(Operand::Expr);
            }
        }
        parser.rewind(checkpoint);

        parser.context_mut().open_bracket(&token.text, token.offset);
        let inner = parser.read_expression(0)?;
        parser.expect_close(")")?;
        Ok(inner)
    }
}

/// Prefix operators: `-`, `+`, `!`, `~`, `++`, `--`.
#[derive(Debug)]
pub struct PrefixBuilder(pub UnaryOp);

impl PrefixBuilder {
    /// `int.MinValue` and `long.MinValue` spelled as negated literals, whose magnitude alone does
    /// not fit the signed type.
    fn min_value_literal(parser: &ExprParser<'_>) -> Option<Value> {
        let next = parser.peek()?;
        if next.kind != TokenKind::Number {
            return None;
        }
        let value = match next.text.as_str() {
            "2147483648" => Value::Int(i32::MIN),
            "9223372036854775808" => Value::Long(i64::MIN),
            _ => return None,
        };
        let options = parser.options();
        let postfix_follows = parser
            .peek_nth(1)
            .and_then(|after| options.operators.get(&after.text))
            .is_some_and(|op| op.priority > options.prefix_priority);
        (!postfix_follows).then_some(value)
    }
}

impl StartBuilder for PrefixBuilder {
    fn build(&self, parser: &mut ExprParser<'_>, token: &Token) -> Result<Operand, CompileError> {
        if self.0 == UnaryOp::Negate
            && let Some(value) = Self::min_value_literal(parser)
        {
            parser.read_token();
            let ty = value.runtime_type();
            return Ok(Operand::Expr(Expr::constant(value, ty)));
        }
        let operand = parser.read_value(parser.options().prefix_priority)?;
        make_unary(parser.ranks(), self.0, operand, token).map(Operand::Expr)
    }
}

/// `new T(args)`.
#[derive(Debug)]
pub struct NewBuilder;

impl StartBuilder for NewBuilder {
    fn build(&self, parser: &mut ExprParser<'_>, token: &Token) -> Result<Operand, CompileError> {
        let ty = parser.read_type()?;
        let open = parser.expect("(")?;
        let args = parser.read_arguments(&open, ")")?;
        let resolver = parser.resolver();
        let candidates = resolver.get_constructors(&ty);
        if candidates.is_empty() {
            return Err(CompileError::UnknownMember {
                type_name: ty.to_string(),
                name: "constructor".to_string(),
                offset: token.offset,
            });
        }
        let selection = resolver.select_constructor(&candidates, &args).ok_or_else(|| {
            CompileError::NoApplicableOverload {
                name: ty.to_string(),
                arguments: describe_args(&args),
                offset: token.offset,
            }
        })?;
        Ok(Operand::Expr(std::rc::Rc::new(Expr::New {
            constructor: selection.member,
            args: selection.args,
        })))
    }
}

/// Tokens that may never open an operand.
#[derive(Debug)]
pub struct ThrowBuilder;

impl StartBuilder for ThrowBuilder {
    fn build(&self, _parser: &mut ExprParser<'_>, token: &Token) -> Result<Operand, CompileError> {
        if token.is(")") || token.is("]") {
            Err(CompileError::MismatchedBracket {
                token: token.text.clone(),
                offset: token.offset,
            })
        } else {
            Err(CompileError::UnexpectedToken {
                token: token.text.clone(),
                offset: token.offset,
            })
        }
    }
}

/// Identifiers: a visible parameter, an imported function or member, or a type name.
#[derive(Debug)]
pub struct IdentifierBuilder;

impl IdentifierBuilder {
    fn imported_call(
        parser: &mut ExprParser<'_>,
        token: &Token,
    ) -> Result<Option<ExprRef>, CompileError> {
        let resolver = parser.resolver();
        let imports: Vec<Type> = parser
            .options()
            .imports
            .iter()
            .filter_map(|import| resolver.resolve_type(import))
            .collect();
        let mut candidates: Vec<_> = imports
            .iter()
            .flat_map(|ty| resolver.get_static_methods(ty, &token.text))
            .collect();
        if candidates.is_empty() {
            candidates = imports
                .iter()
                .flat_map(|ty| resolver.get_static_methods_ignore_case(ty, &token.text))
                .collect();
        }
        if candidates.is_empty() {
            return Ok(None);
        }
        let Some(open) = parser.read_token() else {
            return Ok(None);
        };
        let args = parser.read_arguments(&open, ")")?;
        let selection = resolver
            .select_method(&candidates, None, &[], &args)
            .ok_or_else(|| CompileError::NoApplicableOverload {
                name: token.text.clone(),
                arguments: describe_args(&args),
                offset: token.offset,
            })?;
        Ok(Some(Expr::call(None, selection.member, selection.args)))
    }

    fn imported_member(parser: &ExprParser<'_>, name: &str) -> Option<ExprRef> {
        let resolver = parser.resolver();
        parser.options().imports.iter().find_map(|import| {
            let ty = resolver.resolve_type(import)?;
            let member = resolver.get_static_property_or_field(&ty, name)?;
            Some(std::rc::Rc::new(Expr::MemberAccess {
                target: None,
                member,
            }))
        })
    }
}

impl StartBuilder for IdentifierBuilder {
    fn build(&self, parser: &mut ExprParser<'_>, token: &Token) -> Result<Operand, CompileError> {
        if let Some(param) = parser.context().lookup(&token.text) {
            return Ok(Operand::Expr(Expr::parameter(param)));
        }
        if parser.next_is("(") {
            if let Some(call) = Self::imported_call(parser, token)? {
                return Ok(Operand::Expr(call));
            }
        } else if let Some(member) = Self::imported_member(parser, &token.text) {
            return Ok(Operand::Expr(member));
        }
        parser.read_type_after(token, true).map(Operand::Type)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::Expr;
    use crate::compiler::Compiler;
    use crate::types::Type;
    use crate::value::Value;

    fn constant(text: &str) -> (Value, Type) {
        let expr = Compiler::standard().parse(text).unwrap();
        let Expr::Constant { value, ty } = &*expr else {
            panic!("expected a constant, got {expr}");
        };
        (value.clone(), ty.clone())
    }

    #[test]
    fn numbers_are_typed_by_suffix_and_shape() {
        assert_eq!(constant("10").1, Type::Int);
        assert_eq!(constant("10L").1, Type::Long);
        assert_eq!(constant("3000000000").1, Type::Long);
        assert_eq!(constant("2.5").1, Type::Double);
        assert_eq!(constant("2.5f").1, Type::Float);
        assert_eq!(constant("1e3").1, Type::Double);
        assert_eq!(constant("1.25m").1, Type::Decimal);
    }

    #[test]
    fn negative_literals_fold() {
        assert_eq!(constant("-5"), (Value::Int(-5), Type::Int));
        assert_eq!(constant("-2147483648"), (Value::Int(i32::MIN), Type::Int));
        assert_eq!(constant("-2147483648L"), (Value::Long(-2147483648), Type::Long));
        assert_eq!(constant("-9223372036854775808"), (Value::Long(i64::MIN), Type::Long));
        assert_eq!(constant("2147483648").1, Type::Long);
    }

    #[test]
    fn long_suffix_rejects_fractions() {
        assert!(Compiler::standard().parse("1.5L").is_err());
    }
}
