//! Builders for operators that follow a complete left operand.

use std::rc::Rc;

use exprc_lexer::Token;

use super::FollowBuilder;
use super::nodes::{
    concat, convert, describe_args, implicit, is_assignable, make_assign, make_binary, make_unary,
    unify_branches,
};
use crate::ast::{BinaryOp, Expr, ExprRef, UnaryOp};
use crate::error::CompileError;
use crate::options::OperatorDef;
use crate::parser::{ExprParser, Operand};
use crate::types::{Type, conversion_distance};
use crate::universe::MethodKind;
use crate::value::Value;

fn left_value(parser: &ExprParser<'_>, left: Operand, token: &Token) -> Result<ExprRef, CompileError> {
    parser.operand_value(left, token.offset)
}

/// Read the member name after `.` or `?.` and build the access or call on `left`.
fn read_member(parser: &mut ExprParser<'_>, left: Operand) -> Result<ExprRef, CompileError> {
    let name = parser.read_token_or_end()?;
    if !name.is_identifier() {
        return Err(CompileError::UnexpectedToken {
            token: name.text,
            offset: name.offset,
        });
    }

    let checkpoint = parser.checkpoint();
    let generic_args = match parser.try_read_generic_params() {
        Some(args) if parser.next_is("(") => args,
        Some(_) => {
            parser.rewind(checkpoint);
            Vec::new()
        }
        None => Vec::new(),
    };

    let resolver = parser.resolver();
    let receiver_type = match &left {
        Operand::Type(ty) => ty.clone(),
        Operand::Expr(expr) => expr.ty(),
    };
    let unknown_member = || CompileError::UnknownMember {
        type_name: receiver_type.to_string(),
        name: name.text.clone(),
        offset: name.offset,
    };

    if parser.next_is("(") {
        let open = parser.expect("(")?;
        let args = parser.read_arguments(&open, ")")?;
        let (candidates, receiver) = match &left {
            Operand::Type(ty) => (resolver.get_static_methods(ty, &name.text), None),
            Operand::Expr(expr) => (
                resolver.get_instance_methods(&expr.ty(), &name.text),
                Some(expr),
            ),
        };
        if candidates.is_empty() {
            return Err(unknown_member());
        }
        let selection = resolver
            .select_method(&candidates, receiver, &generic_args, &args)
            .ok_or_else(|| CompileError::NoApplicableOverload {
                name: name.text.clone(),
                arguments: describe_args(&args),
                offset: name.offset,
            })?;
        log::trace!("{} resolved to {}", name.text, selection.member);
        let target = match selection.member.kind {
            MethodKind::Instance => receiver.cloned(),
            MethodKind::Static | MethodKind::Extension => None,
        };
        return Ok(Expr::call(target, selection.member, selection.args));
    }

    let access = match left {
        Operand::Type(ty) => Expr::MemberAccess {
            target: None,
            member: resolver
                .get_static_property_or_field(&ty, &name.text)
                .ok_or_else(unknown_member)?,
        },
        Operand::Expr(expr) => Expr::MemberAccess {
            member: resolver
                .get_instance_property_or_field(&expr.ty(), &name.text)
                .ok_or_else(unknown_member)?,
            target: Some(expr),
        },
    };
    Ok(Rc::new(access))
}

/// `.`: member access, method call or dotted static access on a type.
#[derive(Debug)]
pub struct MemberAccessBuilder;

impl FollowBuilder for MemberAccessBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        _token: &Token,
        _op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        read_member(parser, left).map(Operand::Expr)
    }
}

/// `?.`: evaluates the receiver once into a hidden local and yields null when it is null.
///
/// `a?.B` becomes `{ var t; t = a; (t == null ? null : t.B) }`. Only the immediate member is
/// guarded.
#[derive(Debug)]
pub struct NullConditionalBuilder;

impl FollowBuilder for NullConditionalBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        _op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let receiver = left_value(parser, left, token)?;
        let ty = receiver.ty();
        if !ty.accepts_null() {
            return Err(CompileError::type_mismatch(
                format!("'{ty}' can never be null"),
                &token.text,
                token.offset,
            ));
        }
        let temp = parser.context_mut().push_hidden(ty.clone());
        let temp_ref = Expr::parameter(&temp);
        let access_receiver = if ty.is_nullable() {
            convert(temp_ref.clone(), ty.underlying())
        } else {
            temp_ref.clone()
        };
        let member = read_member(parser, Operand::Expr(access_receiver));
        parser.context_mut().pop_hidden();
        let member = member?;

        let result_ty = member.ty().nullable();
        let is_null = Expr::binary(
            BinaryOp::Equal,
            temp_ref.clone(),
            Expr::constant(Value::Null, ty.clone()),
            Type::Bool,
        );
        let guarded = Expr::conditional(
            is_null,
            Expr::constant(Value::Null, result_ty.clone()),
            convert(member, &result_ty),
            result_ty,
        );
        let store = Expr::binary(BinaryOp::Assign, temp_ref, receiver, ty);
        Ok(Operand::Expr(Rc::new(Expr::Block {
            locals: vec![temp],
            body: vec![store, guarded],
        })))
    }
}

/// `a[i]`: array element, or the `get_Item`/`get_Chars` indexer.
#[derive(Debug)]
pub struct IndexBuilder;

impl FollowBuilder for IndexBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        _op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let target = left_value(parser, left, token)?;
        let args = parser.read_arguments(token, "]")?;
        let target_ty = target.ty();

        if let Type::Array { element, rank } = &target_ty {
            if *rank != 1 || args.len() != 1 {
                return Err(CompileError::type_mismatch(
                    format!("'{target_ty}' takes exactly one index"),
                    &token.text,
                    token.offset,
                ));
            }
            let index = implicit(parser.ranks(), args[0].clone(), &Type::Int, token)?;
            return Ok(Operand::Expr(Expr::binary(
                BinaryOp::ArrayIndex,
                target.clone(),
                index,
                element.as_ref().clone(),
            )));
        }

        let indexer = if target_ty == Type::String {
            "get_Chars"
        } else {
            "get_Item"
        };
        let resolver = parser.resolver();
        let candidates = resolver.get_instance_methods(&target_ty, indexer);
        if candidates.is_empty() {
            return Err(CompileError::UnknownMember {
                type_name: target_ty.to_string(),
                name: "this[]".to_string(),
                offset: token.offset,
            });
        }
        let selection = resolver
            .select_method(&candidates, Some(&target), &[], &args)
            .ok_or_else(|| CompileError::NoApplicableOverload {
                name: indexer.to_string(),
                arguments: describe_args(&args),
                offset: token.offset,
            })?;
        Ok(Operand::Expr(Expr::call(
            Some(target),
            selection.member,
            selection.args,
        )))
    }
}

/// `f(args)` on a function-typed value.
#[derive(Debug)]
pub struct InvokeBuilder;

impl FollowBuilder for InvokeBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        _op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let target = left_value(parser, left, token)?;
        let Type::Function { params, .. } = target.ty() else {
            return Err(CompileError::type_mismatch(
                format!("'{}' is not invocable", target.ty()),
                &token.text,
                token.offset,
            ));
        };
        let args = parser.read_arguments(token, ")")?;
        if args.len() != params.len() {
            return Err(CompileError::NoApplicableOverload {
                name: target.to_string(),
                arguments: describe_args(&args),
                offset: token.offset,
            });
        }
        let args = args
            .into_iter()
            .zip(&params)
            .map(|(arg, param)| implicit(parser.ranks(), arg, param, token))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Operand::Expr(Rc::new(Expr::Invoke { target, args })))
    }
}

/// Postfix `++` and `--`.
#[derive(Debug)]
pub struct PostfixBuilder(pub UnaryOp);

impl FollowBuilder for PostfixBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        _op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let operand = left_value(parser, left, token)?;
        make_unary(parser.ranks(), self.0, operand, token).map(Operand::Expr)
    }
}

/// `^`, computed in `double`.
#[derive(Debug)]
pub struct PowerBuilder;

impl FollowBuilder for PowerBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let left = left_value(parser, left, token)?;
        let right = parser.read_value(op.right_floor())?;
        make_binary(parser.ranks(), BinaryOp::Power, left, right, token).map(Operand::Expr)
    }
}

/// Arithmetic, bitwise, shift, relational and equality operators.
#[derive(Debug)]
pub struct BinaryBuilder(pub BinaryOp);

impl FollowBuilder for BinaryBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let left = left_value(parser, left, token)?;
        let right = parser.read_value(op.right_floor())?;
        make_binary(parser.ranks(), self.0, left, right, token).map(Operand::Expr)
    }
}

/// `+`: numeric addition, or string concatenation when either side is a string.
#[derive(Debug)]
pub struct AddBuilder;

impl FollowBuilder for AddBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let left = left_value(parser, left, token)?;
        let right = parser.read_value(op.right_floor())?;
        if left.ty() == Type::String || right.ty() == Type::String {
            return concat(parser.compiler(), left, right, token).map(Operand::Expr);
        }
        make_binary(parser.ranks(), BinaryOp::Add, left, right, token).map(Operand::Expr)
    }
}

/// `&&` and `||` over `bool` operands.
#[derive(Debug)]
pub struct LogicalBuilder(pub BinaryOp);

impl FollowBuilder for LogicalBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let left = left_value(parser, left, token)?;
        let left = implicit(parser.ranks(), left, &Type::Bool, token)?;
        let right = parser.read_value(op.right_floor())?;
        let right = implicit(parser.ranks(), right, &Type::Bool, token)?;
        Ok(Operand::Expr(Expr::binary(self.0, left, right, Type::Bool)))
    }
}

/// `a ?? b`.
#[derive(Debug)]
pub struct CoalesceBuilder;

impl FollowBuilder for CoalesceBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let left = left_value(parser, left, token)?;
        let right = parser.read_value(op.right_floor())?;
        let (left_ty, right_ty) = (left.ty(), right.ty());
        if !left_ty.accepts_null() {
            return Err(CompileError::type_mismatch(
                format!("'{left_ty}' can never be null"),
                &token.text,
                token.offset,
            ));
        }
        let ranks = parser.ranks();
        let result_ty = if left_ty.is_nullable()
            && conversion_distance(&right_ty, left_ty.underlying(), ranks).is_some()
        {
            left_ty.underlying().clone()
        } else if conversion_distance(&right_ty, &left_ty, ranks).is_some() {
            left_ty.clone()
        } else {
            return Err(CompileError::type_mismatch(
                format!("cannot coalesce '{left_ty}' with '{right_ty}'"),
                &token.text,
                token.offset,
            ));
        };
        let right = convert(right, &result_ty);
        Ok(Operand::Expr(Expr::binary(
            BinaryOp::Coalesce,
            left,
            right,
            result_ty,
        )))
    }
}

/// `test ? a : b`.
#[derive(Debug)]
pub struct TernaryBuilder;

impl FollowBuilder for TernaryBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let test = left_value(parser, left, token)?;
        let test = implicit(parser.ranks(), test, &Type::Bool, token)?;
        let if_true = parser.read_value(0)?;
        parser.expect(":")?;
        let if_false = parser.read_value(op.right_floor())?;
        let (if_true, if_false, ty) = unify_branches(parser.ranks(), if_true, if_false, token)?;
        Ok(Operand::Expr(Expr::conditional(test, if_true, if_false, ty)))
    }
}

/// `x is T`.
#[derive(Debug)]
pub struct IsBuilder;

impl FollowBuilder for IsBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        _op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let operand = left_value(parser, left, token)?;
        let ty = parser.read_type()?;
        Ok(Operand::Expr(Rc::new(Expr::TypeIs { operand, ty })))
    }
}

/// `x as T`, null when `x` is not a `T`.
#[derive(Debug)]
pub struct AsBuilder;

impl FollowBuilder for AsBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        _op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let operand = left_value(parser, left, token)?;
        let ty = parser.read_type()?;
        Ok(Operand::Expr(Expr::unary(
            UnaryOp::TypeAs,
            operand,
            ty.nullable(),
        )))
    }
}

/// `=` and the compound assignments.
///
/// `a += b` is built as `a = (T)(a + b)` where `T` is the type of `a`.
#[derive(Debug)]
pub struct AssignBuilder(pub Option<BinaryOp>);

impl FollowBuilder for AssignBuilder {
    fn build(
        &self,
        parser: &mut ExprParser<'_>,
        left: Operand,
        token: &Token,
        op: &OperatorDef,
    ) -> Result<Operand, CompileError> {
        let target = left_value(parser, left, token)?;
        let value = parser.read_value(op.right_floor())?;
        let Some(compound) = self.0 else {
            return make_assign(parser.ranks(), target, value, token).map(Operand::Expr);
        };
        if !is_assignable(&target) {
            return Err(CompileError::InvalidAssignment {
                token: target.to_string(),
                offset: token.offset,
            });
        }
        let ty = target.ty();
        let combined = if compound == BinaryOp::Add && ty == Type::String {
            concat(parser.compiler(), target.clone(), value, token)?
        } else {
            make_binary(parser.ranks(), compound, target.clone(), value, token)?
        };
        Ok(Operand::Expr(Expr::binary(
            BinaryOp::Assign,
            target,
            convert(combined, &ty),
            ty,
        )))
    }
}
