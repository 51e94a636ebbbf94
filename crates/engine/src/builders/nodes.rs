//! Typed node construction shared by the builders: promotion, conversions and concatenation.

use std::sync::Arc;

use exprc_lexer::Token;

use crate::ast::{BinaryOp, Expr, ExprRef, UnaryOp};
use crate::compiler::Compiler;
use crate::error::CompileError;
use crate::types::{NumericRanks, Type, conversion_distance, is_explicitly_convertible};
use crate::universe::MethodInfo;
use crate::value::Value;

fn mismatch(message: impl Into<String>, token: &Token) -> CompileError {
    CompileError::type_mismatch(message, &token.text, token.offset)
}

/// Convert `expr` to `ty` without checking that the conversion exists.
///
/// A bare `null` literal becomes a constant of the target type instead of a conversion node.
pub(crate) fn convert(expr: ExprRef, ty: &Type) -> ExprRef {
    if expr.ty() == *ty {
        return expr;
    }
    if let Expr::Constant {
        value: Value::Null,
        ty: Type::Null,
    } = &*expr
    {
        return Expr::constant(Value::Null, ty.clone());
    }
    Expr::unary(UnaryOp::Convert, expr, ty.clone())
}

/// Convert `expr` to `ty` if an implicit conversion exists.
pub(crate) fn implicit(
    ranks: &NumericRanks,
    expr: ExprRef,
    ty: &Type,
    token: &Token,
) -> Result<ExprRef, CompileError> {
    let from = expr.ty();
    if conversion_distance(&from, ty, ranks).is_none() {
        return Err(mismatch(
            format!("cannot implicitly convert '{from}' to '{ty}'"),
            token,
        ));
    }
    Ok(convert(expr, ty))
}

/// Convert `expr` to `ty` as a cast does.
pub(crate) fn explicit(
    ranks: &NumericRanks,
    expr: ExprRef,
    ty: &Type,
    token: &Token,
) -> Result<ExprRef, CompileError> {
    let from = expr.ty();
    if from == Type::Null && ty.accepts_null() {
        return Ok(convert(expr, ty));
    }
    if !is_explicitly_convertible(&from, ty, ranks) {
        return Err(mismatch(format!("cannot convert '{from}' to '{ty}'"), token));
    }
    if from == *ty {
        return Ok(expr);
    }
    Ok(Expr::unary(UnaryOp::Convert, expr, ty.clone()))
}

/// The type arithmetic sees for an operand: `char` counts as `int`.
fn arithmetic_view(ty: &Type) -> Option<Type> {
    match ty.underlying() {
        Type::Char => Some(Type::Int),
        numeric if numeric.is_numeric() => Some(numeric.clone()),
        _ => None,
    }
}

/// Widen both operands to their common numeric type.
///
/// Nullable operands lift the common type to its nullable form.
pub(crate) fn promote(
    ranks: &NumericRanks,
    left: ExprRef,
    right: ExprRef,
) -> Option<(ExprRef, ExprRef, Type)> {
    let (left_ty, right_ty) = (left.ty(), right.ty());
    let common = ranks.promote(&arithmetic_view(&left_ty)?, &arithmetic_view(&right_ty)?)?;
    let target = if left_ty.is_nullable() || right_ty.is_nullable() {
        common.nullable()
    } else {
        common
    };
    Some((convert(left, &target), convert(right, &target), target))
}

fn lift(ty: Type, left: &Type, right: &Type) -> Type {
    if left.is_nullable() || right.is_nullable() {
        ty.nullable()
    } else {
        ty
    }
}

pub(crate) fn make_binary(
    ranks: &NumericRanks,
    op: BinaryOp,
    left: ExprRef,
    right: ExprRef,
    token: &Token,
) -> Result<ExprRef, CompileError> {
    let (left_ty, right_ty) = (left.ty(), right.ty());
    let operands_error = || {
        mismatch(
            format!(
                "operator '{}' cannot be applied to '{left_ty}' and '{right_ty}'",
                token.text
            ),
            token,
        )
    };

    match op {
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => {
            let (left, right, ty) = promote(ranks, left, right).ok_or_else(operands_error)?;
            Ok(Expr::binary(op, left, right, ty))
        }
        BinaryOp::Power => {
            if arithmetic_view(&left_ty).is_none() || arithmetic_view(&right_ty).is_none() {
                return Err(operands_error());
            }
            let ty = lift(Type::Double, &left_ty, &right_ty);
            Ok(Expr::binary(
                op,
                convert(left, &ty),
                convert(right, &ty),
                ty,
            ))
        }
        BinaryOp::And | BinaryOp::Or => {
            if *left_ty.underlying() == Type::Bool && *right_ty.underlying() == Type::Bool {
                let ty = lift(Type::Bool, &left_ty, &right_ty);
                return Ok(Expr::binary(
                    op,
                    convert(left, &ty),
                    convert(right, &ty),
                    ty,
                ));
            }
            let both_integral = [&left_ty, &right_ty].into_iter().all(|ty| {
                arithmetic_view(ty).is_some_and(|view| view.is_integral())
            });
            if !both_integral {
                return Err(operands_error());
            }
            let (left, right, ty) = promote(ranks, left, right).ok_or_else(operands_error)?;
            Ok(Expr::binary(op, left, right, ty))
        }
        BinaryOp::LeftShift | BinaryOp::RightShift => {
            let integral = |ty: &Type| arithmetic_view(ty).filter(Type::is_integral);
            let (Some(value_ty), Some(_)) = (integral(&left_ty), integral(&right_ty)) else {
                return Err(operands_error());
            };
            let ty = lift(
                ranks.promote(&value_ty, &value_ty).unwrap_or(value_ty),
                &left_ty,
                &right_ty,
            );
            let count_ty = lift(Type::Int, &right_ty, &right_ty);
            Ok(Expr::binary(
                op,
                convert(left, &ty),
                convert(right, &count_ty),
                ty,
            ))
        }
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            let (left, right, _) = promote(ranks, left, right).ok_or_else(operands_error)?;
            Ok(Expr::binary(op, left, right, Type::Bool))
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let (left, right) = equality_operands(ranks, left, right).ok_or_else(operands_error)?;
            Ok(Expr::binary(op, left, right, Type::Bool))
        }
        BinaryOp::AndAlso | BinaryOp::OrElse => {
            if left_ty != Type::Bool || right_ty != Type::Bool {
                return Err(operands_error());
            }
            Ok(Expr::binary(op, left, right, Type::Bool))
        }
        BinaryOp::Coalesce | BinaryOp::Assign | BinaryOp::ArrayIndex => Err(operands_error()),
    }
}

/// Bring both sides of `==`/`!=` to a common type.
fn equality_operands(
    ranks: &NumericRanks,
    left: ExprRef,
    right: ExprRef,
) -> Option<(ExprRef, ExprRef)> {
    let (left_ty, right_ty) = (left.ty(), right.ty());
    if left_ty == right_ty {
        return Some((left, right));
    }
    if let Some((left, right, _)) = promote(ranks, left.clone(), right.clone()) {
        return Some((left, right));
    }
    let null_target = |other: &Type| {
        if other.is_value_type() {
            other.clone().nullable()
        } else {
            other.clone()
        }
    };
    if left_ty == Type::Null {
        let target = null_target(&right_ty);
        return Some((convert(left, &target), convert(right, &target)));
    }
    if right_ty == Type::Null {
        let target = null_target(&left_ty);
        return Some((convert(left, &target), convert(right, &target)));
    }
    if conversion_distance(&right_ty, &left_ty, ranks).is_some() {
        return Some((left, convert(right, &left_ty)));
    }
    if conversion_distance(&left_ty, &right_ty, ranks).is_some() {
        return Some((convert(left, &right_ty), right));
    }
    None
}

pub(crate) fn make_unary(
    ranks: &NumericRanks,
    op: UnaryOp,
    operand: ExprRef,
    token: &Token,
) -> Result<ExprRef, CompileError> {
    let ty = operand.ty();
    let operand_error = || {
        mismatch(
            format!("operator '{}' cannot be applied to '{ty}'", token.text),
            token,
        )
    };
    match op {
        UnaryOp::Negate | UnaryOp::UnaryPlus => {
            let view = arithmetic_view(&ty).ok_or_else(operand_error)?;
            let target = lift(
                ranks.promote(&view, &view).unwrap_or(view),
                &ty,
                &ty,
            );
            let operand = convert(operand, &target);
            if op == UnaryOp::Negate
                && let Some(folded) = negate_literal(&operand)
            {
                return Ok(folded);
            }
            Ok(Expr::unary(op, operand, target))
        }
        UnaryOp::Not => {
            if *ty.underlying() != Type::Bool {
                return Err(operand_error());
            }
            Ok(Expr::unary(op, operand, ty))
        }
        UnaryOp::OnesComplement => {
            let view = arithmetic_view(&ty)
                .filter(Type::is_integral)
                .ok_or_else(operand_error)?;
            let target = lift(ranks.promote(&view, &view).unwrap_or(view), &ty, &ty);
            Ok(Expr::unary(op, convert(operand, &target), target))
        }
        UnaryOp::PreIncrementAssign
        | UnaryOp::PreDecrementAssign
        | UnaryOp::PostIncrementAssign
        | UnaryOp::PostDecrementAssign => {
            if !is_assignable(&operand) {
                return Err(CompileError::InvalidAssignment {
                    token: operand.to_string(),
                    offset: token.offset,
                });
            }
            if arithmetic_view(&ty).is_none() {
                return Err(operand_error());
            }
            Ok(Expr::unary(op, operand, ty))
        }
        UnaryOp::Convert | UnaryOp::TypeAs => Err(operand_error()),
    }
}

/// `-5` is a negative literal rather than a negation node.
fn negate_literal(operand: &Expr) -> Option<ExprRef> {
    let Expr::Constant { value, ty } = operand else {
        return None;
    };
    let negated = match value {
        Value::Int(value) => Value::Int(value.checked_neg()?),
        Value::Long(value) => Value::Long(value.checked_neg()?),
        Value::Float(value) => Value::Float(-value),
        Value::Double(value) => Value::Double(-value),
        Value::Decimal(value) => Value::Decimal(-value),
        _ => return None,
    };
    Some(Expr::constant(negated, ty.clone()))
}

/// Whether `expr` can be the target of an assignment.
pub(crate) fn is_assignable(expr: &Expr) -> bool {
    match expr {
        Expr::Parameter(_) => true,
        Expr::MemberAccess { member, .. } => member.is_writable(),
        Expr::Binary {
            op: BinaryOp::ArrayIndex,
            ..
        } => true,
        _ => false,
    }
}

pub(crate) fn make_assign(
    ranks: &NumericRanks,
    target: ExprRef,
    value: ExprRef,
    token: &Token,
) -> Result<ExprRef, CompileError> {
    if !is_assignable(&target) {
        return Err(CompileError::InvalidAssignment {
            token: target.to_string(),
            offset: token.offset,
        });
    }
    let ty = target.ty();
    let value = implicit(ranks, value, &ty, token)?;
    Ok(Expr::binary(BinaryOp::Assign, target, value, ty))
}

/// Find the `String.Concat(params object[])` overload.
fn concat_method(compiler: &Compiler, token: &Token) -> Result<Arc<MethodInfo>, CompileError> {
    compiler
        .resolver()
        .get_static_methods(&Type::String, "Concat")
        .into_iter()
        .find(|method| method.variadic)
        .ok_or_else(|| CompileError::UnknownMember {
            type_name: Type::String.to_string(),
            name: "Concat".to_string(),
            offset: token.offset,
        })
}

/// Build `left + right` as a single flattened `String.Concat` call.
pub(crate) fn concat(
    compiler: &Compiler,
    left: ExprRef,
    right: ExprRef,
    token: &Token,
) -> Result<ExprRef, CompileError> {
    let method = concat_method(compiler, token)?;
    let mut args = Vec::new();
    for side in [left, right] {
        match &*side {
            Expr::Call {
                target: None,
                method: inner,
                args: inner_args,
            } if **inner == *method => args.extend(inner_args.iter().cloned()),
            _ => args.push(side),
        }
    }
    Ok(Expr::call(None, method, args))
}

/// Bring the branches of a conditional to one type.
pub(crate) fn unify_branches(
    ranks: &NumericRanks,
    if_true: ExprRef,
    if_false: ExprRef,
    token: &Token,
) -> Result<(ExprRef, ExprRef, Type), CompileError> {
    let (true_ty, false_ty) = (if_true.ty(), if_false.ty());
    if true_ty == false_ty {
        return Ok((if_true, if_false, true_ty));
    }
    let target = if true_ty == Type::Null {
        if false_ty.is_value_type() {
            false_ty.clone().nullable()
        } else {
            false_ty.clone()
        }
    } else if false_ty == Type::Null {
        if true_ty.is_value_type() {
            true_ty.clone().nullable()
        } else {
            true_ty.clone()
        }
    } else if conversion_distance(&false_ty, &true_ty, ranks).is_some() {
        true_ty.clone()
    } else if conversion_distance(&true_ty, &false_ty, ranks).is_some() {
        false_ty.clone()
    } else {
        return Err(mismatch(
            format!("no common type for '{true_ty}' and '{false_ty}'"),
            token,
        ));
    };
    Ok((convert(if_true, &target), convert(if_false, &target), target))
}

/// Describe argument types for overload errors, e.g. `int, string`.
pub(crate) fn describe_args(args: &[ExprRef]) -> String {
    let types: Vec<String> = args.iter().map(|arg| arg.ty().to_string()).collect();
    types.join(", ")
}
