//! Algebraic simplification: constant folding and the usual identities.

use crate::ast::{BinaryOp, Expr, ExprRef, UnaryOp};
use crate::error::TransformError;
use crate::eval::{Env, evaluate};
use crate::types::Type;
use crate::value::Value;

use super::{
    ExprComparer, Operator, Pattern, Rule, RuleSet, Shape, Transformer, children,
    copy_with_children,
};

/// Passes of the whole tree before giving up on reaching a fixpoint.
const MAX_PASSES: usize = 16;

const PURE_CLASSES: [&str; 1] = ["System.Math"];

/// Bottom-up simplifier. Nodes no rule matches are kept as they are.
#[derive(Debug)]
pub struct Simplifier {
    rules: RuleSet<Simplifier>,
    comparer: ExprComparer,
}

impl Default for Simplifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace `node` by a constant of its own type.
fn constant_like(node: &Expr, value: f64) -> Option<ExprRef> {
    let ty = node.ty();
    Value::from_f64(value, &ty).map(|value| Expr::constant(value, ty))
}

/// Fold a node whose operands are all constants, keeping it when evaluation fails.
fn fold(_: &Simplifier, node: &ExprRef, _: &[ExprRef]) -> Result<ExprRef, TransformError> {
    match evaluate(node, &Env::new()) {
        Ok(value) => Ok(Expr::constant(value, node.ty())),
        Err(err) => {
            log::debug!("not folding {node}: {err}");
            Ok(node.clone())
        }
    }
}

fn keep_left(_: &Simplifier, _: &ExprRef, kids: &[ExprRef]) -> Result<ExprRef, TransformError> {
    Ok(kids[0].clone())
}

fn keep_right(_: &Simplifier, _: &ExprRef, kids: &[ExprRef]) -> Result<ExprRef, TransformError> {
    Ok(kids[1].clone())
}

fn zero(_: &Simplifier, node: &ExprRef, _: &[ExprRef]) -> Result<ExprRef, TransformError> {
    Ok(constant_like(node, 0.0).unwrap_or_else(|| node.clone()))
}

fn one(_: &Simplifier, node: &ExprRef, _: &[ExprRef]) -> Result<ExprRef, TransformError> {
    Ok(constant_like(node, 1.0).unwrap_or_else(|| node.clone()))
}

/// Identities only hold for plain numbers; lifted null arithmetic must stay.
fn plain_numeric(_: &Simplifier, node: &Expr) -> bool {
    node.ty().is_numeric()
}

fn floating(_: &Simplifier, node: &Expr) -> bool {
    node.ty().is_floating()
}

fn foldable_unary(_: &Simplifier, node: &Expr) -> bool {
    matches!(node, Expr::Unary { op, .. } if !op.is_assignment())
}

fn foldable_binary(_: &Simplifier, node: &Expr) -> bool {
    matches!(
        node,
        Expr::Binary { op, .. } if !matches!(op, BinaryOp::Assign | BinaryOp::ArrayIndex)
    )
}

fn pure_constant_call(_: &Simplifier, node: &Expr) -> bool {
    let Expr::Call {
        target: None,
        method,
        args,
    } = node
    else {
        return false;
    };
    let pure = matches!(
        &method.declaring_type,
        Type::Named { name, .. } if PURE_CLASSES.contains(&name.as_str())
    );
    pure && args.iter().all(|arg| arg.is_constant())
}

fn same_operands(simplifier: &Simplifier, node: &Expr) -> bool {
    let kids = children(node);
    node.ty().is_numeric() && simplifier.comparer.equals(&kids[0], &kids[1])
}

fn not_constant_left(_: &Simplifier, node: &Expr) -> bool {
    let kids = children(node);
    node.ty().is_numeric() && !kids[0].is_constant()
}

impl Simplifier {
    pub fn new() -> Self {
        let rules = RuleSet::new()
            .with(Rule::new(
                "fold-unary",
                Shape::Unary,
                Operator::Any,
                vec![Pattern::Constant],
                fold,
            )
            .with_guard(foldable_unary))
            .with(Rule::new(
                "fold-binary",
                Shape::Binary,
                Operator::Any,
                vec![Pattern::Constant, Pattern::Constant],
                fold,
            )
            .with_guard(foldable_binary))
            .with(Rule::shape("fold-call", Shape::Call, fold).with_guard(pure_constant_call))
            .with(
                Rule::binary("add-zero", BinaryOp::Add, Pattern::Any, zero_pattern(), keep_left)
                    .with_guard(plain_numeric),
            )
            .with(
                Rule::binary("zero-add", BinaryOp::Add, zero_pattern(), Pattern::Any, keep_right)
                    .with_guard(plain_numeric),
            )
            .with(
                Rule::binary(
                    "subtract-zero",
                    BinaryOp::Subtract,
                    Pattern::Any,
                    zero_pattern(),
                    keep_left,
                )
                .with_guard(plain_numeric),
            )
            .with(
                Rule::binary(
                    "zero-subtract",
                    BinaryOp::Subtract,
                    zero_pattern(),
                    Pattern::Any,
                    |_, node, kids| Ok(Expr::unary(UnaryOp::Negate, kids[1].clone(), node.ty())),
                )
                .with_guard(plain_numeric),
            )
            .with(
                Rule::binary(
                    "subtract-self",
                    BinaryOp::Subtract,
                    Pattern::Any,
                    Pattern::Any,
                    zero,
                )
                .with_guard(same_operands),
            )
            .with(
                Rule::binary("times-zero", BinaryOp::Multiply, Pattern::Any, zero_pattern(), zero)
                    .with_guard(plain_numeric),
            )
            .with(
                Rule::binary("zero-times", BinaryOp::Multiply, zero_pattern(), Pattern::Any, zero)
                    .with_guard(plain_numeric),
            )
            .with(
                Rule::binary(
                    "times-one",
                    BinaryOp::Multiply,
                    Pattern::Any,
                    one_pattern(),
                    keep_left,
                )
                .with_guard(plain_numeric),
            )
            .with(
                Rule::binary(
                    "one-times",
                    BinaryOp::Multiply,
                    one_pattern(),
                    Pattern::Any,
                    keep_right,
                )
                .with_guard(plain_numeric),
            )
            .with(
                Rule::binary("divide-one", BinaryOp::Divide, Pattern::Any, one_pattern(), keep_left)
                    .with_guard(plain_numeric),
            )
            .with(
                Rule::binary("zero-divide", BinaryOp::Divide, zero_pattern(), Pattern::Any, zero)
                    .with_guard(floating),
            )
            .with(Rule::binary(
                "power-one",
                BinaryOp::Power,
                Pattern::Any,
                one_pattern(),
                keep_left,
            ))
            .with(Rule::binary(
                "power-zero",
                BinaryOp::Power,
                Pattern::Any,
                zero_pattern(),
                one,
            ))
            .with(
                Rule::binary(
                    "gather-constants",
                    BinaryOp::Multiply,
                    Pattern::Constant,
                    Pattern::Any,
                    gather_constants,
                )
                .with_guard(nested_constant_product),
            )
            .with(
                Rule::binary(
                    "constant-first",
                    BinaryOp::Multiply,
                    Pattern::Any,
                    Pattern::Constant,
                    |_, node, kids| {
                        Ok(Expr::binary(
                            BinaryOp::Multiply,
                            kids[1].clone(),
                            kids[0].clone(),
                            node.ty(),
                        ))
                    },
                )
                .with_guard(not_constant_left),
            )
            .with(Rule::unary(
                "double-negation",
                UnaryOp::Negate,
                Pattern::Any,
                |_, node, kids| match &*kids[0] {
                    Expr::Unary {
                        op: UnaryOp::Negate,
                        operand,
                        ..
                    } if operand.ty() == node.ty() => Ok(operand.clone()),
                    _ => Ok(node.clone()),
                },
            ));
        Self {
            rules,
            comparer: ExprComparer,
        }
    }

    /// Simplify until nothing changes, or for at most a fixed number of passes.
    pub fn simplify(&self, tree: &ExprRef) -> Result<ExprRef, TransformError> {
        let mut current = tree.clone();
        for pass in 0..MAX_PASSES {
            let next = self.transform(&current)?;
            if self.comparer.equals(&next, &current) {
                log::trace!("simplified in {} passes", pass + 1);
                return Ok(next);
            }
            current = next;
        }
        log::debug!("simplification of {tree} did not settle");
        Ok(current)
    }
}

fn zero_pattern() -> Pattern {
    Pattern::ConstantIn(vec![0.0])
}

fn one_pattern() -> Pattern {
    Pattern::ConstantIn(vec![1.0])
}

fn nested_constant_product(_: &Simplifier, node: &Expr) -> bool {
    let kids = children(node);
    node.ty().is_numeric()
        && matches!(
            &*kids[1],
            Expr::Binary { op: BinaryOp::Multiply, left, .. } if left.is_constant()
        )
}

/// `c1 * (c2 * x)` becomes `(c1 * c2) * x`.
fn gather_constants(
    simplifier: &Simplifier,
    node: &ExprRef,
    kids: &[ExprRef],
) -> Result<ExprRef, TransformError> {
    let Expr::Binary {
        left: inner_constant,
        right: rest,
        ..
    } = &*kids[1]
    else {
        return Ok(node.clone());
    };
    let ty = node.ty();
    let product = Expr::binary(
        BinaryOp::Multiply,
        kids[0].clone(),
        inner_constant.clone(),
        ty.clone(),
    );
    let product = fold(simplifier, &product, &[])?;
    Ok(copy_with_children(node, vec![product, rest.clone()]))
}

impl Transformer for Simplifier {
    fn rules(&self) -> &RuleSet<Self> {
        &self.rules
    }

    fn finalize_expression(&self, node: &ExprRef) -> Result<ExprRef, TransformError> {
        Ok(node.clone())
    }
}

/// Simplify `tree` with the default rules.
pub fn simplify(tree: &ExprRef) -> Result<ExprRef, TransformError> {
    Simplifier::new().simplify(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;

    fn simplified(text: &str) -> String {
        let compiler = Compiler::standard();
        let tree = compiler
            .parse_with(text, &["x", "y"], &[Type::Double, Type::Double])
            .unwrap();
        let Expr::Lambda { body, .. } = &*simplify(&tree).unwrap() else {
            panic!("expected a lambda");
        };
        body.to_string()
    }

    #[test]
    fn folds_constants() {
        assert_eq!(simplified("1 + 2 * 3"), "7");
        assert_eq!(simplified("Math.Sqrt(16) + x"), "(4 + x)");
    }

    #[test]
    fn applies_identities() {
        assert_eq!(simplified("x * 1 + 0"), "x");
        assert_eq!(simplified("0 * y + x"), "x");
        assert_eq!(simplified("x - x"), "0");
        assert_eq!(simplified("x ^ 1"), "x");
    }

    #[test]
    fn gathers_constants_in_front() {
        assert_eq!(simplified("x * 2"), "(2 * x)");
        assert_eq!(simplified("3 * (2 * x)"), "(6 * x)");
    }

    #[test]
    fn integer_division_by_zero_is_left_for_runtime() {
        let compiler = Compiler::standard();
        let tree = compiler.parse("1 / 0").unwrap();
        assert_eq!(simplify(&tree).unwrap().to_string(), "(1 / 0)");
    }
}
