//! Rule-driven rewriting of expression trees.
//!
//! A [`Transformer`] owns a [`RuleSet`]. For each node it first calls
//! [`Transformer::prepare_expression`], then applies the first rule whose shape, operator, child
//! patterns and guard all match, and falls back to [`Transformer::finalize_expression`] when none
//! does. The simplifier and the differentiator are both built this way.

mod comparer;
mod derivative;
mod simplify;

use std::rc::Rc;

pub use comparer::{ExprComparer, are_equivalent};
pub use derivative::{Differentiator, differentiate};
pub use simplify::{Simplifier, simplify};

use crate::ast::{BinaryOp, Expr, ExprRef, UnaryOp};
use crate::builders::nodes;
use crate::error::TransformError;
use crate::types::Type;
use crate::value::Value;

/// The kind of a node, independent of its operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Constant,
    Parameter,
    Unary,
    Binary,
    TypeIs,
    Call,
    New,
    MemberAccess,
    Lambda,
    Block,
    Conditional,
    Invoke,
}

impl Shape {
    pub fn of(expr: &Expr) -> Shape {
        match expr {
            Expr::Constant { .. } => Shape::Constant,
            Expr::Parameter(_) => Shape::Parameter,
            Expr::Unary { .. } => Shape::Unary,
            Expr::Binary { .. } => Shape::Binary,
            Expr::TypeIs { .. } => Shape::TypeIs,
            Expr::Call { .. } => Shape::Call,
            Expr::New { .. } => Shape::New,
            Expr::MemberAccess { .. } => Shape::MemberAccess,
            Expr::Lambda { .. } => Shape::Lambda,
            Expr::Block { .. } => Shape::Block,
            Expr::Conditional { .. } => Shape::Conditional,
            Expr::Invoke { .. } => Shape::Invoke,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Shape::Constant => "constant",
            Shape::Parameter => "parameter",
            Shape::Unary => "unary",
            Shape::Binary => "binary",
            Shape::TypeIs => "type test",
            Shape::Call => "call",
            Shape::New => "new",
            Shape::MemberAccess => "member access",
            Shape::Lambda => "lambda",
            Shape::Block => "block",
            Shape::Conditional => "conditional",
            Shape::Invoke => "invoke",
        }
    }
}

/// Constraint on one child of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Any,
    /// A constant, possibly wrapped in conversions.
    Constant,
    /// A numeric constant equal to one of the values.
    ConstantIn(Vec<f64>),
    Parameter,
    ParameterNamed(String),
    /// A call to a method with this name.
    Call(&'static str),
}

impl Pattern {
    pub fn matches(&self, expr: &Expr) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Constant => expr.is_constant(),
            Pattern::ConstantIn(values) => {
                constant_f64(expr).is_some_and(|value| values.contains(&value))
            }
            Pattern::Parameter => matches!(expr, Expr::Parameter(_)),
            Pattern::ParameterNamed(name) => {
                matches!(expr, Expr::Parameter(param) if param.name == *name)
            }
            Pattern::Call(name) => matches!(expr, Expr::Call { method, .. } if method.name == *name),
        }
    }
}

/// The operator a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Any,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Method(&'static str),
}

impl Operator {
    fn matches(&self, expr: &Expr) -> bool {
        match (self, expr) {
            (Operator::Any, _) => true,
            (Operator::Unary(op), Expr::Unary { op: actual, .. }) => op == actual,
            (Operator::Binary(op), Expr::Binary { op: actual, .. }) => op == actual,
            (Operator::Method(name), Expr::Call { method, .. }) => method.name == *name,
            _ => false,
        }
    }
}

pub type Guard<T> = fn(&T, &Expr) -> bool;
pub type Rewrite<T> = fn(&T, &ExprRef, &[ExprRef]) -> Result<ExprRef, TransformError>;

/// One rewrite: what it matches and what it builds.
pub struct Rule<T> {
    pub name: &'static str,
    shape: Shape,
    operator: Operator,
    /// Empty matches any children.
    children: Vec<Pattern>,
    guard: Option<Guard<T>>,
    rewrite: Rewrite<T>,
}

impl<T> Rule<T> {
    pub fn new(
        name: &'static str,
        shape: Shape,
        operator: Operator,
        children: Vec<Pattern>,
        rewrite: Rewrite<T>,
    ) -> Self {
        Self {
            name,
            shape,
            operator,
            children,
            guard: None,
            rewrite,
        }
    }

    pub fn unary(name: &'static str, op: UnaryOp, operand: Pattern, rewrite: Rewrite<T>) -> Self {
        Self::new(name, Shape::Unary, Operator::Unary(op), vec![operand], rewrite)
    }

    pub fn binary(
        name: &'static str,
        op: BinaryOp,
        left: Pattern,
        right: Pattern,
        rewrite: Rewrite<T>,
    ) -> Self {
        Self::new(name, Shape::Binary, Operator::Binary(op), vec![left, right], rewrite)
    }

    pub fn call(
        name: &'static str,
        method: &'static str,
        args: Vec<Pattern>,
        rewrite: Rewrite<T>,
    ) -> Self {
        Self::new(name, Shape::Call, Operator::Method(method), args, rewrite)
    }

    /// Any node of `shape`.
    pub fn shape(name: &'static str, shape: Shape, rewrite: Rewrite<T>) -> Self {
        Self::new(name, shape, Operator::Any, Vec::new(), rewrite)
    }

    pub fn with_guard(mut self, guard: Guard<T>) -> Self {
        self.guard = Some(guard);
        self
    }

    fn matches(&self, transformer: &T, node: &Expr, children: &[ExprRef]) -> bool {
        Shape::of(node) == self.shape
            && self.operator.matches(node)
            && (self.children.is_empty()
                || (self.children.len() == children.len()
                    && self
                        .children
                        .iter()
                        .zip(children)
                        .all(|(pattern, child)| pattern.matches(child))))
            && self.guard.is_none_or(|guard| guard(transformer, node))
    }
}

impl<T> std::fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("operator", &self.operator)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Rules tried in insertion order.
#[derive(Debug)]
pub struct RuleSet<T> {
    rules: Vec<Rule<T>>,
}

impl<T> Default for RuleSet<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> RuleSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, rule: Rule<T>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first rule matching `node`.
    pub fn find(&self, transformer: &T, node: &Expr, children: &[ExprRef]) -> Option<&Rule<T>> {
        self.rules
            .iter()
            .find(|rule| rule.matches(transformer, node, children))
    }
}

pub trait Transformer: Sized {
    fn rules(&self) -> &RuleSet<Self>;

    /// Runs before rule lookup. By default the children are transformed first.
    fn prepare_expression(&self, node: &ExprRef) -> Result<ExprRef, TransformError> {
        let kids = children(node);
        if kids.is_empty() {
            return Ok(node.clone());
        }
        let rewritten = kids
            .iter()
            .map(|child| self.transform(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(copy_with_children(node, rewritten))
    }

    /// Runs when no rule matches.
    fn finalize_expression(&self, node: &ExprRef) -> Result<ExprRef, TransformError> {
        Err(TransformError::NoRewriteRule {
            shape: Shape::of(node).name(),
            node: node.to_string(),
        })
    }

    fn transform(&self, node: &ExprRef) -> Result<ExprRef, TransformError> {
        let prepared = self.prepare_expression(node)?;
        let kids = children(&prepared);
        match self.rules().find(self, &prepared, &kids) {
            Some(rule) => {
                log::trace!("{} applies to {prepared}", rule.name);
                (rule.rewrite)(self, &prepared, &kids)
            }
            None => self.finalize_expression(&prepared),
        }
    }
}

/// Direct sub-expressions in evaluation order. A call's target comes before its arguments.
pub fn children(node: &Expr) -> Vec<ExprRef> {
    match node {
        Expr::Constant { .. } | Expr::Parameter(_) => Vec::new(),
        Expr::Unary { operand, .. } | Expr::TypeIs { operand, .. } => vec![operand.clone()],
        Expr::Binary { left, right, .. } => vec![left.clone(), right.clone()],
        Expr::Call { target, args, .. } => target.iter().chain(args).cloned().collect(),
        Expr::New { args, .. } => args.clone(),
        Expr::MemberAccess { target, .. } => target.iter().cloned().collect(),
        Expr::Lambda { body, .. } => vec![body.clone()],
        Expr::Block { body, .. } => body.clone(),
        Expr::Conditional {
            test,
            if_true,
            if_false,
            ..
        } => vec![test.clone(), if_true.clone(), if_false.clone()],
        Expr::Invoke { target, args } => std::iter::once(target).chain(args).cloned().collect(),
    }
}

/// A copy of `node` with its children replaced, in the order [`children`] returns them.
pub fn copy_with_children(node: &Expr, children: Vec<ExprRef>) -> ExprRef {
    let mut kids = children.into_iter();
    let mut next = |fallback: &ExprRef| kids.next().unwrap_or_else(|| fallback.clone());
    let copy = match node {
        Expr::Constant { .. } | Expr::Parameter(_) => node.clone(),
        Expr::Unary { op, operand, ty } => Expr::Unary {
            op: *op,
            operand: next(operand),
            ty: ty.clone(),
        },
        Expr::TypeIs { operand, ty } => Expr::TypeIs {
            operand: next(operand),
            ty: ty.clone(),
        },
        Expr::Binary {
            op,
            left,
            right,
            ty,
        } => Expr::Binary {
            op: *op,
            left: next(left),
            right: next(right),
            ty: ty.clone(),
        },
        Expr::Call {
            target,
            method,
            args,
        } => Expr::Call {
            target: target.as_ref().map(&mut next),
            method: method.clone(),
            args: args.iter().map(&mut next).collect(),
        },
        Expr::New { constructor, args } => Expr::New {
            constructor: constructor.clone(),
            args: args.iter().map(&mut next).collect(),
        },
        Expr::MemberAccess { target, member } => Expr::MemberAccess {
            target: target.as_ref().map(&mut next),
            member: member.clone(),
        },
        Expr::Lambda { params, body } => Expr::Lambda {
            params: params.clone(),
            body: next(body),
        },
        Expr::Block { locals, body } => Expr::Block {
            locals: locals.clone(),
            body: body.iter().map(&mut next).collect(),
        },
        Expr::Conditional {
            test,
            if_true,
            if_false,
            ty,
        } => Expr::Conditional {
            test: next(test),
            if_true: next(if_true),
            if_false: next(if_false),
            ty: ty.clone(),
        },
        Expr::Invoke { target, args } => Expr::Invoke {
            target: next(target),
            args: args.iter().map(&mut next).collect(),
        },
    };
    Rc::new(copy)
}

/// Numeric value of a constant node.
pub(crate) fn constant_f64(expr: &Expr) -> Option<f64> {
    expr.constant_value().and_then(Value::as_f64)
}

pub(crate) fn number(value: f64) -> ExprRef {
    Expr::constant(Value::Double(value), Type::Double)
}

pub(crate) fn as_double(expr: ExprRef) -> ExprRef {
    nodes::convert(expr, &Type::Double)
}

fn double_binary(op: BinaryOp, left: ExprRef, right: ExprRef) -> ExprRef {
    Expr::binary(op, as_double(left), as_double(right), Type::Double)
}

pub(crate) fn add(left: ExprRef, right: ExprRef) -> ExprRef {
    double_binary(BinaryOp::Add, left, right)
}

pub(crate) fn sub(left: ExprRef, right: ExprRef) -> ExprRef {
    double_binary(BinaryOp::Subtract, left, right)
}

pub(crate) fn mul(left: ExprRef, right: ExprRef) -> ExprRef {
    double_binary(BinaryOp::Multiply, left, right)
}

pub(crate) fn div(left: ExprRef, right: ExprRef) -> ExprRef {
    double_binary(BinaryOp::Divide, left, right)
}

pub(crate) fn pow(left: ExprRef, right: ExprRef) -> ExprRef {
    double_binary(BinaryOp::Power, left, right)
}

pub(crate) fn neg(operand: ExprRef) -> ExprRef {
    Expr::unary(UnaryOp::Negate, as_double(operand), Type::Double)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Parameter;

    #[test]
    fn copy_with_children_keeps_call_targets_first() {
        let x = Parameter::new("x", Type::Double);
        let sum = add(Expr::parameter(&x), number(1.0));
        let kids = children(&sum);
        assert_eq!(kids.len(), 2);
        let swapped = copy_with_children(&sum, vec![kids[1].clone(), kids[0].clone()]);
        assert_eq!(swapped.to_string(), "(1 + x)");
    }

    #[test]
    fn constant_pattern_sees_through_conversions() {
        let widened = as_double(Expr::constant(Value::Int(0), Type::Int));
        assert!(Pattern::Constant.matches(&widened));
        assert!(Pattern::ConstantIn(vec![0.0]).matches(&widened));
        assert!(!Pattern::ConstantIn(vec![1.0]).matches(&widened));
    }
}
