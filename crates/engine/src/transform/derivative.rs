//! Symbolic differentiation with respect to one named parameter.

use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{BinaryOp, Expr, ExprRef, UnaryOp};
use crate::compiler::Compiler;
use crate::error::TransformError;
use crate::types::Type;
use crate::universe::MethodInfo;

use super::{
    Pattern, Rule, RuleSet, Shape, Simplifier, Transformer, add, as_double, constant_f64, div,
    mul, neg, number, pow, sub,
};

const MATH: &str = "System.Math";

/// Differentiates every node it is given with respect to `variable`.
///
/// Children are not rewritten ahead of the node: each rule differentiates the children it needs.
#[derive(Debug)]
pub struct Differentiator {
    variable: String,
    rules: RuleSet<Differentiator>,
    sin: Arc<MethodInfo>,
    cos: Arc<MethodInfo>,
    log: Arc<MethodInfo>,
}

fn math_method(compiler: &Compiler, name: &str) -> Result<Arc<MethodInfo>, TransformError> {
    let math = Type::named(MATH);
    compiler
        .resolver()
        .get_static_methods(&math, name)
        .into_iter()
        .find(|method| method.params == [Type::Double])
        .ok_or_else(|| TransformError::UnknownMethod {
            type_name: MATH.to_string(),
            name: name.to_string(),
        })
}

impl Differentiator {
    pub fn new(compiler: &Compiler, variable: &str) -> Result<Self, TransformError> {
        Ok(Self {
            variable: variable.to_string(),
            rules: rules(),
            sin: math_method(compiler, "Sin")?,
            cos: math_method(compiler, "Cos")?,
            log: math_method(compiler, "Log")?,
        })
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    fn d(&self, expr: &ExprRef) -> Result<ExprRef, TransformError> {
        self.transform(expr)
    }

    fn apply(&self, method: &Arc<MethodInfo>, arg: &ExprRef) -> ExprRef {
        Expr::call(None, method.clone(), vec![as_double(arg.clone())])
    }
}

impl Transformer for Differentiator {
    fn rules(&self) -> &RuleSet<Self> {
        &self.rules
    }

    fn prepare_expression(&self, node: &ExprRef) -> Result<ExprRef, TransformError> {
        Ok(node.clone())
    }
}

fn is_variable(d: &Differentiator, node: &Expr) -> bool {
    matches!(node, Expr::Parameter(param) if param.name == d.variable)
}

fn is_static_member(_: &Differentiator, node: &Expr) -> bool {
    matches!(node, Expr::MemberAccess { target: None, .. })
}

fn is_math(_: &Differentiator, node: &Expr) -> bool {
    matches!(
        node,
        Expr::Call { target: None, method, .. }
            if matches!(&method.declaring_type, Type::Named { name, .. } if name == MATH)
    )
}

fn zero(_: &Differentiator, _: &ExprRef, _: &[ExprRef]) -> Result<ExprRef, TransformError> {
    Ok(number(0.0))
}

type DiffRule = Rule<Differentiator>;

fn rules() -> RuleSet<Differentiator> {
    RuleSet::new()
        .with(DiffRule::shape("constant", Shape::Constant, zero))
        .with(
            DiffRule::shape("variable", Shape::Parameter, |_, _, _| Ok(number(1.0)))
                .with_guard(is_variable),
        )
        .with(DiffRule::shape("other-parameter", Shape::Parameter, zero))
        .with(
            DiffRule::shape("static-member", Shape::MemberAccess, zero)
                .with_guard(is_static_member),
        )
        .with(DiffRule::unary("negate", UnaryOp::Negate, Pattern::Any, |d, _, kids| {
            Ok(neg(d.d(&kids[0])?))
        }))
        .with(DiffRule::unary("plus", UnaryOp::UnaryPlus, Pattern::Any, |d, _, kids| {
            d.d(&kids[0])
        }))
        .with(DiffRule::unary("convert", UnaryOp::Convert, Pattern::Any, |d, _, kids| {
            d.d(&kids[0])
        }))
        .with(DiffRule::binary("sum", BinaryOp::Add, Pattern::Any, Pattern::Any, |d, _, kids| {
            Ok(add(d.d(&kids[0])?, d.d(&kids[1])?))
        }))
        .with(DiffRule::binary(
            "difference",
            BinaryOp::Subtract,
            Pattern::Any,
            Pattern::Any,
            |d, _, kids| Ok(sub(d.d(&kids[0])?, d.d(&kids[1])?)),
        ))
        .with(DiffRule::binary(
            "product",
            BinaryOp::Multiply,
            Pattern::Any,
            Pattern::Any,
            |d, _, kids| {
                let (u, v) = (&kids[0], &kids[1]);
                Ok(add(mul(d.d(u)?, v.clone()), mul(u.clone(), d.d(v)?)))
            },
        ))
        .with(DiffRule::binary(
            "quotient",
            BinaryOp::Divide,
            Pattern::Any,
            Pattern::Any,
            |d, _, kids| {
                let (u, v) = (&kids[0], &kids[1]);
                let numerator = sub(mul(d.d(u)?, v.clone()), mul(u.clone(), d.d(v)?));
                Ok(div(numerator, pow(v.clone(), number(2.0))))
            },
        ))
        .with(DiffRule::binary(
            "constant-power",
            BinaryOp::Power,
            Pattern::Any,
            Pattern::Constant,
            constant_power,
        ))
        .with(DiffRule::binary(
            "power",
            BinaryOp::Power,
            Pattern::Any,
            Pattern::Any,
            general_power,
        ))
        .with(
            DiffRule::call("pow", "Pow", vec![Pattern::Any, Pattern::Any], |d, _, kids| {
                d.d(&pow(kids[0].clone(), kids[1].clone()))
            })
            .with_guard(is_math),
        )
        .with(
            DiffRule::call("exp", "Exp", vec![Pattern::Any], |d, node, kids| {
                Ok(mul(node.clone(), d.d(&kids[0])?))
            })
            .with_guard(is_math),
        )
        .with(
            DiffRule::call("log", "Log", vec![Pattern::Any], |d, _, kids| {
                Ok(div(d.d(&kids[0])?, kids[0].clone()))
            })
            .with_guard(is_math),
        )
        .with(
            DiffRule::call("log-base", "Log", vec![Pattern::Any, Pattern::Any], |d, _, kids| {
                let ratio = div(d.apply(&d.log, &kids[0]), d.apply(&d.log, &kids[1]));
                d.d(&ratio)
            })
            .with_guard(is_math),
        )
        .with(
            DiffRule::call("log10", "Log10", vec![Pattern::Any], |d, _, kids| {
                let u = &kids[0];
                Ok(div(d.d(u)?, mul(u.clone(), number(std::f64::consts::LN_10))))
            })
            .with_guard(is_math),
        )
        .with(
            DiffRule::call("sin", "Sin", vec![Pattern::Any], |d, _, kids| {
                let u = &kids[0];
                Ok(mul(d.apply(&d.cos, u), d.d(u)?))
            })
            .with_guard(is_math),
        )
        .with(
            DiffRule::call("cos", "Cos", vec![Pattern::Any], |d, _, kids| {
                let u = &kids[0];
                Ok(mul(neg(d.apply(&d.sin, u)), d.d(u)?))
            })
            .with_guard(is_math),
        )
        .with(
            DiffRule::call("tan", "Tan", vec![Pattern::Any], |d, _, kids| {
                let u = &kids[0];
                d.d(&div(d.apply(&d.sin, u), d.apply(&d.cos, u)))
            })
            .with_guard(is_math),
        )
        .with(
            DiffRule::call("sqrt", "Sqrt", vec![Pattern::Any], |d, node, kids| {
                Ok(div(d.d(&kids[0])?, mul(number(2.0), node.clone())))
            })
            .with_guard(is_math),
        )
        .with(DiffRule::shape("conditional", Shape::Conditional, |d, _, kids| {
            Ok(Expr::conditional(
                kids[0].clone(),
                as_double(d.d(&kids[1])?),
                as_double(d.d(&kids[2])?),
                Type::Double,
            ))
        }))
        .with(DiffRule::shape("lambda", Shape::Lambda, |d, node, kids| {
            let Expr::Lambda { params, .. } = &**node else {
                return Ok(node.clone());
            };
            Ok(Rc::new(Expr::Lambda {
                params: params.clone(),
                body: d.d(&kids[0])?,
            }))
        }))
}

/// `u ^ n` for constant `n` is `n * u ^ (n - 1) * du`.
fn constant_power(
    d: &Differentiator,
    _: &ExprRef,
    kids: &[ExprRef],
) -> Result<ExprRef, TransformError> {
    let (u, n) = (&kids[0], &kids[1]);
    let lowered = match constant_f64(n) {
        Some(value) => number(value - 1.0),
        None => sub(n.clone(), number(1.0)),
    };
    Ok(mul(mul(n.clone(), pow(u.clone(), lowered)), d.d(u)?))
}

/// `u ^ v` is `u ^ v * (dv * ln u + v * du / u)`.
fn general_power(
    d: &Differentiator,
    node: &ExprRef,
    kids: &[ExprRef],
) -> Result<ExprRef, TransformError> {
    let (u, v) = (&kids[0], &kids[1]);
    let via_log = mul(d.d(v)?, d.apply(&d.log, u));
    let via_base = div(mul(v.clone(), d.d(u)?), u.clone());
    Ok(mul(node.clone(), add(via_log, via_base)))
}

/// Derivative of `tree` with respect to the parameter named `variable`, simplified before and
/// after differentiating.
pub fn differentiate(
    compiler: &Compiler,
    tree: &ExprRef,
    variable: &str,
) -> Result<ExprRef, TransformError> {
    let simplifier = Simplifier::new();
    let differentiator = Differentiator::new(compiler, variable)?;
    let prepared = simplifier.simplify(tree)?;
    log::debug!("differentiating {prepared} with respect to {variable}");
    let derivative = differentiator.transform(&prepared)?;
    simplifier.simplify(&derivative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derivative_of(text: &str) -> String {
        let compiler = Compiler::standard();
        let tree = compiler
            .parse_with(text, &["x", "y"], &[Type::Double, Type::Double])
            .unwrap();
        let Expr::Lambda { body, .. } = &*differentiate(&compiler, &tree, "x").unwrap() else {
            panic!("expected a lambda");
        };
        body.to_string()
    }

    #[test]
    fn polynomial_terms() {
        assert_eq!(derivative_of("x ^ 2"), "(2 * x)");
        assert_eq!(derivative_of("3 * x"), "3");
        assert_eq!(derivative_of("x + y"), "1");
        assert_eq!(derivative_of("y * y"), "0");
    }

    #[test]
    fn trigonometry() {
        assert_eq!(derivative_of("Math.Sin(x)"), "Math.Cos(x)");
        assert_eq!(derivative_of("Math.Cos(x)"), "-Math.Sin(x)");
    }

    #[test]
    fn exponential_keeps_itself() {
        assert_eq!(derivative_of("Math.Exp(x)"), "Math.Exp(x)");
    }

    #[test]
    fn unsupported_nodes_are_reported() {
        let compiler = Compiler::standard();
        let tree = compiler
            .parse_with("x > 1 ? x : \"a\".Length", &["x"], &[Type::Double])
            .unwrap();
        let err = differentiate(&compiler, &tree, "x").unwrap_err();
        assert!(matches!(err, TransformError::NoRewriteRule { shape: "member access", .. }));
    }
}
