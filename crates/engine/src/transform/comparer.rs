//! Structural equality of expression trees up to renaming of bound parameters.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::ast::{Expr, ExprRef, Parameter};
use crate::error::TransformError;
use crate::value::{Value, float_bits};

use super::{Shape, children, simplify};

/// Compares trees node by node. Lambda parameters and block locals are matched by position, so
/// `(a) => a + 1` equals `(b) => b + 1`; free parameters must agree on name and type.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExprComparer;

/// Pairs of bound parameters in scope, innermost last.
type Bindings = Vec<(usize, usize)>;

impl ExprComparer {
    pub fn equals(&self, a: &Expr, b: &Expr) -> bool {
        equals_in(a, b, &mut Vec::new())
    }

    /// A hash consistent with [`ExprComparer::equals`].
    pub fn hash(&self, expr: &Expr) -> u64 {
        let mut hasher = DefaultHasher::new();
        hash_in(expr, &mut Vec::new(), &mut hasher);
        hasher.finish()
    }
}

fn bind(bindings: &mut Bindings, left: &[Parameter], right: &[Parameter]) -> usize {
    bindings.extend(left.iter().zip(right).map(|(a, b)| (a.id, b.id)));
    left.len()
}

fn same_parameter(a: &Parameter, b: &Parameter, bindings: &Bindings) -> bool {
    let left = bindings.iter().rposition(|(id, _)| *id == a.id);
    let right = bindings.iter().rposition(|(_, id)| *id == b.id);
    match (left, right) {
        (Some(left), Some(right)) => left == right,
        (None, None) => a.id == b.id || (a.name == b.name && a.ty == b.ty),
        _ => false,
    }
}

fn same_types(left: &[Parameter], right: &[Parameter]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(a, b)| a.ty == b.ty)
}

fn equals_in(a: &Expr, b: &Expr, bindings: &mut Bindings) -> bool {
    if Shape::of(a) != Shape::of(b) || a.ty() != b.ty() {
        return false;
    }
    let same_node = match (a, b) {
        (Expr::Constant { value: x, .. }, Expr::Constant { value: y, .. }) => x.equals(y),
        (Expr::Parameter(x), Expr::Parameter(y)) => return same_parameter(x, y, bindings),
        (Expr::Unary { op: x, .. }, Expr::Unary { op: y, .. }) => x == y,
        (Expr::Binary { op: x, .. }, Expr::Binary { op: y, .. }) => x == y,
        (Expr::TypeIs { ty: x, .. }, Expr::TypeIs { ty: y, .. }) => x == y,
        (
            Expr::Call {
                target: left_target,
                method: x,
                ..
            },
            Expr::Call {
                target: right_target,
                method: y,
                ..
            },
        ) => {
            left_target.is_some() == right_target.is_some()
                && x.name == y.name
                && x.declaring_type == y.declaring_type
                && x.params == y.params
        }
        (Expr::New { constructor: x, .. }, Expr::New { constructor: y, .. }) => {
            x.declaring_type == y.declaring_type && x.params == y.params
        }
        (
            Expr::MemberAccess {
                target: left_target,
                member: x,
            },
            Expr::MemberAccess {
                target: right_target,
                member: y,
            },
        ) => {
            left_target.is_some() == right_target.is_some()
                && x.name == y.name
                && x.declaring_type == y.declaring_type
        }
        (Expr::Lambda { params: x, .. }, Expr::Lambda { params: y, .. }) => {
            if !same_types(x, y) {
                return false;
            }
            return scoped(a, b, x, y, bindings);
        }
        (Expr::Block { locals: x, .. }, Expr::Block { locals: y, .. }) => {
            if !same_types(x, y) {
                return false;
            }
            return scoped(a, b, x, y, bindings);
        }
        (Expr::Conditional { .. }, Expr::Conditional { .. })
        | (Expr::Invoke { .. }, Expr::Invoke { .. }) => true,
        _ => false,
    };
    same_node && same_children(a, b, bindings)
}

fn scoped(
    a: &Expr,
    b: &Expr,
    left: &[Parameter],
    right: &[Parameter],
    bindings: &mut Bindings,
) -> bool {
    let added = bind(bindings, left, right);
    let result = same_children(a, b, bindings);
    bindings.truncate(bindings.len() - added);
    result
}

fn same_children(a: &Expr, b: &Expr, bindings: &mut Bindings) -> bool {
    let left = children(a);
    let right = children(b);
    left.len() == right.len()
        && left
            .iter()
            .zip(&right)
            .all(|(x, y)| equals_in(x, y, bindings))
}

/// Numbers hash by magnitude since [`Value::equals`] compares them across numeric types.
fn hash_constant(value: &Value, state: &mut impl Hasher) {
    match value.as_f64() {
        Some(number) => float_bits(number).hash(state),
        None => value.hash(state),
    }
}

fn hash_in(expr: &Expr, scope: &mut Vec<usize>, state: &mut impl Hasher) {
    Shape::of(expr).hash(state);
    expr.ty().hash(state);
    let mut added = 0;
    match expr {
        Expr::Constant { value, .. } => hash_constant(value, state),
        Expr::Parameter(param) => match scope.iter().rposition(|id| *id == param.id) {
            Some(position) => position.hash(state),
            None => param.name.hash(state),
        },
        Expr::Unary { op, .. } => op.hash(state),
        Expr::Binary { op, .. } => op.hash(state),
        Expr::TypeIs { ty, .. } => ty.hash(state),
        Expr::Call { method, .. } => method.name.hash(state),
        Expr::New { constructor, .. } => constructor.declaring_type.hash(state),
        Expr::MemberAccess { member, .. } => member.name.hash(state),
        Expr::Lambda { params, .. } | Expr::Block { locals: params, .. } => {
            scope.extend(params.iter().map(|param| param.id));
            added = params.len();
        }
        Expr::Conditional { .. } | Expr::Invoke { .. } => {}
    }
    for child in children(expr) {
        hash_in(&child, scope, state);
    }
    scope.truncate(scope.len() - added);
}

/// Whether two trees are equal once both are simplified.
pub fn are_equivalent(a: &ExprRef, b: &ExprRef) -> Result<bool, TransformError> {
    let comparer = ExprComparer;
    Ok(comparer.equals(&*simplify(a)?, &*simplify(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;

    #[test]
    fn bound_parameters_compare_by_position() {
        let compiler = Compiler::standard();
        let a = compiler.parse("(double a) => a * 2").unwrap();
        let b = compiler.parse("(double b) => b * 2").unwrap();
        let c = compiler.parse("(double a, double b) => b * 2").unwrap();
        let comparer = ExprComparer;
        assert!(comparer.equals(&a, &b));
        assert_eq!(comparer.hash(&a), comparer.hash(&b));
        assert!(!comparer.equals(&a, &c));
    }

    #[test]
    fn lambda_parameter_types_matter() {
        let compiler = Compiler::standard();
        let a = compiler.parse("(int a) => 1").unwrap();
        let b = compiler.parse("(double a) => 1").unwrap();
        assert!(!ExprComparer.equals(&a, &b));
    }

    #[test]
    fn equal_constants_hash_alike() {
        use crate::types::Type;
        use rust_decimal::Decimal;

        let pairs = [
            (Value::Double(-0.0), Value::Double(0.0), Type::Double),
            (
                Value::Decimal(Decimal::new(10, 1)),
                Value::Decimal(Decimal::new(100, 2)),
                Type::Decimal,
            ),
            (Value::Int(1), Value::Double(1.0), Type::Object),
        ];
        let comparer = ExprComparer;
        for (left, right, ty) in pairs {
            let a = Expr::constant(left, ty.clone());
            let b = Expr::constant(right, ty);
            assert!(comparer.equals(&a, &b), "{a} should equal {b}");
            assert_eq!(comparer.hash(&a), comparer.hash(&b), "{a} and {b} hash apart");
        }
    }

    #[test]
    fn equivalence_simplifies_first() {
        let compiler = Compiler::standard();
        let a = compiler
            .parse_with("x * 1 + 0", &["x"], &[crate::types::Type::Double])
            .unwrap();
        let b = compiler
            .parse_with("x", &["x"], &[crate::types::Type::Double])
            .unwrap();
        assert!(are_equivalent(&a, &b).unwrap());
    }
}
