//! Typed expression trees.
//!
//! Nodes are immutable once built and shared through [`ExprRef`]. Rewriting produces new nodes,
//! so a sub-tree can appear in several trees at once.

use std::fmt::{self, Display};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::Type;
use crate::universe::{ConstructorInfo, MemberInfo, MethodInfo};
use crate::value::Value;

/// Shared handle to an expression node.
pub type ExprRef = Rc<Expr>;

static NEXT_PARAMETER_ID: AtomicUsize = AtomicUsize::new(0);

/// A lambda parameter or block local.
///
/// Every parameter gets a process-unique id, so two parameters that share a name in different
/// scopes never alias at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub id: usize,
    pub name: String,
    pub ty: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            id: NEXT_PARAMETER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            ty,
        }
    }
}

/// Unary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    UnaryPlus,
    Not,
    OnesComplement,
    /// Conversion to the node type.
    Convert,
    /// `expr as T`: the value if it is a `T`, otherwise null.
    TypeAs,
    PreIncrementAssign,
    PreDecrementAssign,
    PostIncrementAssign,
    PostDecrementAssign,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::UnaryPlus => "+",
            UnaryOp::Not => "!",
            UnaryOp::OnesComplement => "~",
            UnaryOp::Convert => "convert",
            UnaryOp::TypeAs => "as",
            UnaryOp::PreIncrementAssign | UnaryOp::PostIncrementAssign => "++",
            UnaryOp::PreDecrementAssign | UnaryOp::PostDecrementAssign => "--",
        }
    }

    /// Whether the operator writes back to its operand.
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            UnaryOp::PreIncrementAssign
                | UnaryOp::PreDecrementAssign
                | UnaryOp::PostIncrementAssign
                | UnaryOp::PostDecrementAssign
        )
    }
}

/// Binary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    // Bitwise or non-short-circuit boolean
    And,
    Or,
    LeftShift,
    RightShift,
    // Short-circuit boolean
    AndAlso,
    OrElse,
    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
    Assign,
    ArrayIndex,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "^",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Coalesce => "??",
            BinaryOp::Assign => "=",
            BinaryOp::ArrayIndex => "[]",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Subtract
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Modulo
                | BinaryOp::Power
        )
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant {
        value: Value,
        ty: Type,
    },
    Parameter(Parameter),
    Unary {
        op: UnaryOp,
        operand: ExprRef,
        ty: Type,
    },
    Binary {
        op: BinaryOp,
        left: ExprRef,
        right: ExprRef,
        ty: Type,
    },
    /// `operand is ty`; always of type `bool`.
    TypeIs {
        operand: ExprRef,
        ty: Type,
    },
    /// Method call. `target` is `None` for static and extension methods; extension calls carry
    /// their receiver as the first argument.
    Call {
        target: Option<ExprRef>,
        method: Arc<MethodInfo>,
        args: Vec<ExprRef>,
    },
    New {
        constructor: Arc<ConstructorInfo>,
        args: Vec<ExprRef>,
    },
    /// Property or field read. `target` is `None` for static members.
    MemberAccess {
        target: Option<ExprRef>,
        member: Arc<MemberInfo>,
    },
    Lambda {
        params: Vec<Parameter>,
        body: ExprRef,
    },
    /// Sequence of expressions over fresh locals; the value is that of the last expression.
    Block {
        locals: Vec<Parameter>,
        body: Vec<ExprRef>,
    },
    Conditional {
        test: ExprRef,
        if_true: ExprRef,
        if_false: ExprRef,
        ty: Type,
    },
    /// Call of a function-typed value.
    Invoke {
        target: ExprRef,
        args: Vec<ExprRef>,
    },
}

impl Expr {
    pub fn constant(value: Value, ty: Type) -> ExprRef {
        Rc::new(Expr::Constant { value, ty })
    }

    pub fn parameter(param: &Parameter) -> ExprRef {
        Rc::new(Expr::Parameter(param.clone()))
    }

    pub fn unary(op: UnaryOp, operand: ExprRef, ty: Type) -> ExprRef {
        Rc::new(Expr::Unary { op, operand, ty })
    }

    pub fn binary(op: BinaryOp, left: ExprRef, right: ExprRef, ty: Type) -> ExprRef {
        Rc::new(Expr::Binary {
            op,
            left,
            right,
            ty,
        })
    }

    pub fn call(target: Option<ExprRef>, method: Arc<MethodInfo>, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::Call {
            target,
            method,
            args,
        })
    }

    pub fn conditional(test: ExprRef, if_true: ExprRef, if_false: ExprRef, ty: Type) -> ExprRef {
        Rc::new(Expr::Conditional {
            test,
            if_true,
            if_false,
            ty,
        })
    }

    /// Static type of the node.
    pub fn ty(&self) -> Type {
        match self {
            Expr::Constant { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Conditional { ty, .. } => ty.clone(),
            Expr::Parameter(param) => param.ty.clone(),
            Expr::TypeIs { .. } => Type::Bool,
            Expr::Call { method, .. } => method.ret.clone(),
            Expr::New { constructor, .. } => constructor.declaring_type.clone(),
            Expr::MemberAccess { member, .. } => member.ty.clone(),
            Expr::Lambda { params, body } => Type::function(
                params.iter().map(|param| param.ty.clone()).collect(),
                body.ty(),
            ),
            Expr::Block { body, .. } => body.last().map(|last| last.ty()).unwrap_or(Type::Void),
            Expr::Invoke { target, .. } => match target.ty() {
                Type::Function { ret, .. } => *ret,
                _ => Type::Object,
            },
        }
    }

    /// The value of a constant node, looking through conversions of constants.
    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            Expr::Constant { value, .. } => Some(value),
            Expr::Unary {
                op: UnaryOp::Convert,
                operand,
                ..
            } => operand.constant_value(),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant_value().is_some()
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant { value, .. } => match value {
                Value::Null => write!(f, "null"),
                Value::Bool(value) => write!(f, "{value}"),
                Value::String(text) => write!(f, "{text:?}"),
                Value::Char(ch) => write!(f, "{ch:?}"),
                other => write!(f, "{other}"),
            },
            Expr::Parameter(param) => write!(f, "{}", param.name),
            Expr::Unary { op, operand, ty } => match op {
                UnaryOp::Convert => write!(f, "({ty}){operand}"),
                UnaryOp::TypeAs => write!(f, "({operand} as {ty})"),
                UnaryOp::PostIncrementAssign | UnaryOp::PostDecrementAssign => {
                    write!(f, "{operand}{}", op.symbol())
                }
                _ => write!(f, "{}{operand}", op.symbol()),
            },
            Expr::Binary {
                op: BinaryOp::ArrayIndex,
                left,
                right,
                ..
            } => write!(f, "{left}[{right}]"),
            Expr::Binary {
                op, left, right, ..
            } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::TypeIs { operand, ty } => write!(f, "({operand} is {ty})"),
            Expr::Call {
                target,
                method,
                args,
            } => {
                match target {
                    Some(target) => write!(f, "{target}.{}", method.name)?,
                    None => write!(f, "{}.{}", method.declaring_type, method.name)?,
                }
                write!(f, "({})", join(args))
            }
            Expr::New { constructor, args } => {
                write!(f, "new {}({})", constructor.declaring_type, join(args))
            }
            Expr::MemberAccess { target, member } => match target {
                Some(target) => write!(f, "{target}.{}", member.name),
                None => write!(f, "{}.{}", member.declaring_type, member.name),
            },
            Expr::Lambda { params, body } => {
                let names: Vec<&str> = params.iter().map(|param| param.name.as_str()).collect();
                write!(f, "({}) => {body}", names.join(", "))
            }
            Expr::Block { locals, body } => {
                write!(f, "{{ ")?;
                for local in locals {
                    write!(f, "var {}; ", local.name)?;
                }
                let statements: Vec<String> = body.iter().map(|expr| expr.to_string()).collect();
                write!(f, "{} }}", statements.join("; "))
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => write!(f, "({test} ? {if_true} : {if_false})"),
            Expr::Invoke { target, args } => write!(f, "{target}({})", join(args)),
        }
    }
}

fn join(args: &[ExprRef]) -> String {
    let rendered: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    rendered.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_fully_parenthesized() {
        let x = Parameter::new("x", Type::Double);
        let product = Expr::binary(
            BinaryOp::Multiply,
            Expr::constant(Value::Double(2.0), Type::Double),
            Expr::parameter(&x),
            Type::Double,
        );
        assert_eq!(product.to_string(), "(2 * x)");
        let lambda = Expr::Lambda {
            params: vec![x.clone()],
            body: product,
        };
        assert_eq!(lambda.to_string(), "(x) => (2 * x)");
        assert_eq!(
            lambda.ty(),
            Type::function(vec![Type::Double], Type::Double)
        );
    }

    #[test]
    fn parameters_with_the_same_name_are_distinct() {
        let a = Parameter::new("a", Type::Int);
        let b = Parameter::new("a", Type::Int);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
