//! Tree-walking evaluation of typed expression trees.

use std::cell::RefCell;
use std::rc::Rc;

use rust_decimal::Decimal;

use crate::ast::{BinaryOp, Expr, ExprRef, Parameter, UnaryOp};
use crate::error::EvalError;
use crate::types::Type;
use crate::value::Value;

/// Values of the parameters and locals in scope.
///
/// Frames are shared, so a closure sees assignments made after it was created.
#[derive(Debug, Clone, Default)]
pub struct Env {
    frame: Option<Rc<Frame>>,
}

#[derive(Debug)]
struct Frame {
    ids: Vec<usize>,
    values: RefCell<Vec<Value>>,
    parent: Option<Rc<Frame>>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// A child environment binding `params` to `values` positionally.
    pub fn bind(&self, params: &[Parameter], values: Vec<Value>) -> Env {
        Env {
            frame: Some(Rc::new(Frame {
                ids: params.iter().map(|param| param.id).collect(),
                values: RefCell::new(values),
                parent: self.frame.clone(),
            })),
        }
    }

    fn slot(&self, param: &Parameter) -> Option<(&Frame, usize)> {
        let mut frame = self.frame.as_deref();
        while let Some(current) = frame {
            if let Some(idx) = current.ids.iter().position(|id| *id == param.id) {
                return Some((current, idx));
            }
            frame = current.parent.as_deref();
        }
        None
    }

    pub fn get(&self, param: &Parameter) -> Result<Value, EvalError> {
        let (frame, idx) = self
            .slot(param)
            .ok_or_else(|| EvalError::UnboundParameter(param.name.clone()))?;
        frame
            .values
            .borrow()
            .get(idx)
            .cloned()
            .ok_or_else(|| EvalError::UnboundParameter(param.name.clone()))
    }

    pub fn set(&self, param: &Parameter, value: Value) -> Result<(), EvalError> {
        let (frame, idx) = self
            .slot(param)
            .ok_or_else(|| EvalError::UnboundParameter(param.name.clone()))?;
        let mut values = frame.values.borrow_mut();
        let slot = values
            .get_mut(idx)
            .ok_or_else(|| EvalError::UnboundParameter(param.name.clone()))?;
        *slot = value;
        Ok(())
    }
}

/// A lambda value together with the environment it closed over.
#[derive(Debug)]
pub struct Closure {
    params: Vec<Parameter>,
    body: ExprRef,
    env: Env,
}

impl Closure {
    pub fn ty(&self) -> Type {
        Type::function(
            self.params.iter().map(|param| param.ty.clone()).collect(),
            self.body.ty(),
        )
    }

    /// `(double x) => double`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|param| format!("{} {}", param.ty, param.name))
            .collect();
        format!("({}) => {}", params.join(", "), self.body.ty())
    }

    pub fn invoke(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        if args.len() != self.params.len() {
            return Err(EvalError::ArgumentCount {
                expected: self.params.len(),
                found: args.len(),
            });
        }
        evaluate(&self.body, &self.env.bind(&self.params, args))
    }
}

/// A tree ready to run. Lambdas take their arguments positionally.
#[derive(Debug, Clone)]
pub struct Compiled {
    tree: ExprRef,
}

impl Compiled {
    pub fn new(tree: ExprRef) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &ExprRef {
        &self.tree
    }

    /// Run the tree. Arguments are converted to the parameter types first.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, EvalError> {
        let Expr::Lambda { params, body } = &*self.tree else {
            if !args.is_empty() {
                return Err(EvalError::ArgumentCount {
                    expected: 0,
                    found: args.len(),
                });
            }
            return evaluate(&self.tree, &Env::new());
        };
        if args.len() != params.len() {
            return Err(EvalError::ArgumentCount {
                expected: params.len(),
                found: args.len(),
            });
        }
        let values = args
            .iter()
            .zip(params)
            .map(|(arg, param)| arg.convert_to(&param.ty))
            .collect::<Result<Vec<_>, _>>()?;
        evaluate(body, &Env::new().bind(params, values))
    }
}

/// Evaluate `expr` in `env`.
pub fn evaluate(expr: &Expr, env: &Env) -> Result<Value, EvalError> {
    match expr {
        Expr::Constant { value, .. } => Ok(value.clone()),
        Expr::Parameter(param) => env.get(param),
        Expr::Unary { op, operand, ty } => evaluate_unary(*op, operand, ty, env),
        Expr::Binary {
            op, left, right, ..
        } => evaluate_binary(*op, left, right, env),
        Expr::TypeIs { operand, ty } => {
            Ok(Value::Bool(evaluate(operand, env)?.is_instance_of(ty)))
        }
        Expr::Call {
            target,
            method,
            args,
        } => {
            let mut values = Vec::with_capacity(args.len() + 1);
            if let Some(target) = target {
                values.push(receiver(target, &method.declaring_type, env)?);
            }
            for arg in args {
                values.push(evaluate(arg, env)?);
            }
            method.invoke(&values)
        }
        Expr::New { constructor, args } => {
            let values = evaluate_all(args, env)?;
            constructor.invoke(&values)
        }
        Expr::MemberAccess { target, member } => match target {
            Some(target) => {
                let target = receiver(target, &member.declaring_type, env)?;
                member.get(Some(&target))
            }
            None => member.get(None),
        },
        Expr::Lambda { params, body } => Ok(Value::Function(Rc::new(Closure {
            params: params.clone(),
            body: body.clone(),
            env: env.clone(),
        }))),
        Expr::Block { locals, body } => {
            let defaults = locals
                .iter()
                .map(|local| Value::default_for(&local.ty))
                .collect();
            let env = env.bind(locals, defaults);
            let mut last = Value::Null;
            for expr in body {
                last = evaluate(expr, &env)?;
            }
            Ok(last)
        }
        Expr::Conditional {
            test,
            if_true,
            if_false,
            ..
        } => {
            if evaluate(test, env)?.as_bool()? {
                evaluate(if_true, env)
            } else {
                evaluate(if_false, env)
            }
        }
        Expr::Invoke { target, args } => match evaluate(target, env)? {
            Value::Function(closure) => closure.invoke(evaluate_all(args, env)?),
            Value::Null => Err(EvalError::NullReference),
            other => Err(EvalError::TypeMismatch {
                op: "invoke",
                left: other.type_name(),
                right: "arguments",
            }),
        },
    }
}

fn evaluate_all(exprs: &[ExprRef], env: &Env) -> Result<Vec<Value>, EvalError> {
    exprs.iter().map(|expr| evaluate(expr, env)).collect()
}

/// Evaluate a member receiver. Only `Nullable` members may be reached through null.
fn receiver(target: &Expr, declaring_type: &Type, env: &Env) -> Result<Value, EvalError> {
    let value = evaluate(target, env)?;
    if value.is_null() && !declaring_type.is_nullable() {
        return Err(EvalError::NullReference);
    }
    Ok(value)
}

fn evaluate_unary(op: UnaryOp, operand: &Expr, ty: &Type, env: &Env) -> Result<Value, EvalError> {
    if op.is_assignment() {
        let current = evaluate(operand, env)?;
        let delta = match op {
            UnaryOp::PreIncrementAssign | UnaryOp::PostIncrementAssign => 1,
            _ => -1,
        };
        let next = step(&current, delta)?;
        assign(operand, next.clone(), env)?;
        return Ok(match op {
            UnaryOp::PreIncrementAssign | UnaryOp::PreDecrementAssign => next,
            _ => current,
        });
    }

    let value = evaluate(operand, env)?;
    match op {
        UnaryOp::Convert => value.convert_to(ty),
        UnaryOp::TypeAs => Ok(if value.is_instance_of(ty) {
            value
        } else {
            Value::Null
        }),
        _ if value.is_null() => Ok(Value::Null),
        UnaryOp::UnaryPlus => Ok(value),
        UnaryOp::Negate => negate(&value),
        UnaryOp::Not => Ok(Value::Bool(!value.as_bool()?)),
        UnaryOp::OnesComplement => match value {
            Value::Int(value) => Ok(Value::Int(!value)),
            Value::Long(value) => Ok(Value::Long(!value)),
            other => Err(EvalError::TypeMismatch {
                op: "~",
                left: other.type_name(),
                right: "",
            }),
        },
        _ => Err(EvalError::TypeMismatch {
            op: op.symbol(),
            left: value.type_name(),
            right: "",
        }),
    }
}

fn negate(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Int(value) => value.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
        Value::Long(value) => value.checked_neg().map(Value::Long).ok_or(EvalError::Overflow),
        Value::Float(value) => Ok(Value::Float(-value)),
        Value::Double(value) => Ok(Value::Double(-value)),
        Value::Decimal(value) => Ok(Value::Decimal(-value)),
        other => Err(EvalError::TypeMismatch {
            op: "-",
            left: other.type_name(),
            right: "",
        }),
    }
}

/// `value + delta` in the value's own type, for `++` and `--`.
fn step(value: &Value, delta: i8) -> Result<Value, EvalError> {
    let wide = i64::from(delta);
    match value {
        Value::Null => Ok(Value::Null),
        Value::Byte(value) => Ok(Value::Byte(value.wrapping_add_signed(delta))),
        Value::Short(value) => Ok(Value::Short(value.wrapping_add(i16::from(delta)))),
        Value::Int(value) => value
            .checked_add(i32::from(delta))
            .map(Value::Int)
            .ok_or(EvalError::Overflow),
        Value::Long(value) => value
            .checked_add(wide)
            .map(Value::Long)
            .ok_or(EvalError::Overflow),
        Value::Char(value) => u32::try_from(i64::from(u32::from(*value)) + wide)
            .ok()
            .and_then(char::from_u32)
            .map(Value::Char)
            .ok_or(EvalError::Overflow),
        Value::Float(value) => Ok(Value::Float(value + f32::from(delta))),
        Value::Double(value) => Ok(Value::Double(value + f64::from(delta))),
        Value::Decimal(value) => Ok(Value::Decimal(value + Decimal::from(delta))),
        other => Err(EvalError::TypeMismatch {
            op: "++",
            left: other.type_name(),
            right: "",
        }),
    }
}

fn evaluate_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    env: &Env,
) -> Result<Value, EvalError> {
    match op {
        BinaryOp::AndAlso => {
            let value = evaluate(left, env)?.as_bool()? && evaluate(right, env)?.as_bool()?;
            return Ok(Value::Bool(value));
        }
        BinaryOp::OrElse => {
            let value = evaluate(left, env)?.as_bool()? || evaluate(right, env)?.as_bool()?;
            return Ok(Value::Bool(value));
        }
        BinaryOp::Coalesce => {
            let value = evaluate(left, env)?;
            return if value.is_null() {
                evaluate(right, env)
            } else {
                Ok(value)
            };
        }
        BinaryOp::Assign => {
            let value = evaluate(right, env)?;
            assign(left, value.clone(), env)?;
            return Ok(value);
        }
        _ => {}
    }

    let left = evaluate(left, env)?;
    let right = evaluate(right, env)?;
    match op {
        BinaryOp::Equal => Ok(Value::Bool(left.equals(&right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!left.equals(&right))),
        BinaryOp::ArrayIndex => {
            let array = match left {
                Value::Array(array) => array,
                other => return Err(not_an_array(&other)),
            };
            let items = array.items.borrow();
            let idx = index(&right, items.len())?;
            Ok(items[idx].clone())
        }
        // Lifted comparisons with null are false.
        _ if op.is_comparison() && (left.is_null() || right.is_null()) => Ok(Value::Bool(false)),
        _ if op.is_comparison() => {
            let ordering = left.compare(&right)?;
            Ok(Value::Bool(match op {
                BinaryOp::LessThan => ordering.is_lt(),
                BinaryOp::LessThanOrEqual => ordering.is_le(),
                BinaryOp::GreaterThan => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        // Lifted arithmetic with null is null.
        _ if left.is_null() || right.is_null() => Ok(Value::Null),
        _ => left.arithmetic(op, &right),
    }
}

fn not_an_array(value: &Value) -> EvalError {
    if value.is_null() {
        EvalError::NullReference
    } else {
        EvalError::TypeMismatch {
            op: "[]",
            left: value.type_name(),
            right: "int",
        }
    }
}

fn index(value: &Value, len: usize) -> Result<usize, EvalError> {
    let index = value.as_i64().ok_or(EvalError::NullReference)?;
    usize::try_from(index)
        .ok()
        .filter(|idx| *idx < len)
        .ok_or(EvalError::IndexOutOfRange { index, len })
}

fn assign(target: &Expr, value: Value, env: &Env) -> Result<(), EvalError> {
    match target {
        Expr::Parameter(param) => env.set(param, value),
        Expr::MemberAccess { target, member } => match target {
            Some(target) => {
                let target = receiver(target, &member.declaring_type, env)?;
                member.set(Some(&target), value)
            }
            None => member.set(None, value),
        },
        Expr::Binary {
            op: BinaryOp::ArrayIndex,
            left,
            right,
            ..
        } => {
            let array = evaluate(left, env)?;
            let idx = evaluate(right, env)?;
            let array = match array {
                Value::Array(array) => array,
                other => return Err(not_an_array(&other)),
            };
            let mut items = array.items.borrow_mut();
            let idx = index(&idx, items.len())?;
            items[idx] = value;
            Ok(())
        }
        other => Err(EvalError::Native(format!("'{other}' is not assignable"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_see_later_assignments() {
        let x = Parameter::new("x", Type::Int);
        let env = Env::new().bind(std::slice::from_ref(&x), vec![Value::Int(1)]);
        let closure = Closure {
            params: Vec::new(),
            body: Expr::parameter(&x),
            env: env.clone(),
        };
        env.set(&x, Value::Int(5)).unwrap();
        assert_eq!(closure.invoke(Vec::new()).unwrap(), Value::Int(5));
    }

    #[test]
    fn unbound_parameters_are_reported() {
        let y = Parameter::new("y", Type::Int);
        assert_eq!(
            evaluate(&Expr::Parameter(y), &Env::new()),
            Err(EvalError::UnboundParameter("y".to_string()))
        );
    }

    #[test]
    fn step_wraps_small_types_and_checks_int() {
        assert_eq!(step(&Value::Byte(255), 1).unwrap(), Value::Byte(0));
        assert_eq!(step(&Value::Int(i32::MAX), 1), Err(EvalError::Overflow));
        assert_eq!(step(&Value::Char('a'), 1).unwrap(), Value::Char('b'));
    }
}
