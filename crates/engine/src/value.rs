//! Runtime value representation for evaluated expression trees.
//!
//! Values mirror the static [`Type`]s one to one. Arrays and objects are shared references so
//! that assignments through one alias are observable through another, as in the host language
//! the trees model.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::ast::BinaryOp;
use crate::error::EvalError;
use crate::eval::Closure;
use crate::types::Type;

/// Result type used for value operations.
pub type ValueResult<T> = Result<T, EvalError>;

/// Runtime value produced by evaluating an expression tree.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    String(Rc<str>),
    Array(ArrayValue),
    Object(Rc<ObjectValue>),
    Function(Rc<Closure>),
}

/// A shared, mutable, one-dimensional array.
#[derive(Debug, Clone)]
pub struct ArrayValue {
    pub element: Type,
    pub items: Rc<RefCell<Vec<Value>>>,
}

/// An instance of a class from the type universe.
///
/// Plain classes keep their state in `fields`; collection classes such as `List<T>` use `items`.
#[derive(Debug)]
pub struct ObjectValue {
    pub ty: Type,
    pub fields: RefCell<BTreeMap<String, Value>>,
    pub items: RefCell<Vec<Value>>,
}

impl ObjectValue {
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            fields: RefCell::new(BTreeMap::new()),
            items: RefCell::new(Vec::new()),
        }
    }

    pub fn field(&self, name: &str) -> Value {
        self.fields.borrow().get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{}", if *value { "True" } else { "False" }),
            Value::Char(value) => write!(f, "{value}"),
            Value::Byte(value) => write!(f, "{value}"),
            Value::Short(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Long(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Double(value) => write!(f, "{value}"),
            Value::Decimal(value) => write!(f, "{value}"),
            Value::String(text) => write!(f, "{text}"),
            Value::Array(array) => {
                let rendered: Vec<String> = array
                    .items
                    .borrow()
                    .iter()
                    .map(|item| item.to_string())
                    .collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Object(object) => {
                let items = object.items.borrow();
                if items.is_empty() {
                    write!(f, "{}", object.ty)
                } else {
                    let rendered: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                    write!(f, "{} [{}]", object.ty, rendered.join(", "))
                }
            }
            Value::Function(closure) => write!(f, "{}", closure.signature()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Double(a), Value::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(&a.items, &b.items),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(value) => value.hash(state),
            Value::Char(value) => value.hash(state),
            Value::Byte(value) => value.hash(state),
            Value::Short(value) => value.hash(state),
            Value::Int(value) => value.hash(state),
            Value::Long(value) => value.hash(state),
            Value::Float(value) => float_bits(f64::from(*value)).hash(state),
            Value::Double(value) => float_bits(*value).hash(state),
            Value::Decimal(value) => value.normalize().hash(state),
            Value::String(text) => text.hash(state),
            Value::Array(array) => Rc::as_ptr(&array.items).hash(state),
            Value::Object(object) => Rc::as_ptr(object).hash(state),
            Value::Function(closure) => Rc::as_ptr(closure).hash(state),
        }
    }
}

/// Bit pattern of `value` with `-0.0` folded onto `0.0`, so equal floats hash alike.
pub(crate) fn float_bits(value: f64) -> u64 {
    if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

impl Value {
    /// Build an array value from its element type and items.
    pub fn array(element: Type, items: Vec<Value>) -> Value {
        Value::Array(ArrayValue {
            element,
            items: Rc::new(RefCell::new(items)),
        })
    }

    /// Returns a static type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// The dynamic type of the value. `null` has type [`Type::Null`].
    pub fn runtime_type(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Bool,
            Value::Char(_) => Type::Char,
            Value::Byte(_) => Type::Byte,
            Value::Short(_) => Type::Short,
            Value::Int(_) => Type::Int,
            Value::Long(_) => Type::Long,
            Value::Float(_) => Type::Float,
            Value::Double(_) => Type::Double,
            Value::Decimal(_) => Type::Decimal,
            Value::String(_) => Type::String,
            Value::Array(array) => Type::array(array.element.clone(), 1),
            Value::Object(object) => object.ty.clone(),
            Value::Function(closure) => closure.ty(),
        }
    }

    /// The zero value of a type: `0` for numbers, `false`, `'\0'`, otherwise `null`.
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Bool => Value::Bool(false),
            Type::Char => Value::Char('\0'),
            Type::Byte => Value::Byte(0),
            Type::Short => Value::Short(0),
            Type::Int => Value::Int(0),
            Type::Long => Value::Long(0),
            Type::Float => Value::Float(0.0),
            Type::Double => Value::Double(0.0),
            Type::Decimal => Value::Decimal(Decimal::ZERO),
            _ => Value::Null,
        }
    }

    /// Build a numeric value of type `ty` from an `f64`. Non-numeric types yield `None`.
    pub fn from_f64(value: f64, ty: &Type) -> Option<Value> {
        Some(match ty.underlying() {
            Type::Byte => Value::Byte(value as u8),
            Type::Short => Value::Short(value as i16),
            Type::Int => Value::Int(value as i32),
            Type::Long => Value::Long(value as i64),
            Type::Float => Value::Float(value as f32),
            Type::Double => Value::Double(value),
            Type::Decimal => Value::Decimal(Decimal::from_f64(value)?),
            _ => return None,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> ValueResult<bool> {
        match self {
            Value::Bool(value) => Ok(*value),
            Value::Null => Err(EvalError::NullReference),
            other => Err(cast_error(other, &Type::Bool)),
        }
    }

    /// Numeric view of the value as `f64`, including chars.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Char(value) => Some(*value as u32 as f64),
            Value::Byte(value) => Some(f64::from(*value)),
            Value::Short(value) => Some(f64::from(*value)),
            Value::Int(value) => Some(f64::from(*value)),
            Value::Long(value) => Some(*value as f64),
            Value::Float(value) => Some(f64::from(*value)),
            Value::Double(value) => Some(*value),
            Value::Decimal(value) => value.to_f64(),
            _ => None,
        }
    }

    /// Integral view of the value as `i64`, including chars. Fractions are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Char(value) => Some(i64::from(*value as u32)),
            Value::Byte(value) => Some(i64::from(*value)),
            Value::Short(value) => Some(i64::from(*value)),
            Value::Int(value) => Some(i64::from(*value)),
            Value::Long(value) => Some(*value),
            Value::Float(value) => Some(*value as i64),
            Value::Double(value) => Some(*value as i64),
            Value::Decimal(value) => value.trunc().to_i64(),
            _ => None,
        }
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(value) => Some(*value),
            Value::Float(value) => Decimal::from_f32(*value),
            Value::Double(value) => Decimal::from_f64(*value),
            other => other.as_i64().map(Decimal::from),
        }
    }

    /// Whether the value is an instance of `ty`. `null` is an instance of nothing.
    pub fn is_instance_of(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Null, _) => false,
            (_, Type::Object) => true,
            (value, Type::Nullable(inner)) => value.is_instance_of(inner),
            (value, ty) => value.runtime_type() == *ty,
        }
    }

    /// Explicit conversion as performed by a cast node.
    pub fn convert_to(&self, ty: &Type) -> ValueResult<Value> {
        if matches!(ty, Type::Object) {
            return Ok(self.clone());
        }
        if self.is_null() {
            return if ty.accepts_null() {
                Ok(Value::Null)
            } else {
                Err(EvalError::NullReference)
            };
        }
        let target = ty.underlying();
        let converted = match target {
            Type::Char => self
                .as_i64()
                .and_then(|code| u32::try_from(code).ok())
                .and_then(char::from_u32)
                .map(Value::Char),
            Type::Byte => self.as_i64().map(|value| Value::Byte(value as u8)),
            Type::Short => self.as_i64().map(|value| Value::Short(value as i16)),
            Type::Int => self.as_i64().map(|value| Value::Int(value as i32)),
            Type::Long => self.as_i64().map(Value::Long),
            Type::Float => self.as_f64().map(|value| Value::Float(value as f32)),
            Type::Double => self.as_f64().map(Value::Double),
            Type::Decimal => self.as_decimal().map(Value::Decimal),
            target if self.is_instance_of(target) => Some(self.clone()),
            _ => None,
        };
        converted.ok_or_else(|| cast_error(self, ty))
    }

    /// Performs a value comparison, returning the ordering if the comparison is valid.
    pub fn compare(&self, other: &Value) -> ValueResult<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Long(a), Value::Long(b)) => Ok(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Ok(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                // NaN compares as unordered, which every relational operator treats as false.
                (Some(x), Some(y)) => Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
                _ => Err(EvalError::TypeMismatch {
                    op: "compare",
                    left: self.type_name(),
                    right: other.type_name(),
                }),
            },
        }
    }

    /// Equality as used by `==`: by value for primitives and strings, by reference otherwise.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (a, b) if a.runtime_type() != b.runtime_type() => {
                match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) if !matches!(a, Value::Char(_)) => x == y,
                    _ => false,
                }
            }
            (a, b) => a == b,
        }
    }

    /// Applies an arithmetic or bitwise operator to two operands of the same numeric type.
    pub fn arithmetic(&self, op: BinaryOp, other: &Value) -> ValueResult<Value> {
        let mismatch = || EvalError::TypeMismatch {
            op: op.symbol(),
            left: self.type_name(),
            right: other.type_name(),
        };
        match (self, other) {
            (Value::Int(a), Value::Int(b)) if op == BinaryOp::LeftShift => {
                Ok(Value::Int(a.wrapping_shl((*b & 31) as u32)))
            }
            (Value::Int(a), Value::Int(b)) if op == BinaryOp::RightShift => {
                Ok(Value::Int(a.wrapping_shr((*b & 31) as u32)))
            }
            (Value::Int(a), Value::Int(b)) => integer_op(op, i64::from(*a), i64::from(*b))
                .and_then(|value| i32::try_from(value).map_err(|_| EvalError::Overflow))
                .map(Value::Int),
            (Value::Long(a), Value::Long(b)) => integer_op(op, *a, *b).map(Value::Long),
            (Value::Float(a), Value::Float(b)) => {
                float_op(op, f64::from(*a), f64::from(*b)).map(|value| Value::Float(value as f32))
            }
            (Value::Double(a), Value::Double(b)) => float_op(op, *a, *b).map(Value::Double),
            (Value::Decimal(a), Value::Decimal(b)) => decimal_op(op, *a, *b).map(Value::Decimal),
            (Value::Bool(a), Value::Bool(b)) => match op {
                BinaryOp::And => Ok(Value::Bool(*a & *b)),
                BinaryOp::Or => Ok(Value::Bool(*a | *b)),
                _ => Err(mismatch()),
            },
            (Value::Null, _) | (_, Value::Null) => Err(EvalError::NullReference),
            _ => Err(mismatch()),
        }
    }
}

fn integer_op(op: BinaryOp, a: i64, b: i64) -> ValueResult<i64> {
    match op {
        BinaryOp::Add => a.checked_add(b).ok_or(EvalError::Overflow),
        BinaryOp::Subtract => a.checked_sub(b).ok_or(EvalError::Overflow),
        BinaryOp::Multiply => a.checked_mul(b).ok_or(EvalError::Overflow),
        BinaryOp::Divide if b == 0 => Err(EvalError::DivideByZero),
        BinaryOp::Divide => a.checked_div(b).ok_or(EvalError::Overflow),
        BinaryOp::Modulo if b == 0 => Err(EvalError::DivideByZero),
        BinaryOp::Modulo => a.checked_rem(b).ok_or(EvalError::Overflow),
        BinaryOp::And => Ok(a & b),
        BinaryOp::Or => Ok(a | b),
        BinaryOp::LeftShift => Ok(a.wrapping_shl((b & 63) as u32)),
        BinaryOp::RightShift => Ok(a.wrapping_shr((b & 63) as u32)),
        BinaryOp::Power => Ok((a as f64).powf(b as f64) as i64),
        _ => Err(EvalError::TypeMismatch {
            op: op.symbol(),
            left: "integer",
            right: "integer",
        }),
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> ValueResult<f64> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Subtract => Ok(a - b),
        BinaryOp::Multiply => Ok(a * b),
        BinaryOp::Divide => Ok(a / b),
        BinaryOp::Modulo => Ok(a % b),
        BinaryOp::Power => Ok(a.powf(b)),
        _ => Err(EvalError::TypeMismatch {
            op: op.symbol(),
            left: "floating point",
            right: "floating point",
        }),
    }
}

fn decimal_op(op: BinaryOp, a: Decimal, b: Decimal) -> ValueResult<Decimal> {
    match op {
        BinaryOp::Add => a.checked_add(b).ok_or(EvalError::Overflow),
        BinaryOp::Subtract => a.checked_sub(b).ok_or(EvalError::Overflow),
        BinaryOp::Multiply => a.checked_mul(b).ok_or(EvalError::Overflow),
        BinaryOp::Divide if b.is_zero() => Err(EvalError::DivideByZero),
        BinaryOp::Divide => a.checked_div(b).ok_or(EvalError::Overflow),
        BinaryOp::Modulo if b.is_zero() => Err(EvalError::DivideByZero),
        BinaryOp::Modulo => a.checked_rem(b).ok_or(EvalError::Overflow),
        _ => Err(EvalError::TypeMismatch {
            op: op.symbol(),
            left: "decimal",
            right: "decimal",
        }),
    }
}

fn cast_error(value: &Value, ty: &Type) -> EvalError {
    EvalError::InvalidCast {
        from: value.runtime_type().to_string(),
        to: ty.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_is_checked() {
        assert_eq!(
            Value::Int(i32::MAX).arithmetic(BinaryOp::Add, &Value::Int(1)),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            Value::Int(7).arithmetic(BinaryOp::Divide, &Value::Int(0)),
            Err(EvalError::DivideByZero)
        );
        assert_eq!(
            Value::Int(7).arithmetic(BinaryOp::Modulo, &Value::Int(3)),
            Ok(Value::Int(1))
        );
    }

    #[test]
    fn explicit_conversions_truncate() {
        assert_eq!(Value::Double(2.9).convert_to(&Type::Int), Ok(Value::Int(2)));
        assert_eq!(Value::Int(65).convert_to(&Type::Char), Ok(Value::Char('A')));
        assert_eq!(
            Value::Null.convert_to(&Type::Int.nullable()),
            Ok(Value::Null)
        );
        assert!(Value::from("x").convert_to(&Type::Int).is_err());
    }

    #[test]
    fn equality_is_by_reference_for_objects() {
        let a = Value::Object(Rc::new(ObjectValue::new(Type::named("Demo.Thing"))));
        let b = Value::Object(Rc::new(ObjectValue::new(Type::named("Demo.Thing"))));
        assert!(a.equals(&a.clone()));
        assert!(!a.equals(&b));
        assert!(Value::from("x").equals(&Value::from("x")));
        assert!(Value::Int(2).equals(&Value::Double(2.0)));
    }
}
