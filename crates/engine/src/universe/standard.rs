//! Built-in type definitions.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

use super::{MethodInfo, MethodKind, TypeDef, TypeUniverse};
use crate::error::EvalError;
use crate::types::Type;
use crate::value::{ObjectValue, Value};

pub(super) fn install(universe: &mut TypeUniverse) {
    universe
        .register(object_type())
        .register(string_type())
        .register(math_type())
        .register(int32_type())
        .register(int64_type())
        .register(double_type())
        .register(TypeDef::primitive("System.Boolean", Type::Bool))
        .register(TypeDef::primitive("System.Char", Type::Char))
        .register(TypeDef::primitive("System.Byte", Type::Byte))
        .register(TypeDef::primitive("System.Int16", Type::Short))
        .register(TypeDef::primitive("System.Single", Type::Float))
        .register(TypeDef::primitive("System.Decimal", Type::Decimal))
        .register(nullable_type())
        .register(array_type())
        .register(list_type());

    let extensions = enumerable_extensions();
    let mut enumerable = TypeDef::new(ENUMERABLE);
    for method in &extensions {
        enumerable = enumerable.with_method(method.clone());
    }
    universe.register(enumerable);
    for method in extensions {
        universe.register_extension(method);
    }
}

const ENUMERABLE: &str = "System.Linq.Enumerable";

fn arg(args: &[Value], idx: usize) -> Result<&Value, EvalError> {
    args.get(idx).ok_or(EvalError::ArgumentCount {
        expected: idx + 1,
        found: args.len(),
    })
}

fn string_arg(args: &[Value], idx: usize) -> Result<Rc<str>, EvalError> {
    match arg(args, idx)? {
        Value::String(text) => Ok(Rc::clone(text)),
        Value::Null => Err(EvalError::NullReference),
        other => Err(EvalError::InvalidCast {
            from: other.runtime_type().to_string(),
            to: "string".to_string(),
        }),
    }
}

fn int_arg(args: &[Value], idx: usize) -> Result<i32, EvalError> {
    let value = arg(args, idx)?;
    value
        .as_i64()
        .and_then(|value| i32::try_from(value).ok())
        .ok_or_else(|| EvalError::InvalidCast {
            from: value.runtime_type().to_string(),
            to: "int".to_string(),
        })
}

fn long_arg(args: &[Value], idx: usize) -> Result<i64, EvalError> {
    let value = arg(args, idx)?;
    value.as_i64().ok_or_else(|| EvalError::InvalidCast {
        from: value.runtime_type().to_string(),
        to: "long".to_string(),
    })
}

fn f64_arg(args: &[Value], idx: usize) -> Result<f64, EvalError> {
    let value = arg(args, idx)?;
    value.as_f64().ok_or_else(|| EvalError::InvalidCast {
        from: value.runtime_type().to_string(),
        to: "double".to_string(),
    })
}

fn object_arg(args: &[Value], idx: usize) -> Result<Rc<ObjectValue>, EvalError> {
    match arg(args, idx)? {
        Value::Object(object) => Ok(Rc::clone(object)),
        Value::Null => Err(EvalError::NullReference),
        other => Err(EvalError::InvalidCast {
            from: other.runtime_type().to_string(),
            to: "object".to_string(),
        }),
    }
}

fn array_items(args: &[Value], idx: usize) -> Result<Vec<Value>, EvalError> {
    match arg(args, idx)? {
        Value::Array(array) => Ok(array.items.borrow().clone()),
        Value::Null => Err(EvalError::NullReference),
        other => Err(EvalError::InvalidCast {
            from: other.runtime_type().to_string(),
            to: "array".to_string(),
        }),
    }
}

/// Index into a char or item sequence, rejecting negative and past-the-end positions.
fn checked_index(index: i64, len: usize) -> Result<usize, EvalError> {
    usize::try_from(index)
        .ok()
        .filter(|idx| *idx < len)
        .ok_or(EvalError::IndexOutOfRange { index, len })
}

fn object_type() -> TypeDef {
    TypeDef::primitive("System.Object", Type::Object)
        .with_instance_method("ToString", vec![], Type::String, |args| {
            Ok(Value::from(arg(args, 0)?.to_string()))
        })
        .with_instance_method("GetHashCode", vec![], Type::Int, |args| {
            let mut hasher = DefaultHasher::new();
            arg(args, 0)?.hash(&mut hasher);
            Ok(Value::Int(hasher.finish() as i32))
        })
        .with_instance_method("Equals", vec![Type::Object], Type::Bool, |args| {
            Ok(Value::Bool(arg(args, 0)?.equals(arg(args, 1)?)))
        })
}

fn string_type() -> TypeDef {
    let def = TypeDef::primitive("System.String", Type::String)
        .with_property("Length", Type::Int, |args| {
            Ok(Value::Int(string_arg(args, 0)?.chars().count() as i32))
        })
        .with_instance_method("ToUpper", vec![], Type::String, |args| {
            Ok(Value::from(string_arg(args, 0)?.to_uppercase()))
        })
        .with_instance_method("ToLower", vec![], Type::String, |args| {
            Ok(Value::from(string_arg(args, 0)?.to_lowercase()))
        })
        .with_instance_method("Trim", vec![], Type::String, |args| {
            Ok(Value::from(string_arg(args, 0)?.trim()))
        })
        .with_instance_method("Contains", vec![Type::String], Type::Bool, |args| {
            Ok(Value::Bool(string_arg(args, 0)?.contains(&*string_arg(args, 1)?)))
        })
        .with_instance_method("StartsWith", vec![Type::String], Type::Bool, |args| {
            Ok(Value::Bool(string_arg(args, 0)?.starts_with(&*string_arg(args, 1)?)))
        })
        .with_instance_method("EndsWith", vec![Type::String], Type::Bool, |args| {
            Ok(Value::Bool(string_arg(args, 0)?.ends_with(&*string_arg(args, 1)?)))
        })
        .with_instance_method("IndexOf", vec![Type::String], Type::Int, |args| {
            let text = string_arg(args, 0)?;
            let needle = string_arg(args, 1)?;
            let index = text
                .find(&*needle)
                .map(|byte| text[..byte].chars().count() as i32)
                .unwrap_or(-1);
            Ok(Value::Int(index))
        })
        .with_instance_method("Substring", vec![Type::Int], Type::String, |args| {
            let text = string_arg(args, 0)?;
            let len = text.chars().count();
            let start = i64::from(int_arg(args, 1)?);
            if start < 0 || start as usize > len {
                return Err(EvalError::IndexOutOfRange { index: start, len });
            }
            Ok(Value::from(text.chars().skip(start as usize).collect::<String>()))
        })
        .with_instance_method(
            "Substring",
            vec![Type::Int, Type::Int],
            Type::String,
            |args| {
                let text = string_arg(args, 0)?;
                let len = text.chars().count();
                let start = i64::from(int_arg(args, 1)?);
                let count = i64::from(int_arg(args, 2)?);
                if start < 0 || count < 0 || (start + count) as usize > len {
                    return Err(EvalError::IndexOutOfRange {
                        index: start + count,
                        len,
                    });
                }
                let slice: String = text
                    .chars()
                    .skip(start as usize)
                    .take(count as usize)
                    .collect();
                Ok(Value::from(slice))
            },
        )
        .with_instance_method("get_Chars", vec![Type::Int], Type::Char, |args| {
            let text = string_arg(args, 0)?;
            let len = text.chars().count();
            let idx = checked_index(i64::from(int_arg(args, 1)?), len)?;
            text.chars()
                .nth(idx)
                .map(Value::Char)
                .ok_or(EvalError::IndexOutOfRange {
                    index: idx as i64,
                    len,
                })
        })
        .with_static_method(
            "IsNullOrEmpty",
            vec![Type::String],
            Type::Bool,
            |args| match arg(args, 0)? {
                Value::Null => Ok(Value::Bool(true)),
                Value::String(text) => Ok(Value::Bool(text.is_empty())),
                _ => Ok(Value::Bool(false)),
            },
        )
        .with_static_field("Empty", Type::String, |_| Ok(Value::from("")));

    let concat = MethodInfo::new(
        "Concat",
        Type::String,
        MethodKind::Static,
        vec![Type::array(Type::Object, 1)],
        Type::String,
        Arc::new(|args: &[Value]| -> Result<Value, EvalError> {
            let mut text = String::new();
            for value in args {
                if !value.is_null() {
                    text.push_str(&value.to_string());
                }
            }
            Ok(Value::from(text))
        }),
    )
    .variadic();
    def.with_method(concat)
}

fn math_type() -> TypeDef {
    let unary: [(&str, fn(f64) -> f64); 10] = [
        ("Sin", f64::sin),
        ("Cos", f64::cos),
        ("Tan", f64::tan),
        ("Exp", f64::exp),
        ("Log", f64::ln),
        ("Log10", f64::log10),
        ("Sqrt", f64::sqrt),
        ("Floor", f64::floor),
        ("Ceiling", f64::ceil),
        ("Round", f64::round_ties_even),
    ];
    let mut def = TypeDef::new("System.Math");
    for (name, function) in unary {
        def = def.with_static_method(name, vec![Type::Double], Type::Double, move |args| {
            Ok(Value::Double(function(f64_arg(args, 0)?)))
        });
    }
    def.with_static_method(
        "Log",
        vec![Type::Double, Type::Double],
        Type::Double,
        |args| Ok(Value::Double(f64_arg(args, 0)?.ln() / f64_arg(args, 1)?.ln())),
    )
    .with_static_method(
        "Pow",
        vec![Type::Double, Type::Double],
        Type::Double,
        |args| Ok(Value::Double(f64_arg(args, 0)?.powf(f64_arg(args, 1)?))),
    )
    .with_static_method("Abs", vec![Type::Int], Type::Int, |args| {
        int_arg(args, 0)?
            .checked_abs()
            .map(Value::Int)
            .ok_or(EvalError::Overflow)
    })
    .with_static_method("Abs", vec![Type::Long], Type::Long, |args| {
        long_arg(args, 0)?
            .checked_abs()
            .map(Value::Long)
            .ok_or(EvalError::Overflow)
    })
    .with_static_method("Abs", vec![Type::Double], Type::Double, |args| {
        Ok(Value::Double(f64_arg(args, 0)?.abs()))
    })
    .with_static_method("Max", vec![Type::Int, Type::Int], Type::Int, |args| {
        Ok(Value::Int(int_arg(args, 0)?.max(int_arg(args, 1)?)))
    })
    .with_static_method("Max", vec![Type::Long, Type::Long], Type::Long, |args| {
        Ok(Value::Long(long_arg(args, 0)?.max(long_arg(args, 1)?)))
    })
    .with_static_method(
        "Max",
        vec![Type::Double, Type::Double],
        Type::Double,
        |args| Ok(Value::Double(f64_arg(args, 0)?.max(f64_arg(args, 1)?))),
    )
    .with_static_method("Min", vec![Type::Int, Type::Int], Type::Int, |args| {
        Ok(Value::Int(int_arg(args, 0)?.min(int_arg(args, 1)?)))
    })
    .with_static_method("Min", vec![Type::Long, Type::Long], Type::Long, |args| {
        Ok(Value::Long(long_arg(args, 0)?.min(long_arg(args, 1)?)))
    })
    .with_static_method(
        "Min",
        vec![Type::Double, Type::Double],
        Type::Double,
        |args| Ok(Value::Double(f64_arg(args, 0)?.min(f64_arg(args, 1)?))),
    )
    .with_static_field("PI", Type::Double, |_| {
        Ok(Value::Double(std::f64::consts::PI))
    })
    .with_static_field("E", Type::Double, |_| Ok(Value::Double(std::f64::consts::E)))
}

fn parse_failure(text: &str, ty: &str) -> EvalError {
    EvalError::Native(format!("input string '{text}' is not a valid {ty}"))
}

fn int32_type() -> TypeDef {
    TypeDef::primitive("System.Int32", Type::Int)
        .with_static_method("Parse", vec![Type::String], Type::Int, |args| {
            let text = string_arg(args, 0)?;
            text.trim()
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|_| parse_failure(&text, "int"))
        })
        .with_static_field("MaxValue", Type::Int, |_| Ok(Value::Int(i32::MAX)))
        .with_static_field("MinValue", Type::Int, |_| Ok(Value::Int(i32::MIN)))
}

fn int64_type() -> TypeDef {
    TypeDef::primitive("System.Int64", Type::Long)
        .with_static_method("Parse", vec![Type::String], Type::Long, |args| {
            let text = string_arg(args, 0)?;
            text.trim()
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|_| parse_failure(&text, "long"))
        })
        .with_static_field("MaxValue", Type::Long, |_| Ok(Value::Long(i64::MAX)))
        .with_static_field("MinValue", Type::Long, |_| Ok(Value::Long(i64::MIN)))
}

fn double_type() -> TypeDef {
    TypeDef::primitive("System.Double", Type::Double)
        .with_static_method("Parse", vec![Type::String], Type::Double, |args| {
            let text = string_arg(args, 0)?;
            text.trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| parse_failure(&text, "double"))
        })
        .with_static_field("MaxValue", Type::Double, |_| Ok(Value::Double(f64::MAX)))
        .with_static_field("MinValue", Type::Double, |_| Ok(Value::Double(f64::MIN)))
}

fn nullable_type() -> TypeDef {
    TypeDef::primitive("System.Nullable", Type::Nullable(Box::new(Type::TypeParam(0))))
        .with_property("HasValue", Type::Bool, |args| {
            Ok(Value::Bool(!arg(args, 0)?.is_null()))
        })
        .with_property("Value", Type::TypeParam(0), |args| match arg(args, 0)? {
            Value::Null => Err(EvalError::Native(
                "nullable object must have a value".to_string(),
            )),
            value => Ok(value.clone()),
        })
}

fn array_type() -> TypeDef {
    TypeDef::primitive("System.Array", Type::array(Type::TypeParam(0), 1)).with_property(
        "Length",
        Type::Int,
        |args| Ok(Value::Int(array_items(args, 0)?.len() as i32)),
    )
}

fn list_type() -> TypeDef {
    TypeDef::generic("System.Collections.Generic.List", 1)
        .with_constructor(vec![], |ty, _| {
            Ok(Value::Object(Rc::new(ObjectValue::new(ty.clone()))))
        })
        .with_instance_method("Add", vec![Type::TypeParam(0)], Type::Void, |args| {
            let list = object_arg(args, 0)?;
            list.items.borrow_mut().push(arg(args, 1)?.clone());
            Ok(Value::Null)
        })
        .with_instance_method("Contains", vec![Type::TypeParam(0)], Type::Bool, |args| {
            let list = object_arg(args, 0)?;
            let needle = arg(args, 1)?;
            let found = list.items.borrow().iter().any(|item| item.equals(needle));
            Ok(Value::Bool(found))
        })
        .with_property("Count", Type::Int, |args| {
            Ok(Value::Int(object_arg(args, 0)?.items.borrow().len() as i32))
        })
        .with_instance_method("get_Item", vec![Type::Int], Type::TypeParam(0), |args| {
            let list = object_arg(args, 0)?;
            let items = list.items.borrow();
            let idx = checked_index(i64::from(int_arg(args, 1)?), items.len())?;
            Ok(items[idx].clone())
        })
}

fn enumerable_extensions() -> Vec<MethodInfo> {
    let element = Type::MethodParam(0);
    let sequence = Type::array(element.clone(), 1);
    let extension = |name: &str, params: Vec<Type>, ret: Type, body: super::NativeFn| {
        MethodInfo::new(
            name,
            Type::named(ENUMERABLE),
            MethodKind::Extension,
            params,
            ret,
            body,
        )
        .with_generic_arity(1)
    };
    vec![
        extension(
            "First",
            vec![sequence.clone()],
            element.clone(),
            Arc::new(|args: &[Value]| -> Result<Value, EvalError> {
                array_items(args, 0)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| EvalError::Native("sequence contains no elements".to_string()))
            }),
        ),
        extension(
            "Last",
            vec![sequence.clone()],
            element.clone(),
            Arc::new(|args: &[Value]| -> Result<Value, EvalError> {
                array_items(args, 0)?
                    .pop()
                    .ok_or_else(|| EvalError::Native("sequence contains no elements".to_string()))
            }),
        ),
        extension(
            "Count",
            vec![sequence.clone()],
            Type::Int,
            Arc::new(|args: &[Value]| -> Result<Value, EvalError> {
                Ok(Value::Int(array_items(args, 0)?.len() as i32))
            }),
        ),
        extension(
            "Contains",
            vec![sequence, element],
            Type::Bool,
            Arc::new(|args: &[Value]| -> Result<Value, EvalError> {
                let needle = arg(args, 1)?;
                let found = array_items(args, 0)?.iter().any(|item| item.equals(needle));
                Ok(Value::Bool(found))
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::TypeFinder;

    fn static_method(universe: &TypeUniverse, ty: &Type, name: &str, params: &[Type]) -> Arc<MethodInfo> {
        universe
            .type_def(ty)
            .and_then(|def| {
                def.methods
                    .iter()
                    .find(|method| method.name == name && method.params == params)
                    .cloned()
            })
            .expect("method exists")
    }

    #[test]
    fn concat_skips_nulls() {
        let universe = TypeUniverse::standard();
        let concat = static_method(
            &universe,
            &Type::String,
            "Concat",
            &[Type::array(Type::Object, 1)],
        );
        let result = concat
            .invoke(&[Value::from("a"), Value::Null, Value::Int(1)])
            .expect("concat");
        assert_eq!(result, Value::from("a1"));
    }

    #[test]
    fn substring_checks_bounds() {
        let universe = TypeUniverse::standard();
        let substring = universe
            .type_def(&Type::String)
            .and_then(|def| {
                def.methods
                    .iter()
                    .find(|method| method.name == "Substring" && method.params.len() == 2)
                    .cloned()
            })
            .expect("substring");
        assert_eq!(
            substring.invoke(&[Value::from("hello"), Value::Int(1), Value::Int(3)]),
            Ok(Value::from("ell"))
        );
        assert!(matches!(
            substring.invoke(&[Value::from("hello"), Value::Int(4), Value::Int(3)]),
            Err(EvalError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn math_log_with_base() {
        let universe = TypeUniverse::standard();
        let log = static_method(
            &universe,
            &Type::named("System.Math"),
            "Log",
            &[Type::Double, Type::Double],
        );
        let Ok(Value::Double(result)) = log.invoke(&[Value::Double(8.0), Value::Double(2.0)])
        else {
            panic!("log should produce a double");
        };
        assert!((result - 3.0).abs() < 1e-12);
    }
}
