//! Member metadata: methods, constructors, properties and fields.
//!
//! Signatures of generic definitions mention [`Type::TypeParam`] and [`Type::MethodParam`];
//! the resolver instantiates them before a member ends up in a tree.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::EvalError;
use crate::types::Type;
use crate::value::Value;

/// Native implementation of a method, property getter or setter.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Native implementation of a constructor. It receives the instantiated type being built.
pub type ConstructorFn = Arc<dyn Fn(&Type, &[Value]) -> Result<Value, EvalError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Static,
    /// Called on a receiver; the body gets the receiver followed by the arguments.
    Instance,
    /// Static method callable with instance syntax; the receiver is the first parameter.
    Extension,
}

#[derive(Clone)]
pub struct MethodInfo {
    pub name: String,
    pub declaring_type: Type,
    pub kind: MethodKind,
    /// Number of generic parameters of the method itself.
    pub generic_arity: usize,
    /// Generic arguments once the method has been instantiated.
    pub generic_args: Vec<Type>,
    pub params: Vec<Type>,
    /// The last parameter is a `params T[]` array that accepts any number of `T`s.
    pub variadic: bool,
    pub ret: Type,
    body: NativeFn,
}

impl MethodInfo {
    pub fn new(
        name: impl Into<String>,
        declaring_type: Type,
        kind: MethodKind,
        params: Vec<Type>,
        ret: Type,
        body: NativeFn,
    ) -> Self {
        Self {
            name: name.into(),
            declaring_type,
            kind,
            generic_arity: 0,
            generic_args: Vec::new(),
            params,
            variadic: false,
            ret,
            body,
        }
    }

    pub fn with_generic_arity(mut self, arity: usize) -> Self {
        self.generic_arity = arity;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn is_generic_definition(&self) -> bool {
        self.generic_arity > 0 && self.generic_args.is_empty()
    }

    /// Substitute the declaring type's and the method's generic arguments into the signature.
    pub fn instantiate(&self, class_args: &[Type], method_args: &[Type]) -> MethodInfo {
        MethodInfo {
            name: self.name.clone(),
            declaring_type: self.declaring_type.substitute(class_args, method_args),
            kind: self.kind,
            generic_arity: self.generic_arity,
            generic_args: if method_args.is_empty() {
                self.generic_args.clone()
            } else {
                method_args.to_vec()
            },
            params: self
                .params
                .iter()
                .map(|param| param.substitute(class_args, method_args))
                .collect(),
            variadic: self.variadic,
            ret: self.ret.substitute(class_args, method_args),
            body: Arc::clone(&self.body),
        }
    }

    /// Parameter type that receives argument `idx`, expanding a trailing `params` array.
    pub fn param_for(&self, idx: usize, expanded: bool) -> Option<Type> {
        let last = self.params.len().checked_sub(1)?;
        if expanded && idx >= last {
            return match &self.params[last] {
                Type::Array { element, .. } => Some(element.as_ref().clone()),
                other => Some(other.clone()),
            };
        }
        self.params.get(idx).cloned()
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.body)(args)
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("kind", &self.kind)
            .field("generic_args", &self.generic_args)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|param| param.to_string()).collect();
        write!(
            f,
            "{} {}.{}({})",
            self.ret,
            self.declaring_type,
            self.name,
            params.join(", ")
        )
    }
}

impl PartialEq for MethodInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.declaring_type == other.declaring_type
            && self.kind == other.kind
            && self.generic_args == other.generic_args
            && self.params == other.params
            && self.variadic == other.variadic
            && self.ret == other.ret
    }
}

impl Eq for MethodInfo {}

impl Hash for MethodInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.declaring_type.hash(state);
        self.generic_args.hash(state);
        self.params.hash(state);
    }
}

#[derive(Clone)]
pub struct ConstructorInfo {
    pub declaring_type: Type,
    pub params: Vec<Type>,
    body: ConstructorFn,
}

impl ConstructorInfo {
    pub fn new(declaring_type: Type, params: Vec<Type>, body: ConstructorFn) -> Self {
        Self {
            declaring_type,
            params,
            body,
        }
    }

    pub fn instantiate(&self, class_args: &[Type]) -> ConstructorInfo {
        ConstructorInfo {
            declaring_type: self.declaring_type.substitute(class_args, &[]),
            params: self
                .params
                .iter()
                .map(|param| param.substitute(class_args, &[]))
                .collect(),
            body: Arc::clone(&self.body),
        }
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.body)(&self.declaring_type, args)
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("declaring_type", &self.declaring_type)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ConstructorInfo {
    fn eq(&self, other: &Self) -> bool {
        self.declaring_type == other.declaring_type && self.params == other.params
    }
}

/// A property or field.
///
/// Instance getters receive `[target]` and setters `[target, value]`; static ones drop the
/// target.
#[derive(Clone)]
pub struct MemberInfo {
    pub name: String,
    pub declaring_type: Type,
    pub ty: Type,
    pub is_static: bool,
    getter: NativeFn,
    setter: Option<NativeFn>,
}

impl MemberInfo {
    pub fn new(
        name: impl Into<String>,
        declaring_type: Type,
        ty: Type,
        is_static: bool,
        getter: NativeFn,
    ) -> Self {
        Self {
            name: name.into(),
            declaring_type,
            ty,
            is_static,
            getter,
            setter: None,
        }
    }

    pub fn with_setter(mut self, setter: NativeFn) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn instantiate(&self, class_args: &[Type]) -> MemberInfo {
        MemberInfo {
            name: self.name.clone(),
            declaring_type: self.declaring_type.substitute(class_args, &[]),
            ty: self.ty.substitute(class_args, &[]),
            is_static: self.is_static,
            getter: Arc::clone(&self.getter),
            setter: self.setter.clone(),
        }
    }

    pub fn get(&self, target: Option<&Value>) -> Result<Value, EvalError> {
        match target {
            Some(target) => (self.getter)(std::slice::from_ref(target)),
            None => (self.getter)(&[]),
        }
    }

    pub fn set(&self, target: Option<&Value>, value: Value) -> Result<(), EvalError> {
        let Some(setter) = &self.setter else {
            return Err(EvalError::Native(format!("member '{}' is read-only", self.name)));
        };
        match target {
            Some(target) => setter(&[target.clone(), value])?,
            None => setter(&[value])?,
        };
        Ok(())
    }
}

impl fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .finish_non_exhaustive()
    }
}

impl PartialEq for MemberInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.declaring_type == other.declaring_type
            && self.ty == other.ty
            && self.is_static == other.is_static
    }
}
