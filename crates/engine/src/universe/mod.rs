//! The type universe: how textual type and member names map to metadata.
//!
//! The parser never sees host reflection. Everything it knows about types comes from a
//! [`TypeFinder`], and [`TypeUniverse`] is the in-memory one most callers use.

mod members;
mod standard;

use std::collections::HashMap;
use std::sync::Arc;

pub use members::{ConstructorFn, ConstructorInfo, MemberInfo, MethodInfo, MethodKind, NativeFn};

use crate::error::EvalError;
use crate::types::Type;
use crate::value::Value;

/// Maps type names to types and types to their members.
pub trait TypeFinder {
    /// Resolve a full or simple type name with the given generic arguments.
    fn find_type(&self, name: &str, generic_args: &[Type]) -> Option<Type>;

    /// The definition carrying the members of `ty`.
    fn type_def(&self, ty: &Type) -> Option<Arc<TypeDef>>;

    /// Extension methods named `name` whose receiver parameter could accept `ty`.
    fn find_extension_methods(&self, ty: &Type, name: &str) -> Vec<Arc<MethodInfo>>;
}

/// A type definition and its members.
///
/// Member signatures are written against the open type, so `List<T>.Add` takes
/// `Type::TypeParam(0)`.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub generic_arity: usize,
    /// The open type, e.g. `List<T0>` or `int` for primitives.
    pub ty: Type,
    pub constructors: Vec<Arc<ConstructorInfo>>,
    pub methods: Vec<Arc<MethodInfo>>,
    pub members: Vec<Arc<MemberInfo>>,
}

impl TypeDef {
    /// A non-generic class.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let ty = Type::named(name.clone());
        Self::with_type(name, 0, ty)
    }

    /// A generic class with `arity` type parameters.
    pub fn generic(name: impl Into<String>, arity: usize) -> Self {
        let name = name.into();
        let ty = Type::generic(name.clone(), (0..arity).map(Type::TypeParam).collect());
        Self::with_type(name, arity, ty)
    }

    /// A definition that adds members to a built-in type such as `int`.
    pub fn primitive(name: impl Into<String>, ty: Type) -> Self {
        let arity = ty.type_arguments().len();
        Self::with_type(name.into(), arity, ty)
    }

    fn with_type(name: String, generic_arity: usize, ty: Type) -> Self {
        Self {
            name,
            generic_arity,
            ty,
            constructors: Vec::new(),
            methods: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn with_constructor<F>(mut self, params: Vec<Type>, body: F) -> Self
    where
        F: Fn(&Type, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let ctor = ConstructorInfo::new(self.ty.clone(), params, Arc::new(body));
        self.constructors.push(Arc::new(ctor));
        self
    }

    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    pub fn with_static_method<F>(self, name: &str, params: Vec<Type>, ret: Type, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let method = MethodInfo::new(
            name,
            self.ty.clone(),
            MethodKind::Static,
            params,
            ret,
            Arc::new(body),
        );
        self.with_method(method)
    }

    /// The body receives the receiver followed by the arguments.
    pub fn with_instance_method<F>(self, name: &str, params: Vec<Type>, ret: Type, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let method = MethodInfo::new(
            name,
            self.ty.clone(),
            MethodKind::Instance,
            params,
            ret,
            Arc::new(body),
        );
        self.with_method(method)
    }

    pub fn with_member(mut self, member: MemberInfo) -> Self {
        self.members.push(Arc::new(member));
        self
    }

    /// Read-only instance property.
    pub fn with_property<F>(self, name: &str, ty: Type, getter: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let member = MemberInfo::new(name, self.ty.clone(), ty, false, Arc::new(getter));
        self.with_member(member)
    }

    /// Read-only static field or property.
    pub fn with_static_field<F>(self, name: &str, ty: Type, getter: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let member = MemberInfo::new(name, self.ty.clone(), ty, true, Arc::new(getter));
        self.with_member(member)
    }

    fn key(&self) -> String {
        definition_key(&self.name, self.generic_arity)
    }

    fn simple_key(&self) -> String {
        let simple = self.name.rsplit('.').next().unwrap_or(&self.name);
        definition_key(simple, self.generic_arity)
    }
}

/// Lookup key of a definition: the name, plus a backtick and the arity for generic types.
fn definition_key(name: &str, arity: usize) -> String {
    if arity == 0 {
        name.to_string()
    } else {
        format!("{name}`{arity}")
    }
}

/// Key of the definition that carries the members of `ty`.
fn key_for_type(ty: &Type) -> Option<String> {
    let key = match ty {
        Type::Object => "System.Object",
        Type::Bool => "System.Boolean",
        Type::Char => "System.Char",
        Type::Byte => "System.Byte",
        Type::Short => "System.Int16",
        Type::Int => "System.Int32",
        Type::Long => "System.Int64",
        Type::Float => "System.Single",
        Type::Double => "System.Double",
        Type::Decimal => "System.Decimal",
        Type::String => "System.String",
        Type::Nullable(_) => "System.Nullable`1",
        Type::Array { .. } => "System.Array`1",
        Type::Named { name, args } => return Some(definition_key(name, args.len())),
        Type::Void
        | Type::Null
        | Type::Function { .. }
        | Type::TypeParam(_)
        | Type::MethodParam(_) => return None,
    };
    Some(key.to_string())
}

/// In-memory [`TypeFinder`].
#[derive(Debug, Clone, Default)]
pub struct TypeUniverse {
    types: HashMap<String, Arc<TypeDef>>,
    simple_names: HashMap<String, String>,
    extensions: Vec<Arc<MethodInfo>>,
}

impl TypeUniverse {
    /// An empty universe. Most callers want [`TypeUniverse::standard`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in types: `Object`, `String`, `Math`, the numeric types, `Nullable<T>`,
    /// arrays, `List<T>` and the `Enumerable` extension methods.
    pub fn standard() -> Self {
        let mut universe = Self::new();
        standard::install(&mut universe);
        universe
    }

    /// Add a definition, replacing any earlier one with the same full name and arity.
    pub fn register(&mut self, def: TypeDef) -> &mut Self {
        let key = def.key();
        let simple = def.simple_key();
        match self.simple_names.get(&simple) {
            Some(existing) if *existing != key => {
                log::debug!("simple name {simple} already maps to {existing}, keeping it");
            }
            _ => {
                self.simple_names.insert(simple, key.clone());
            }
        }
        self.types.insert(key, Arc::new(def));
        self
    }

    pub fn register_extension(&mut self, method: MethodInfo) -> &mut Self {
        self.extensions.push(Arc::new(method));
        self
    }

    fn lookup(&self, key: &str) -> Option<&Arc<TypeDef>> {
        self.types.get(key).or_else(|| {
            self.simple_names
                .get(key)
                .and_then(|full| self.types.get(full))
        })
    }
}

impl TypeFinder for TypeUniverse {
    fn find_type(&self, name: &str, generic_args: &[Type]) -> Option<Type> {
        let def = self.lookup(&definition_key(name, generic_args.len()))?;
        Some(def.ty.substitute(generic_args, &[]))
    }

    fn type_def(&self, ty: &Type) -> Option<Arc<TypeDef>> {
        key_for_type(ty).and_then(|key| self.types.get(&key).cloned())
    }

    fn find_extension_methods(&self, ty: &Type, name: &str) -> Vec<Arc<MethodInfo>> {
        self.extensions
            .iter()
            .filter(|method| method.name == name)
            .filter(|method| {
                method
                    .params
                    .first()
                    .is_some_and(|receiver| receiver_may_accept(receiver, ty))
            })
            .cloned()
            .collect()
    }
}

/// Cheap shape test for an extension receiver; the resolver scores the real conversion.
fn receiver_may_accept(param: &Type, ty: &Type) -> bool {
    match (param, ty.underlying()) {
        (Type::MethodParam(_) | Type::Object, _) => true,
        (Type::Array { rank: a, .. }, Type::Array { rank: b, .. }) => a == b,
        (Type::Named { name: a, .. }, Type::Named { name: b, .. }) => a == b,
        (param, ty) => param == ty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_types_by_full_and_simple_name() {
        let universe = TypeUniverse::standard();
        assert_eq!(
            universe.find_type("System.Math", &[]),
            Some(Type::named("System.Math"))
        );
        assert_eq!(
            universe.find_type("Math", &[]),
            Some(Type::named("System.Math"))
        );
        assert_eq!(universe.find_type("Int32", &[]), Some(Type::Int));
        assert_eq!(
            universe.find_type("List", &[Type::Int]),
            Some(Type::generic(
                "System.Collections.Generic.List",
                vec![Type::Int]
            ))
        );
        assert_eq!(universe.find_type("List", &[]), None);
        assert_eq!(
            universe.find_type("Nullable", &[Type::Int]),
            Some(Type::Int.nullable())
        );
    }

    #[test]
    fn type_def_covers_built_in_types() {
        let universe = TypeUniverse::standard();
        let def = universe.type_def(&Type::String).expect("string definition");
        assert!(def.members.iter().any(|member| member.name == "Length"));
        let def = universe
            .type_def(&Type::array(Type::Int, 1))
            .expect("array definition");
        assert!(def.members.iter().any(|member| member.name == "Length"));
        assert!(universe.type_def(&Type::Void).is_none());
    }

    #[test]
    fn extension_methods_filter_by_receiver_shape() {
        let universe = TypeUniverse::standard();
        let ints = Type::array(Type::Int, 1);
        assert_eq!(universe.find_extension_methods(&ints, "First").len(), 1);
        assert!(universe
            .find_extension_methods(&Type::String, "First")
            .is_empty());
    }
}
