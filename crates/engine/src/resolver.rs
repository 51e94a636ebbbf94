//! Type-name resolution and overload selection.

use std::sync::Arc;

use crate::ast::ExprRef;
use crate::builders::nodes;
use crate::compiler::Compiler;
use crate::types::{NumericRanks, Type, conversion_distance};
use crate::universe::{ConstructorInfo, MemberInfo, MethodInfo, MethodKind};

/// Resolves names against a [`Compiler`]'s aliases and type finder.
///
/// A resolver is a cheap view; create one per lookup with [`Compiler::resolver`].
#[derive(Clone, Copy)]
pub struct Resolver<'c> {
    compiler: &'c Compiler,
}

/// The winner of overload selection, with its arguments converted to the parameter types.
#[derive(Debug, Clone)]
pub struct Selection<M> {
    pub member: Arc<M>,
    pub args: Vec<ExprRef>,
    pub distance: u32,
}

impl<'c> Resolver<'c> {
    pub fn new(compiler: &'c Compiler) -> Self {
        Self { compiler }
    }

    fn ranks(&self) -> &NumericRanks {
        &self.compiler.options().ranks
    }

    /// Resolve a type written in source syntax: `int?`, `double[,]`, `List<List<int>>`.
    pub fn resolve_type(&self, name: &str) -> Option<Type> {
        let name = name.trim();
        if let Some(cached) = self.compiler.cached_type(name) {
            return cached;
        }
        let resolved = self.resolve_uncached(name);
        self.compiler.cache_type(name, resolved.clone());
        resolved
    }

    fn resolve_uncached(&self, name: &str) -> Option<Type> {
        if let Some(inner) = name.strip_suffix('?') {
            return self.resolve_type(inner).map(Type::nullable);
        }
        if let Some(body) = name.strip_suffix(']') {
            let open = matching_open(body, '[', ']')?;
            let markers = &body[open + 1..];
            if !markers.chars().all(|ch| ch == ',' || ch.is_whitespace()) {
                return None;
            }
            let rank = markers.matches(',').count() + 1;
            return self
                .resolve_type(&body[..open])
                .map(|element| Type::array(element, rank));
        }
        if let Some(body) = name.strip_suffix('>') {
            let open = matching_open(body, '<', '>')?;
            let args = split_top_level(&body[open + 1..])
                .into_iter()
                .map(|arg| self.resolve_type(arg))
                .collect::<Option<Vec<_>>>()?;
            return self.resolve_type_name(body[..open].trim(), &args);
        }
        self.resolve_type_name(name, &[])
    }

    /// Resolve a plain name with already resolved generic arguments. Aliases win over the finder.
    pub fn resolve_type_name(&self, name: &str, generic_args: &[Type]) -> Option<Type> {
        if generic_args.is_empty()
            && let Some(alias) = self.compiler.options().aliases.get(name)
        {
            return Some(alias.clone());
        }
        self.compiler.finder().find_type(name, generic_args)
    }

    pub fn get_constructors(&self, ty: &Type) -> Vec<Arc<ConstructorInfo>> {
        let Some(def) = self.compiler.finder().type_def(ty) else {
            return Vec::new();
        };
        let class_args = ty.type_arguments();
        def.constructors
            .iter()
            .map(|ctor| Arc::new(ctor.instantiate(&class_args)))
            .collect()
    }

    /// Instance methods of `ty`, then those inherited from `object`, then extension methods.
    pub fn get_instance_methods(&self, ty: &Type, name: &str) -> Vec<Arc<MethodInfo>> {
        let finder = self.compiler.finder();
        let class_args = ty.type_arguments();
        let mut methods: Vec<Arc<MethodInfo>> = Vec::new();
        if let Some(def) = finder.type_def(ty) {
            methods.extend(
                def.methods
                    .iter()
                    .filter(|method| method.name == name && method.kind == MethodKind::Instance)
                    .map(|method| Arc::new(method.instantiate(&class_args, &[]))),
            );
        }
        if *ty != Type::Object
            && let Some(object) = finder.type_def(&Type::Object)
        {
            methods.extend(
                object
                    .methods
                    .iter()
                    .filter(|method| method.name == name && method.kind == MethodKind::Instance)
                    .cloned(),
            );
        }
        methods.extend(finder.find_extension_methods(ty, name));
        methods
    }

    /// Static methods of `ty`, including extension methods called in static form.
    pub fn get_static_methods(&self, ty: &Type, name: &str) -> Vec<Arc<MethodInfo>> {
        let Some(def) = self.compiler.finder().type_def(ty) else {
            return Vec::new();
        };
        let class_args = ty.type_arguments();
        def.methods
            .iter()
            .filter(|method| method.name == name && method.kind != MethodKind::Instance)
            .map(|method| Arc::new(method.instantiate(&class_args, &[])))
            .collect()
    }

    /// Static methods whose name matches `name` ignoring ASCII case, so `sin(x)` finds `Sin`.
    pub fn get_static_methods_ignore_case(&self, ty: &Type, name: &str) -> Vec<Arc<MethodInfo>> {
        let Some(def) = self.compiler.finder().type_def(ty) else {
            return Vec::new();
        };
        def.methods
            .iter()
            .filter(|method| {
                method.name.eq_ignore_ascii_case(name) && method.kind != MethodKind::Instance
            })
            .map(|method| Arc::new(method.instantiate(&ty.type_arguments(), &[])))
            .collect()
    }

    pub fn get_instance_property_or_field(&self, ty: &Type, name: &str) -> Option<Arc<MemberInfo>> {
        self.find_member(ty, name, false)
    }

    pub fn get_static_property_or_field(&self, ty: &Type, name: &str) -> Option<Arc<MemberInfo>> {
        self.find_member(ty, name, true)
    }

    fn find_member(&self, ty: &Type, name: &str, is_static: bool) -> Option<Arc<MemberInfo>> {
        let def = self.compiler.finder().type_def(ty)?;
        let member = def
            .members
            .iter()
            .find(|member| member.name == name && member.is_static == is_static)?;
        Some(Arc::new(member.instantiate(&ty.type_arguments())))
    }

    /// Pick the constructor with the lowest overload distance.
    pub fn select_constructor(
        &self,
        candidates: &[Arc<ConstructorInfo>],
        args: &[ExprRef],
    ) -> Option<Selection<ConstructorInfo>> {
        let arg_types: Vec<Type> = args.iter().map(|arg| arg.ty()).collect();
        let mut best: Option<(u32, &Arc<ConstructorInfo>)> = None;
        for ctor in candidates {
            if ctor.params.len() != args.len() {
                continue;
            }
            let Some(distance) = self.total_distance(&arg_types, |idx| ctor.params.get(idx).cloned())
            else {
                continue;
            };
            log::trace!("constructor {} scored {distance}", ctor.declaring_type);
            match best {
                Some((best_distance, _)) if best_distance <= distance => {
                    if best_distance == distance {
                        log::warn!(
                            "ambiguous constructors for {}; keeping the first declared",
                            ctor.declaring_type
                        );
                    }
                }
                _ => best = Some((distance, ctor)),
            }
        }
        let (distance, ctor) = best?;
        let args = args
            .iter()
            .zip(&ctor.params)
            .map(|(arg, param)| nodes::convert(arg.clone(), param))
            .collect();
        Some(Selection {
            member: Arc::clone(ctor),
            args,
            distance,
        })
    }

    /// Pick the method with the lowest overload distance.
    ///
    /// Extension candidates take `receiver` as their first argument. Generic definitions are
    /// instantiated with `generic_args` or, when none are given, with arguments inferred from the
    /// argument types. Ties go to the candidate listed first.
    pub fn select_method(
        &self,
        candidates: &[Arc<MethodInfo>],
        receiver: Option<&ExprRef>,
        generic_args: &[Type],
        args: &[ExprRef],
    ) -> Option<Selection<MethodInfo>> {
        let mut best: Option<(u32, Arc<MethodInfo>, Vec<ExprRef>, bool)> = None;
        for candidate in candidates {
            let effective: Vec<ExprRef> = match (candidate.kind, receiver) {
                (MethodKind::Extension, Some(receiver)) => std::iter::once(receiver.clone())
                    .chain(args.iter().cloned())
                    .collect(),
                _ => args.to_vec(),
            };
            let arg_types: Vec<Type> = effective.iter().map(|arg| arg.ty()).collect();
            let Some(method) = self.instantiate_candidate(candidate, generic_args, &arg_types) else {
                continue;
            };
            let Some((distance, expanded)) = self.score(&method, &arg_types) else {
                continue;
            };
            log::trace!("candidate {method} scored {distance}");
            match &best {
                Some((best_distance, ..)) if *best_distance <= distance => {
                    if *best_distance == distance {
                        log::warn!(
                            "ambiguous overloads of {}; keeping the first declared",
                            method.name
                        );
                    }
                }
                _ => best = Some((distance, Arc::new(method), effective, expanded)),
            }
        }
        let (distance, method, effective, expanded) = best?;
        let args = effective
            .into_iter()
            .enumerate()
            .map(|(idx, arg)| match method.param_for(idx, expanded) {
                Some(param) => nodes::convert(arg, &param),
                None => arg,
            })
            .collect();
        Some(Selection {
            member: method,
            args,
            distance,
        })
    }

    fn instantiate_candidate(
        &self,
        candidate: &MethodInfo,
        generic_args: &[Type],
        arg_types: &[Type],
    ) -> Option<MethodInfo> {
        if !candidate.is_generic_definition() {
            return generic_args.is_empty().then(|| candidate.clone());
        }
        if !generic_args.is_empty() {
            return (generic_args.len() == candidate.generic_arity)
                .then(|| candidate.instantiate(&[], generic_args));
        }
        let mut bindings: Vec<Option<Type>> = vec![None; candidate.generic_arity];
        for (idx, arg_ty) in arg_types.iter().enumerate() {
            let param = candidate.param_for(idx, candidate.variadic && idx + 1 >= candidate.params.len())?;
            if !unify(&param, arg_ty, &mut bindings) {
                return None;
            }
        }
        let inferred = bindings.into_iter().collect::<Option<Vec<_>>>()?;
        Some(candidate.instantiate(&[], &inferred))
    }

    /// Total conversion distance of the arguments, trying the normal form before the expanded
    /// `params` form.
    fn score(&self, method: &MethodInfo, arg_types: &[Type]) -> Option<(u32, bool)> {
        if arg_types.len() == method.params.len()
            && let Some(distance) =
                self.total_distance(arg_types, |idx| method.params.get(idx).cloned())
        {
            return Some((distance, false));
        }
        if method.variadic && arg_types.len() + 1 >= method.params.len() {
            return self
                .total_distance(arg_types, |idx| method.param_for(idx, true))
                .map(|distance| (distance, true));
        }
        None
    }

    fn total_distance(
        &self,
        arg_types: &[Type],
        param_for: impl Fn(usize) -> Option<Type>,
    ) -> Option<u32> {
        arg_types.iter().enumerate().try_fold(0u32, |total, (idx, arg)| {
            let param = param_for(idx)?;
            let distance = conversion_distance(arg, &param, self.ranks())?;
            Some(total + distance)
        })
    }
}

/// Bind generic method parameters in `param` from the argument type `arg`.
///
/// Returns false when `arg` cannot have the shape `param` requires, or a parameter is already
/// bound to an incompatible type.
fn unify(param: &Type, arg: &Type, bindings: &mut [Option<Type>]) -> bool {
    match (param, arg) {
        (Type::MethodParam(idx), arg) => match bindings.get_mut(*idx) {
            Some(slot @ None) => {
                *slot = Some(arg.clone());
                true
            }
            Some(Some(bound)) => {
                bound == arg || conversion_distance(arg, bound, &NumericRanks::default()).is_some()
            }
            None => false,
        },
        (
            Type::Array { element, rank },
            Type::Array {
                element: arg_element,
                rank: arg_rank,
            },
        ) => rank == arg_rank && unify(element, arg_element, bindings),
        (Type::Nullable(inner), Type::Nullable(arg_inner)) => unify(inner, arg_inner, bindings),
        (Type::Nullable(inner), arg) => unify(inner, arg, bindings),
        (
            Type::Named { name, args },
            Type::Named {
                name: arg_name,
                args: arg_args,
            },
        ) => {
            name == arg_name
                && args.len() == arg_args.len()
                && args
                    .iter()
                    .zip(arg_args)
                    .all(|(param, arg)| unify(param, arg, bindings))
        }
        (
            Type::Function { params, ret },
            Type::Function {
                params: arg_params,
                ret: arg_ret,
            },
        ) => {
            params.len() == arg_params.len()
                && params
                    .iter()
                    .zip(arg_params)
                    .all(|(param, arg)| unify(param, arg, bindings))
                && unify(ret, arg_ret, bindings)
        }
        (param, _) => !param.has_method_params(),
    }
}

/// Byte index of the bracket opening the group that `body` closes.
fn matching_open(body: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in body.char_indices().rev() {
        if ch == close {
            depth += 1;
        } else if ch == open {
            if depth == 0 {
                return Some(idx);
            }
            depth -= 1;
        }
    }
    None
}

/// Split a generic argument list on commas that are not nested in `<>` or `[]`.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in list.char_indices() {
        match ch {
            '<' | '[' => depth += 1,
            '>' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(list[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_only_top_level_commas() {
        assert_eq!(
            split_top_level("int, Dictionary<string, int[,]>, double"),
            vec!["int", "Dictionary<string, int[,]>", "double"]
        );
        assert_eq!(split_top_level("int"), vec!["int"]);
    }

    #[test]
    fn finds_matching_open_bracket() {
        assert_eq!(matching_open("List<List<int>", '<', '>'), Some(4));
        assert_eq!(matching_open("int[", '[', ']'), Some(3));
        assert_eq!(matching_open("int", '[', ']'), None);
    }

    #[test]
    fn unify_binds_array_elements() {
        let mut bindings = vec![None];
        let param = Type::array(Type::MethodParam(0), 1);
        assert!(unify(&param, &Type::array(Type::Int, 1), &mut bindings));
        assert_eq!(bindings, vec![Some(Type::Int)]);
        let mut bindings = vec![None];
        assert!(!unify(&param, &Type::String, &mut bindings));
    }
}
