//! The compilation context shared by every parse.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, RwLock};

use crate::ast::{Expr, ExprRef, Parameter};
use crate::error::{CompileError, TransformError};
use crate::options::{OptionsFile, ParserOptions};
use crate::parser::ExprParser;
use crate::resolver::Resolver;
use crate::transform;
use crate::types::Type;
use crate::universe::{TypeFinder, TypeUniverse};

/// Options, type finder and type cache, built once and borrowed by every parse.
///
/// The cache fills lazily on first resolution of each type name. Entries never change once
/// written, so concurrent parses only contend on the lock while a name is first resolved.
pub struct Compiler {
    options: ParserOptions,
    finder: Arc<dyn TypeFinder + Send + Sync>,
    type_cache: RwLock<HashMap<String, Option<Type>>>,
}

impl Compiler {
    pub fn new(options: ParserOptions, finder: Arc<dyn TypeFinder + Send + Sync>) -> Self {
        Self {
            options,
            finder,
            type_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Default options over [`TypeUniverse::standard`].
    pub fn standard() -> Self {
        Self::new(ParserOptions::default(), Arc::new(TypeUniverse::standard()))
    }

    /// A compiler with `file`'s overrides applied on top of this one's options.
    pub fn with_options_file(self, file: &OptionsFile) -> Result<Self, CompileError> {
        let mut options = self.options.clone();
        file.apply_to(&mut options, &self)?;
        Ok(Self::new(options, self.finder))
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn finder(&self) -> &(dyn TypeFinder + Send + Sync) {
        self.finder.as_ref()
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self)
    }

    pub(crate) fn cached_type(&self, name: &str) -> Option<Option<Type>> {
        match self.type_cache.read() {
            Ok(cache) => cache.get(name).cloned(),
            Err(poisoned) => poisoned.into_inner().get(name).cloned(),
        }
    }

    pub(crate) fn cache_type(&self, name: &str, ty: Option<Type>) {
        let mut cache = match self.type_cache.write() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.entry(name.to_string()).or_insert(ty);
    }

    /// Parse a free-standing expression.
    pub fn parse(&self, text: &str) -> Result<ExprRef, CompileError> {
        log::debug!("parsing {text:?}");
        ExprParser::new(self, text)?.parse_to_end()
    }

    /// Parse an expression over named, typed free variables.
    ///
    /// The result is a lambda whose parameters are the given variables, in order.
    pub fn parse_with(
        &self,
        text: &str,
        names: &[&str],
        types: &[Type],
    ) -> Result<ExprRef, CompileError> {
        log::debug!("parsing {text:?} over {names:?}");
        if names.len() != types.len() {
            return Err(CompileError::type_mismatch(
                format!(
                    "{} parameter names but {} parameter types",
                    names.len(),
                    types.len()
                ),
                "",
                0,
            ));
        }
        let mut params: Vec<Parameter> = Vec::with_capacity(names.len());
        for (name, ty) in names.iter().zip(types) {
            if params.iter().any(|param| param.name == *name) {
                return Err(CompileError::DuplicateParameter {
                    name: name.to_string(),
                    offset: 0,
                });
            }
            params.push(Parameter::new(*name, ty.clone()));
        }
        let mut parser = ExprParser::new(self, text)?;
        parser.context_mut().push_scope(params.clone());
        let body = parser.parse_to_end()?;
        Ok(Rc::new(Expr::Lambda { params, body }))
    }

    /// Parse a lambda whose untyped parameters take `expected_types` positionally.
    pub fn parse_lambda(&self, text: &str, expected_types: &[Type]) -> Result<ExprRef, CompileError> {
        log::debug!("parsing lambda {text:?} against {expected_types:?}");
        let mut parser = ExprParser::new(self, text)?;
        parser
            .context_mut()
            .set_expected_types(expected_types.to_vec());
        parser.parse_to_end()
    }

    /// Differentiate `tree` with respect to the parameter named `variable`.
    pub fn differentiate(&self, tree: &ExprRef, variable: &str) -> Result<ExprRef, TransformError> {
        transform::differentiate(self, tree, variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn compiler_is_shareable_across_threads() {
        assert_send_sync::<Compiler>();
    }

    #[test]
    fn type_cache_remembers_misses() {
        let compiler = Compiler::standard();
        assert_eq!(compiler.resolver().resolve_type("Nope"), None);
        assert_eq!(compiler.cached_type("Nope"), Some(None));
        assert_eq!(
            compiler.resolver().resolve_type("int?[]"),
            Some(Type::array(Type::Int.nullable(), 1))
        );
        assert!(compiler.cached_type("int?").is_some());
    }
}
