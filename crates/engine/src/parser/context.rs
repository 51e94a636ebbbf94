//! Per-parse mutable state: lambda scopes, hidden temporaries and open brackets.

use crate::ast::Parameter;
use crate::types::Type;

/// State that lives for one parse and is threaded through every builder.
#[derive(Debug, Default)]
pub struct ParserContext {
    scopes: Vec<Vec<Parameter>>,
    hidden: Vec<Parameter>,
    hidden_count: usize,
    expected_types: Option<Vec<Type>>,
    open_brackets: Vec<(String, usize)>,
}

impl ParserContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self, params: Vec<Parameter>) {
        self.scopes.push(params);
    }

    pub fn pop_scope(&mut self) -> Option<Vec<Parameter>> {
        self.scopes.pop()
    }

    /// Innermost visible parameter named `name`.
    pub fn lookup(&self, name: &str) -> Option<&Parameter> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().find(|param| param.name == name))
    }

    /// A fresh local that source text can never name.
    pub fn push_hidden(&mut self, ty: Type) -> Parameter {
        let param = Parameter::new(format!("$tmp{}", self.hidden_count), ty);
        self.hidden_count += 1;
        self.hidden.push(param.clone());
        param
    }

    pub fn pop_hidden(&mut self) -> Option<Parameter> {
        self.hidden.pop()
    }

    pub fn set_expected_types(&mut self, types: Vec<Type>) {
        self.expected_types = Some(types);
    }

    /// Expected parameter types for the next lambda. Only the first lambda read gets them.
    pub fn take_expected_types(&mut self) -> Option<Vec<Type>> {
        self.expected_types.take()
    }

    pub fn open_bracket(&mut self, token: &str, offset: usize) {
        self.open_brackets.push((token.to_string(), offset));
    }

    pub fn close_bracket(&mut self) -> Option<(String, usize)> {
        self.open_brackets.pop()
    }

    pub fn innermost_bracket(&self) -> Option<&(String, usize)> {
        self.open_brackets.last()
    }

    pub(crate) fn bracket_depth(&self) -> usize {
        self.open_brackets.len()
    }

    pub(crate) fn truncate_brackets(&mut self, depth: usize) {
        self.open_brackets.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_outer_ones() {
        let mut context = ParserContext::new();
        context.push_scope(vec![Parameter::new("x", Type::Int)]);
        context.push_scope(vec![Parameter::new("x", Type::Double)]);
        assert_eq!(context.lookup("x").map(|param| &param.ty), Some(&Type::Double));
        context.pop_scope();
        assert_eq!(context.lookup("x").map(|param| &param.ty), Some(&Type::Int));
        assert!(context.lookup("y").is_none());
    }

    #[test]
    fn hidden_locals_get_distinct_names() {
        let mut context = ParserContext::new();
        let first = context.push_hidden(Type::String);
        let second = context.push_hidden(Type::String);
        assert_ne!(first.name, second.name);
        assert!(first.name.starts_with('$'));
    }
}
