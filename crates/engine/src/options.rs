//! Parser configuration: operator table, start builders, ranks, aliases and suffixes.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use exprc_lexer::SymbolTable;
use serde::Deserialize;

use crate::ast::{BinaryOp, UnaryOp};
use crate::builders::follow::{
    AddBuilder, AsBuilder, AssignBuilder, BinaryBuilder, CoalesceBuilder, IndexBuilder,
    InvokeBuilder, IsBuilder, LogicalBuilder, MemberAccessBuilder, NullConditionalBuilder,
    PostfixBuilder, PowerBuilder, TernaryBuilder,
};
use crate::builders::start::{
    BoolBuilder, IdentifierBuilder, LiteralBuilder, NewBuilder, NullBuilder, NumberBuilder,
    ParenBuilder, PrefixBuilder, ThrowBuilder,
};
use crate::builders::{FollowBuilder, StartBuilder};
use crate::compiler::Compiler;
use crate::error::CompileError;
use crate::types::{NumericRanks, Type};

/// How many operands an operator takes around its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
    Ternary,
    Postfix,
}

/// A follow-up operator: its priority level and the builder that consumes it.
#[derive(Debug, Clone)]
pub struct OperatorDef {
    pub symbol: String,
    /// Higher binds tighter.
    pub priority: u8,
    pub arity: Arity,
    pub right_assoc: bool,
    pub builder: Arc<dyn FollowBuilder>,
}

impl OperatorDef {
    /// Floor for parsing the right operand.
    pub fn right_floor(&self) -> u8 {
        if self.right_assoc {
            self.priority.saturating_sub(1)
        } else {
            self.priority
        }
    }
}

/// Static tables that drive the parser.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub operators: HashMap<String, OperatorDef>,
    /// Builders for tokens at the start of an operand, keyed by exact token text.
    pub start_builders: HashMap<String, Arc<dyn StartBuilder>>,
    pub number_builder: Arc<dyn StartBuilder>,
    /// String and char literals.
    pub literal_builder: Arc<dyn StartBuilder>,
    /// Fallback for identifiers without a start builder of their own.
    pub identifier_builder: Arc<dyn StartBuilder>,
    pub ranks: NumericRanks,
    pub aliases: HashMap<String, Type>,
    /// Numeric literal suffixes, lower case.
    pub suffixes: HashMap<char, Type>,
    pub generic_open: String,
    pub generic_close: String,
    pub lambda_arrow: String,
    pub null_conditional: String,
    /// Types whose static methods may be called without qualification.
    pub imports: Vec<String>,
    /// Type of untyped lambda parameters when no signature is expected.
    pub default_parameter_type: Type,
    /// Floor used for the operand of a prefix operator or a cast.
    pub prefix_priority: u8,
}

impl Default for ParserOptions {
    fn default() -> Self {
        let mut options = Self {
            operators: HashMap::new(),
            start_builders: HashMap::new(),
            number_builder: Arc::new(NumberBuilder),
            literal_builder: Arc::new(LiteralBuilder),
            identifier_builder: Arc::new(IdentifierBuilder),
            ranks: NumericRanks::default(),
            aliases: default_aliases(),
            suffixes: HashMap::from([
                ('l', Type::Long),
                ('f', Type::Float),
                ('d', Type::Double),
                ('m', Type::Decimal),
            ]),
            generic_open: "<".to_string(),
            generic_close: ">".to_string(),
            lambda_arrow: "=>".to_string(),
            null_conditional: "?.".to_string(),
            imports: vec!["System.Math".to_string()],
            default_parameter_type: Type::Double,
            prefix_priority: 132,
        };

        options
            .operator(".", 150, Arity::Binary, false, MemberAccessBuilder)
            .operator("?.", 150, Arity::Binary, false, NullConditionalBuilder)
            .operator("[", 150, Arity::Binary, false, IndexBuilder)
            .operator("(", 150, Arity::Binary, false, InvokeBuilder)
            .operator("++", 150, Arity::Postfix, false, PostfixBuilder(UnaryOp::PostIncrementAssign))
            .operator("--", 150, Arity::Postfix, false, PostfixBuilder(UnaryOp::PostDecrementAssign))
            .operator("^", 135, Arity::Binary, true, PowerBuilder)
            .operator("*", 130, Arity::Binary, false, BinaryBuilder(BinaryOp::Multiply))
            .operator("/", 130, Arity::Binary, false, BinaryBuilder(BinaryOp::Divide))
            .operator("%", 130, Arity::Binary, false, BinaryBuilder(BinaryOp::Modulo))
            .operator("+", 120, Arity::Binary, false, AddBuilder)
            .operator("-", 120, Arity::Binary, false, BinaryBuilder(BinaryOp::Subtract))
            .operator("<<", 110, Arity::Binary, false, BinaryBuilder(BinaryOp::LeftShift))
            .operator(">>", 110, Arity::Binary, false, BinaryBuilder(BinaryOp::RightShift))
            .operator("<", 100, Arity::Binary, false, BinaryBuilder(BinaryOp::LessThan))
            .operator(">", 100, Arity::Binary, false, BinaryBuilder(BinaryOp::GreaterThan))
            .operator("<=", 100, Arity::Binary, false, BinaryBuilder(BinaryOp::LessThanOrEqual))
            .operator(">=", 100, Arity::Binary, false, BinaryBuilder(BinaryOp::GreaterThanOrEqual))
            .operator("is", 100, Arity::Binary, false, IsBuilder)
            .operator("as", 100, Arity::Binary, false, AsBuilder)
            .operator("==", 90, Arity::Binary, false, BinaryBuilder(BinaryOp::Equal))
            .operator("!=", 90, Arity::Binary, false, BinaryBuilder(BinaryOp::NotEqual))
            .operator("&", 80, Arity::Binary, false, BinaryBuilder(BinaryOp::And))
            .operator("|", 60, Arity::Binary, false, BinaryBuilder(BinaryOp::Or))
            .operator("&&", 50, Arity::Binary, false, LogicalBuilder(BinaryOp::AndAlso))
            .operator("||", 40, Arity::Binary, false, LogicalBuilder(BinaryOp::OrElse))
            .operator("??", 30, Arity::Binary, true, CoalesceBuilder)
            .operator("?", 20, Arity::Ternary, true, TernaryBuilder)
            .operator("=", 10, Arity::Binary, true, AssignBuilder(None))
            .operator("+=", 10, Arity::Binary, true, AssignBuilder(Some(BinaryOp::Add)))
            .operator("-=", 10, Arity::Binary, true, AssignBuilder(Some(BinaryOp::Subtract)))
            .operator("*=", 10, Arity::Binary, true, AssignBuilder(Some(BinaryOp::Multiply)))
            .operator("/=", 10, Arity::Binary, true, AssignBuilder(Some(BinaryOp::Divide)))
            .operator("%=", 10, Arity::Binary, true, AssignBuilder(Some(BinaryOp::Modulo)));

        options
            .start("(", ParenBuilder)
            .start("-", PrefixBuilder(UnaryOp::Negate))
            .start("+", PrefixBuilder(UnaryOp::UnaryPlus))
            .start("!", PrefixBuilder(UnaryOp::Not))
            .start("~", PrefixBuilder(UnaryOp::OnesComplement))
            .start("++", PrefixBuilder(UnaryOp::PreIncrementAssign))
            .start("--", PrefixBuilder(UnaryOp::PreDecrementAssign))
            .start("true", BoolBuilder(true))
            .start("false", BoolBuilder(false))
            .start("null", NullBuilder)
            .start("new", NewBuilder)
            .start(")", ThrowBuilder)
            .start("]", ThrowBuilder)
            .start(",", ThrowBuilder)
            .start(":", ThrowBuilder);
        options
    }
}

fn default_aliases() -> HashMap<String, Type> {
    [
        ("object", Type::Object),
        ("bool", Type::Bool),
        ("char", Type::Char),
        ("byte", Type::Byte),
        ("short", Type::Short),
        ("int", Type::Int),
        ("long", Type::Long),
        ("float", Type::Float),
        ("double", Type::Double),
        ("decimal", Type::Decimal),
        ("string", Type::String),
    ]
    .into_iter()
    .map(|(name, ty)| (name.to_string(), ty))
    .collect()
}

impl ParserOptions {
    /// Register or replace a follow-up operator.
    pub fn operator(
        &mut self,
        symbol: &str,
        priority: u8,
        arity: Arity,
        right_assoc: bool,
        builder: impl FollowBuilder + 'static,
    ) -> &mut Self {
        self.operators.insert(
            symbol.to_string(),
            OperatorDef {
                symbol: symbol.to_string(),
                priority,
                arity,
                right_assoc,
                builder: Arc::new(builder),
            },
        );
        self
    }

    /// Register or replace a start builder.
    pub fn start(&mut self, token: &str, builder: impl StartBuilder + 'static) -> &mut Self {
        self.start_builders
            .insert(token.to_string(), Arc::new(builder));
        self
    }

    pub fn priority(&self, symbol: &str) -> Option<u8> {
        self.operators.get(symbol).map(|op| op.priority)
    }

    /// Whether `name` is a primitive alias such as `int`.
    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Trie of every punctuation symbol the parser reacts to.
    pub fn symbol_table(&self) -> SymbolTable {
        let markers = [
            self.generic_open.as_str(),
            self.generic_close.as_str(),
            self.lambda_arrow.as_str(),
            self.null_conditional.as_str(),
            "(",
            ")",
            "[",
            "]",
            ",",
            ":",
        ];
        self.operators
            .keys()
            .chain(self.start_builders.keys())
            .map(String::as_str)
            .chain(markers)
            .filter(|symbol| !symbol.starts_with(|ch: char| ch.is_ascii_alphabetic() || ch == '_'))
            .collect()
    }
}

/// User overrides for [`ParserOptions`], read from YAML.
///
/// ```yaml
/// aliases:
///   real: double
/// priorities:
///   "^": 136
/// imports: [System.Math, Demo.Functions]
/// default_parameter_type: double
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OptionsFile {
    /// New alias name to a type name in source syntax.
    pub aliases: BTreeMap<String, String>,
    /// Operator symbol to priority level.
    pub priorities: BTreeMap<String, u8>,
    pub imports: Option<Vec<String>>,
    pub default_parameter_type: Option<String>,
}

impl OptionsFile {
    /// Apply the overrides, resolving every type name against `compiler`.
    pub fn apply_to(
        &self,
        options: &mut ParserOptions,
        compiler: &Compiler,
    ) -> Result<(), CompileError> {
        let resolver = compiler.resolver();
        let resolve = |name: &str| {
            resolver
                .resolve_type(name)
                .ok_or_else(|| CompileError::UnknownType {
                    name: name.to_string(),
                    offset: 0,
                })
        };

        for (alias, target) in &self.aliases {
            options.aliases.insert(alias.clone(), resolve(target)?);
        }
        for (symbol, priority) in &self.priorities {
            let Some(op) = options.operators.get_mut(symbol) else {
                return Err(CompileError::UnknownToken {
                    token: symbol.clone(),
                    offset: 0,
                });
            };
            op.priority = *priority;
        }
        if let Some(imports) = &self.imports {
            for import in imports {
                resolve(import)?;
            }
            options.imports = imports.clone();
        }
        if let Some(name) = &self.default_parameter_type {
            options.default_parameter_type = resolve(name)?;
        }
        log::debug!(
            "applied options file: {} aliases, {} priorities",
            self.aliases.len(),
            self.priorities.len()
        );
        Ok(())
    }
}

/// Loads an options file from the provided path.
pub fn load_options_file(path: impl AsRef<Path>) -> anyhow::Result<OptionsFile> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    from_yaml_str(&contents)
}

/// Deserializes an options file from a YAML string slice.
pub fn from_yaml_str(yaml: &str) -> anyhow::Result<OptionsFile> {
    Ok(serde_norway::from_str(yaml)?)
}

/// Deserializes an options file from a YAML reader.
pub fn from_yaml_reader<R>(reader: R) -> anyhow::Result<OptionsFile>
where
    R: std::io::Read,
{
    Ok(serde_norway::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_table_holds_punctuation_only() {
        let symbols = ParserOptions::default().symbol_table();
        for symbol in ["?.", "??", "=>", ">=", "<<", "+=", "(", "]", ":"] {
            assert!(symbols.contains(symbol), "missing {symbol}");
        }
        assert!(!symbols.contains("is"));
        assert!(!symbols.contains("new"));
    }

    #[test]
    fn right_associative_operators_lower_their_floor() {
        let options = ParserOptions::default();
        assert_eq!(options.operators["^"].right_floor(), 134);
        assert_eq!(options.operators["*"].right_floor(), 130);
    }

    #[test]
    fn options_file_parses_partial_yaml() {
        let file = from_yaml_str("aliases:\n  real: double\n").expect("valid yaml");
        assert_eq!(file.aliases.get("real").map(String::as_str), Some("double"));
        assert!(file.priorities.is_empty());
        assert!(file.imports.is_none());
    }
}
