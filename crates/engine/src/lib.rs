//! Compiles textual expressions into typed trees, evaluates them and rewrites them.
//!
//! [`Compiler`] turns text into an [`Expr`] tree using an operator table and pluggable token
//! builders ([`ParserOptions`]) over a universe of known types ([`TypeFinder`]). Trees can be
//! evaluated with [`Compiled`], simplified, differentiated or compared for equivalence.

pub mod ast;
pub mod builders;
pub mod compiler;
pub mod error;
pub mod eval;
pub mod options;
pub mod parser;
pub mod resolver;
pub mod transform;
pub mod types;
pub mod universe;
pub mod value;

pub use crate::ast::{BinaryOp, Expr, ExprRef, Parameter, UnaryOp};
pub use crate::compiler::Compiler;
pub use crate::error::{CompileError, EvalError, TransformError};
pub use crate::eval::{Compiled, Env, evaluate};
pub use crate::options::{OptionsFile, ParserOptions};
pub use crate::transform::{
    Differentiator, ExprComparer, Simplifier, are_equivalent, differentiate, simplify,
};
pub use crate::types::Type;
pub use crate::universe::{TypeDef, TypeFinder, TypeUniverse};
pub use crate::value::Value;
