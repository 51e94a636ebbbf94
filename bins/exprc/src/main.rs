use std::{fmt, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use exprc_engine::{Compiled, Compiler, ExprRef, Type, are_equivalent, options::load_options_file};

mod params;
mod printer;

use params::ParamSpec;

/// A command line tool for compiling, evaluating and rewriting typed expressions.
///
/// Expressions use C#-like syntax: `Math.Sin(x) * 2`, `s?.Length ?? 0`, `(int a) => a + 1`.
/// Free variables are declared with `-p name:type` (and `=value` when evaluating).
#[derive(Parser, Debug)]
#[command(name = "exprc", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub printer: printer::PrinterArgs,

    /// A YAML file with alias, operator priority and import overrides.
    #[arg(long, global = true, value_name = "FILE")]
    pub options: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ParamArgs {
    /// A free variable of the expression, as `name:type` or `name:type=value`. May be repeated.
    #[arg(short = 'p', long = "param", value_name = "NAME:TYPE[=VALUE]")]
    pub params: Vec<ParamSpec>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse an expression and print its typed tree.
    Parse {
        expression: String,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Evaluate an expression. Every parameter needs a value.
    Eval {
        expression: String,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Print the simplified derivative of an expression.
    Diff {
        expression: String,
        /// The variable to differentiate with respect to. Defaults to a double parameter when no
        /// parameters are given.
        #[arg(long)]
        var: String,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Check whether two expressions are equivalent up to renaming of lambda parameters.
    Equiv { left: String, right: String },
}

/// The result of one command, printed as text or serialized.
#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Report {
    Parse {
        tree: String,
        #[serde(rename = "type")]
        ty: String,
    },
    Eval {
        value: String,
        #[serde(rename = "type")]
        ty: String,
    },
    Diff {
        variable: String,
        derivative: String,
    },
    Equiv {
        equivalent: bool,
    },
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Parse { tree, ty } => write!(f, "{tree} : {ty}"),
            Report::Eval { value, ty } => write!(f, "{value} : {ty}"),
            Report::Diff { derivative, .. } => write!(f, "{derivative}"),
            Report::Equiv { equivalent } => write!(f, "{equivalent}"),
        }
    }
}

fn load_compiler(options: Option<&PathBuf>) -> Result<Compiler> {
    let compiler = Compiler::standard();
    let Some(path) = options else {
        return Ok(compiler);
    };
    let file = load_options_file(path).with_context(|| format!("reading {}", path.display()))?;
    log::debug!("loaded options from {}", path.display());
    Ok(compiler.with_options_file(&file)?)
}

/// Parse `expression`, as a lambda over `params` when there are any.
fn compile(compiler: &Compiler, expression: &str, params: &[ParamSpec]) -> Result<ExprRef> {
    if params.is_empty() {
        return Ok(compiler.parse(expression)?);
    }
    let (names, types) = params::signature(params, compiler)?;
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    Ok(compiler.parse_with(expression, &names, &types)?)
}

fn run(compiler: &Compiler, command: Command) -> Result<Report> {
    match command {
        Command::Parse { expression, params } => {
            let tree = compile(compiler, &expression, &params.params)?;
            Ok(Report::Parse {
                tree: tree.to_string(),
                ty: tree.ty().to_string(),
            })
        }
        Command::Eval { expression, params } => {
            let tree = compile(compiler, &expression, &params.params)?;
            let values = params
                .params
                .iter()
                .map(|param| param.resolve_value(compiler))
                .collect::<Result<Vec<_>>>()?;
            let value = Compiled::new(tree)
                .invoke(&values)
                .with_context(|| format!("evaluating {expression}"))?;
            Ok(Report::Eval {
                ty: value.runtime_type().to_string(),
                value: value.to_string(),
            })
        }
        Command::Diff {
            expression,
            var,
            params,
        } => {
            let params = if params.params.is_empty() {
                vec![ParamSpec {
                    name: var.clone(),
                    ty: Type::Double.to_string(),
                    value: None,
                }]
            } else {
                params.params
            };
            let tree = compile(compiler, &expression, &params)?;
            let derivative = compiler
                .differentiate(&tree, &var)
                .with_context(|| format!("differentiating {expression} with respect to {var}"))?;
            Ok(Report::Diff {
                variable: var,
                derivative: derivative.to_string(),
            })
        }
        Command::Equiv { left, right } => {
            let left = compiler.parse(&left)?;
            let right = compiler.parse(&right)?;
            Ok(Report::Equiv {
                equivalent: are_equivalent(&left, &right)?,
            })
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::init();

    let compiler = load_compiler(cli.options.as_ref())?;
    let report = run(&compiler, cli.command)?;

    let mut writer = std::io::stdout();
    cli.printer.output.print(&report, &mut writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> Result<Report> {
        let cli = Cli::try_parse_from(std::iter::once("exprc").chain(args.iter().copied()))?;
        run(&Compiler::standard(), cli.command)
    }

    #[test]
    fn parse_prints_the_typed_tree() -> Result<()> {
        let report = run_args(&["parse", "1 + 2.5"])?;
        assert_eq!(report.to_string(), "((double)1 + 2.5) : double");
        Ok(())
    }

    #[test]
    fn eval_binds_parameter_values() -> Result<()> {
        let report = run_args(&["eval", "x * y", "-p", "x:int=6", "-p", "y:int=7"])?;
        assert_eq!(report.to_string(), "42 : int");
        Ok(())
    }

    #[test]
    fn diff_defaults_the_variable_to_double() -> Result<()> {
        let report = run_args(&["diff", "x^2", "--var", "x"])?;
        assert_eq!(report.to_string(), "(x) => (2 * x)");
        Ok(())
    }

    #[test]
    fn equiv_compares_up_to_renaming() -> Result<()> {
        let report = run_args(&["equiv", "(a) => a + 1", "(b) => b + 1"])?;
        assert!(matches!(report, Report::Equiv { equivalent: true }));
        Ok(())
    }

    #[test]
    fn output_flag_is_accepted_after_the_subcommand() -> Result<()> {
        let cli = Cli::try_parse_from(["exprc", "parse", "1", "-o", "json"])?;
        assert_eq!(cli.printer.output, printer::Format::Json);
        Ok(())
    }
}
