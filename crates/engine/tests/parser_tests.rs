use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use exprc_engine::universe::{TypeDef, TypeUniverse};
use exprc_engine::{
    BinaryOp, CompileError, Compiled, Compiler, Expr, ExprRef, ParserOptions, Type, UnaryOp, Value,
};

fn parse_ok(input: &str) -> ExprRef {
    Compiler::standard()
        .parse(input)
        .unwrap_or_else(|err| panic!("{input:?} should parse: {err}"))
}

fn parse_err(input: &str) -> CompileError {
    match Compiler::standard().parse(input) {
        Ok(expr) => panic!("expression unexpectedly parsed: {input} => {expr}"),
        Err(err) => err,
    }
}

/// Parse over double parameters and return the lambda body.
fn body_of(compiler: &Compiler, input: &str, names: &[&str], types: &[Type]) -> ExprRef {
    let tree = compiler
        .parse_with(input, names, types)
        .unwrap_or_else(|err| panic!("{input:?} should parse: {err}"));
    let Expr::Lambda { body, .. } = &*tree else {
        panic!("expected a lambda, got {tree}");
    };
    body.clone()
}

fn doubles(input: &str, names: &[&str]) -> ExprRef {
    let types = vec![Type::Double; names.len()];
    body_of(&Compiler::standard(), input, names, &types)
}

fn root_op(expr: &Expr) -> BinaryOp {
    let Expr::Binary { op, .. } = expr else {
        panic!("expected a binary node, got {expr}");
    };
    *op
}

#[test]
fn tighter_operator_ends_up_on_the_left() {
    let cases = [
        ("1 * 2 + 3", BinaryOp::Add, BinaryOp::Multiply),
        ("1 + 2 << 3", BinaryOp::LeftShift, BinaryOp::Add),
        ("1 << 2 < 3", BinaryOp::LessThan, BinaryOp::LeftShift),
        ("1 < 2 == true", BinaryOp::Equal, BinaryOp::LessThan),
        ("true == false & true", BinaryOp::And, BinaryOp::Equal),
        ("true & false | true", BinaryOp::Or, BinaryOp::And),
        ("true | false && true", BinaryOp::AndAlso, BinaryOp::Or),
        ("true && false || true", BinaryOp::OrElse, BinaryOp::AndAlso),
    ];
    for (input, root, left) in cases {
        let expr = parse_ok(input);
        let Expr::Binary { op, left: lhs, .. } = &*expr else {
            panic!("expected a binary node for {input}");
        };
        assert_eq!(*op, root, "root of {input}");
        assert_eq!(root_op(lhs), left, "left operand of {input}");
    }
}

/// Parameters available to the operator table sweep.
const SWEEP_NAMES: [&str; 6] = ["i", "d", "b", "n", "s", "o"];

fn sweep_types() -> Vec<Type> {
    vec![
        Type::Int,
        Type::Double,
        Type::Bool,
        Type::Int.nullable(),
        Type::String,
        Type::Object,
    ]
}

fn strip_converts(expr: &ExprRef) -> &ExprRef {
    match &**expr {
        Expr::Unary {
            op: UnaryOp::Convert,
            operand,
            ..
        } => strip_converts(operand),
        _ => expr,
    }
}

/// Priority of the operator that built `expr`, if any.
fn level_of(options: &ParserOptions, expr: &ExprRef) -> Option<u8> {
    let symbol = match &**strip_converts(expr) {
        Expr::Binary {
            op: BinaryOp::ArrayIndex,
            ..
        } => return None,
        Expr::Binary { op, .. } => op.symbol(),
        Expr::Conditional { .. } => "?",
        Expr::TypeIs { .. } => "is",
        Expr::Unary {
            op: UnaryOp::TypeAs,
            ..
        } => "as",
        Expr::Call { method, .. } if method.name == "Concat" => "+",
        _ => return None,
    };
    options.operators.get(symbol).map(|def| def.priority)
}

/// Samples of `symbol` applied to leaves, each usable as one operand of a looser operator.
fn samples(symbol: &str) -> Vec<String> {
    match symbol {
        "^" => vec!["d ^ d".into(), "(int)d ^ d".into()],
        "is" => vec!["o is int".into()],
        "as" => vec!["o as string".into()],
        "?" => vec!["b ? 1 : 2".into()],
        "??" => vec!["n ?? 1".into(), "o ?? o".into(), "s ?? s".into()],
        _ => [("1", "2"), ("2.5", "1.5"), ("true", "false"), ("s", "s"), ("o", "o")]
            .iter()
            .map(|(l, r)| format!("{l} {symbol} {r}"))
            .collect(),
    }
}

/// `tight` placed on the right of `loose`, then on its left.
fn spellings(loose: &str, tight: &str, leaf: &str) -> [Option<String>; 2] {
    match loose {
        "?" => [
            Some(format!("true ? {leaf} : {tight}")),
            Some(format!("{tight} ? {leaf} : {leaf}")),
        ],
        "is" => [None, Some(format!("{tight} is int"))],
        "as" => [None, Some(format!("{tight} as string"))],
        _ => [
            Some(format!("{leaf} {loose} {tight}")),
            Some(format!("{tight} {loose} {leaf}")),
        ],
    }
}

/// The operand that holds the tighter operator.
fn tight_operand<'a>(root: &'a ExprRef, compound: bool, on_right: bool) -> Option<&'a ExprRef> {
    let root = strip_converts(root);
    match (&**root, on_right) {
        (
            Expr::Binary {
                op: BinaryOp::Assign,
                right,
                ..
            },
            true,
        ) if compound => match &**strip_converts(right) {
            Expr::Binary { right, .. } => Some(right),
            Expr::Call { args, .. } => args.last(),
            _ => None,
        },
        (Expr::Binary { right, .. }, true) => Some(right),
        (Expr::Binary { left, .. }, false) => Some(left),
        (Expr::Conditional { if_false, .. }, true) => Some(if_false),
        (Expr::Conditional { test, .. }, false) => Some(test),
        (Expr::TypeIs { operand, .. }, false) => Some(operand),
        (Expr::Unary { operand, .. }, false) => Some(operand),
        (Expr::Call { args, .. }, true) => args.last(),
        (Expr::Call { args, .. }, false) => args.first(),
        _ => None,
    }
}

#[test]
fn every_operator_pair_nests_by_priority() {
    use exprc_engine::options::Arity;

    let compiler = Compiler::standard();
    let options = ParserOptions::default();
    let types = sweep_types();
    let leaves = ["1", "2.5", "true", "i", "d", "b", "o", "s", "n"];
    let mut table: Vec<_> = options
        .operators
        .values()
        .filter(|def| matches!(def.arity, Arity::Binary | Arity::Ternary) && def.priority < 150)
        .collect();
    table.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.symbol.cmp(&b.symbol)));

    let mut verified = Vec::new();
    for tight in &table {
        for loose in table.iter().filter(|loose| loose.priority < tight.priority) {
            let compound = loose.priority == options.operators["="].priority && loose.symbol != "=";
            let checked = samples(&tight.symbol).iter().find_map(|sample| {
                leaves.iter().find_map(|leaf| {
                    spellings(&loose.symbol, sample, leaf)
                        .into_iter()
                        .zip([true, false])
                        .find_map(|(input, on_right)| {
                            let input = input?;
                            let tree = compiler.parse_with(&input, &SWEEP_NAMES, &types).ok()?;
                            let Expr::Lambda { body, .. } = &*tree else {
                                panic!("expected a lambda for {input}");
                            };
                            Some((input, body.clone(), on_right))
                        })
                })
            });
            let Some((input, body, on_right)) = checked else {
                continue;
            };
            assert_eq!(
                level_of(&options, &body),
                Some(loose.priority),
                "root of {input} should be {}: {body}",
                loose.symbol
            );
            let operand = tight_operand(&body, compound, on_right)
                .unwrap_or_else(|| panic!("no operand holds {} in {input}: {body}", tight.symbol));
            assert_eq!(
                level_of(&options, operand),
                Some(tight.priority),
                "{} should nest under {} in {input}: {body}",
                tight.symbol,
                loose.symbol
            );
            verified.push((tight.symbol.clone(), loose.symbol.clone()));
        }
    }

    for symbol in table.iter().map(|def| &def.symbol) {
        assert!(
            verified.iter().any(|(tight, loose)| tight == symbol || loose == symbol),
            "no well-typed pair exercised {symbol}"
        );
    }
    for (tight, loose) in [
        ("^", "*"),
        ("%", "+"),
        ("/", "-"),
        ("is", "=="),
        ("as", "=="),
        ("||", "??"),
        ("??", "?"),
        ("?", "="),
        ("?", "+="),
    ] {
        assert!(
            verified.contains(&(tight.to_string(), loose.to_string())),
            "{tight} under {loose} was not checked"
        );
    }
}

#[test]
fn same_priority_is_left_associative() {
    let expr = parse_ok("10 - 4 - 3");
    assert_eq!(expr.to_string(), "((10 - 4) - 3)");
}

#[test]
fn power_is_right_associative_and_binds_tighter_than_negation() {
    let expr = doubles("x ^ 2 ^ 3", &["x"]);
    let Expr::Binary {
        op: BinaryOp::Power,
        right,
        ..
    } = &*expr
    else {
        panic!("expected a power, got {expr}");
    };
    assert_eq!(root_op(right), BinaryOp::Power);

    let negated = doubles("-x ^ 2", &["x"]);
    assert!(matches!(
        &*negated,
        Expr::Unary {
            op: UnaryOp::Negate,
            operand,
            ..
        } if root_op(operand) == BinaryOp::Power
    ));
}

#[test]
fn prefix_and_cast_bind_tighter_than_multiplication() {
    let product = doubles("-a * b", &["a", "b"]);
    let Expr::Binary {
        op: BinaryOp::Multiply,
        left,
        ..
    } = &*product
    else {
        panic!("expected a product, got {product}");
    };
    assert!(matches!(&**left, Expr::Unary { op: UnaryOp::Negate, .. }));

    let cast = doubles("(int)x * 2", &["x"]);
    let Expr::Binary {
        op: BinaryOp::Multiply,
        left,
        ty,
        ..
    } = &*cast
    else {
        panic!("expected a product, got {cast}");
    };
    assert_eq!(*ty, Type::Int);
    assert!(matches!(&**left, Expr::Unary { op: UnaryOp::Convert, ty: Type::Int, .. }));
}

#[test]
fn unbalanced_brackets_are_reported() {
    for input in [
        "(1 + 2",
        "1 + 2)",
        "((1)",
        "Math.Max(1, 2",
        "(1]",
        "\"abc\"[0",
        "(1, 2",
        "(1 2",
        "Math.Max(1 2",
    ] {
        let err = parse_err(input);
        assert!(
            matches!(err, CompileError::MismatchedBracket { .. }),
            "{input}: {err:?}"
        );
    }

    let err = Compiler::standard()
        .parse_with("(a, b", &["a", "b"], &[Type::Double, Type::Double])
        .unwrap_err();
    assert!(matches!(err, CompileError::MismatchedBracket { offset: 0, .. }), "{err:?}");
}

#[test]
fn balanced_brackets_parse() {
    for input in ["((1))", "Math.Max((1), (2))", "\"abc\"[(0)]", "(1 + 2) * (3 - 4)"] {
        parse_ok(input);
    }
}

#[test]
fn mixed_arithmetic_widens_the_integer_operand() {
    let expr = parse_ok("1 + 2.5");
    let Expr::Binary {
        op: BinaryOp::Add,
        left,
        right,
        ty,
    } = &*expr
    else {
        panic!("expected an addition, got {expr}");
    };
    assert_eq!(*ty, Type::Double);
    assert_eq!(left.ty(), Type::Double);
    assert_eq!(right.ty(), Type::Double);
    assert!(matches!(&**left, Expr::Unary { op: UnaryOp::Convert, .. }));
}

#[test]
fn string_concatenation_is_flattened() {
    let expr = body_of(
        &Compiler::standard(),
        "a + b + c",
        &["a", "b", "c"],
        &[Type::String, Type::String, Type::String],
    );
    let Expr::Call { method, args, .. } = &*expr else {
        panic!("expected a call, got {expr}");
    };
    assert_eq!(method.name, "Concat");
    assert_eq!(args.len(), 3);
}

fn demo_compiler(calls: Arc<AtomicUsize>) -> Compiler {
    let mut universe = TypeUniverse::standard();
    universe
        .register(
            TypeDef::new("Demo.Functions")
                .with_static_method("F", vec![Type::Int], Type::Int, |_| Ok(Value::Int(1)))
                .with_static_method("F", vec![Type::Double], Type::Double, |_| {
                    Ok(Value::Double(2.0))
                }),
        )
        .register(TypeDef::new("Demo.Source").with_static_method(
            "Fetch",
            vec![Type::Bool],
            Type::String,
            move |args| {
                calls.fetch_add(1, Ordering::SeqCst);
                let missing = args.first().map(Value::as_bool).transpose()?;
                Ok(if missing == Some(true) {
                    Value::Null
                } else {
                    Value::from("abc")
                })
            },
        ));
    let mut options = ParserOptions::default();
    options.imports.push("Demo.Functions".to_string());
    Compiler::new(options, Arc::new(universe))
}

#[test]
fn exact_overload_wins_and_is_stable() {
    let compiler = demo_compiler(Arc::default());
    for _ in 0..3 {
        let expr = compiler.parse("F(1)").unwrap();
        let Expr::Call { method, .. } = &*expr else {
            panic!("expected a call, got {expr}");
        };
        assert_eq!(method.params, vec![Type::Int]);
    }

    let widened = compiler.parse("F(1L)").unwrap();
    let Expr::Call { method, .. } = &*widened else {
        panic!("expected a call, got {widened}");
    };
    assert_eq!(method.params, vec![Type::Double]);
}

#[test]
fn null_conditional_evaluates_its_receiver_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let compiler = demo_compiler(calls.clone());
    let tree = compiler
        .parse_with("Demo.Source.Fetch(missing)?.Length", &["missing"], &[Type::Bool])
        .unwrap();
    let Expr::Lambda { body, .. } = &*tree else {
        panic!("expected a lambda");
    };
    assert_eq!(body.ty(), Type::Int.nullable());

    let compiled = Compiled::new(tree.clone());
    let missing = compiled.invoke(&[Value::Bool(true)]).unwrap();
    assert!(missing.is_null());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let present = compiled.invoke(&[Value::Bool(false)]).unwrap();
    assert!(matches!(present, Value::Int(3)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn lambdas() {
    let expr = parse_ok("x => x + 1");
    let Expr::Lambda { params, body } = &*expr else {
        panic!("expected a lambda, got {expr}");
    };
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].ty, Type::Double);
    assert_eq!(body.ty(), Type::Double);

    let typed = parse_ok("(int a, long b) => a + b");
    assert_eq!(typed.ty(), Type::function(vec![Type::Int, Type::Long], Type::Long));

    let empty = parse_ok("() => 42");
    assert_eq!(empty.ty(), Type::function(vec![], Type::Int));

    let expected = Compiler::standard()
        .parse_lambda("(a, b) => a * b", &[Type::Int, Type::Int])
        .unwrap();
    assert_eq!(expected.ty(), Type::function(vec![Type::Int, Type::Int], Type::Int));
}

#[test]
fn lambda_errors() {
    assert!(matches!(
        parse_err("(a b c) => a"),
        CompileError::MalformedLambda { .. }
    ));
    let CompileError::DuplicateParameter { name, .. } = parse_err("(a, a) => a") else {
        panic!("expected a duplicate parameter error");
    };
    assert_eq!(name, "a");
}

#[test]
fn unknown_identifiers_are_unknown_types() {
    let CompileError::UnknownType { name, offset } = parse_err("1 + foo") else {
        panic!("expected an unknown type error");
    };
    assert_eq!(name, "foo");
    assert_eq!(offset, 4);
}

#[test]
fn casts_and_groups() {
    let cast = parse_ok("(int)2.5");
    assert!(matches!(&*cast, Expr::Unary { op: UnaryOp::Convert, ty: Type::Int, .. }));

    let negative = parse_ok("(double)-1");
    assert_eq!(negative.ty(), Type::Double);

    // A parenthesized local followed by a sign is arithmetic.
    let difference = doubles("(x) - 1", &["x"]);
    assert_eq!(root_op(&difference), BinaryOp::Subtract);

    let nullable = parse_ok("(int?)null");
    assert_eq!(nullable.ty(), Type::Int.nullable());
}

#[test]
fn nullable_marker_versus_conditional() {
    let as_nullable = parse_ok("null as int?");
    assert_eq!(as_nullable.ty(), Type::Int.nullable());

    let conditional = doubles("x is double ? 1 : 2", &["x"]);
    assert!(matches!(&*conditional, Expr::Conditional { .. }));
}

#[test]
fn numeric_suffixes_pick_literal_types() {
    assert_eq!(parse_ok("1L").ty(), Type::Long);
    assert_eq!(parse_ok("1.5f").ty(), Type::Float);
    assert_eq!(parse_ok("2m").ty(), Type::Decimal);
    assert_eq!(parse_ok("3000000000").ty(), Type::Long);
    assert!(matches!(parse_err("1.5L"), CompileError::InvalidLiteral { .. }));
}

#[test]
fn assignment_needs_a_target() {
    assert!(matches!(
        parse_err("1 = 2"),
        CompileError::InvalidAssignment { .. }
    ));
    let assign = doubles("x += 2", &["x"]);
    assert!(matches!(
        &*assign,
        Expr::Binary {
            op: BinaryOp::Assign,
            ..
        }
    ));
}

#[test]
fn trailing_tokens_are_rejected() {
    assert!(matches!(
        parse_err("1 2"),
        CompileError::UnexpectedToken { .. }
    ));
    assert!(matches!(parse_err("1 +"), CompileError::UnexpectedEnd { .. }));
}
