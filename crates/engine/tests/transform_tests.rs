use exprc_engine::transform::{Rule, RuleSet, Shape, Transformer, children};
use exprc_engine::{
    Compiled, Compiler, Expr, ExprRef, TransformError, Type, Value, are_equivalent, simplify,
};

fn derivative(input: &str, names: &[&str], variable: &str) -> String {
    let compiler = Compiler::standard();
    let types = vec![Type::Double; names.len()];
    let tree = compiler
        .parse_with(input, names, &types)
        .unwrap_or_else(|err| panic!("{input:?} should parse: {err}"));
    let result = compiler
        .differentiate(&tree, variable)
        .unwrap_or_else(|err| panic!("{input:?} should differentiate: {err}"));
    let Expr::Lambda { body, .. } = &*result else {
        panic!("derivative of a lambda is a lambda, got {result}");
    };
    body.to_string()
}

#[test]
fn seed_derivatives() {
    assert_eq!(derivative("x^2", &["x"], "x"), "(2 * x)");
    assert_eq!(derivative("sin(x)", &["x"], "x"), "Math.Cos(x)");
    assert_eq!(derivative("42", &["x"], "x"), "0");
    assert_eq!(derivative("x*y", &["x", "y"], "x"), "y");
}

#[test]
fn more_derivatives() {
    assert_eq!(derivative("x^3", &["x"], "x"), "(3 * (x ^ 2))");
    assert_eq!(derivative("Math.Pow(x, 2)", &["x"], "x"), "(2 * x)");
    assert_eq!(derivative("log(x)", &["x"], "x"), "(1 / x)");
    assert_eq!(derivative("-x", &["x"], "x"), "-1");
    assert_eq!(derivative("x + Math.PI", &["x"], "x"), "1");
}

#[test]
fn derivative_evaluates_correctly() -> anyhow::Result<()> {
    let compiler = Compiler::standard();
    let at = |compiled: &Compiled, x: f64| -> anyhow::Result<f64> {
        let value = compiled.invoke(&[Value::Double(x)])?;
        value
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("not a number: {value}"))
    };
    let h = 1e-6;
    for input in [
        "x * Math.Sin(x) / (1 + x^2)",
        "Math.Tan(x)",
        "Math.Log(x, 2) + Math.Sqrt(x)",
        "x ^ x",
    ] {
        let tree = compiler.parse_with(input, &["x"], &[Type::Double])?;
        let derived = Compiled::new(compiler.differentiate(&tree, "x")?);
        let original = Compiled::new(tree);
        for x in [0.3, 1.0, 2.5] {
            let numeric = (at(&original, x + h)? - at(&original, x - h)?) / (2.0 * h);
            let symbolic = at(&derived, x)?;
            assert!(
                (numeric - symbolic).abs() < 1e-4 * (1.0 + symbolic.abs()),
                "{input} at {x}: numeric {numeric}, symbolic {symbolic}"
            );
        }
    }
    Ok(())
}

#[test]
fn non_differentiable_nodes_have_no_rule() {
    let compiler = Compiler::standard();
    let tree = compiler
        .parse_with("Math.Abs(x)", &["x"], &[Type::Double])
        .unwrap();
    assert!(matches!(
        compiler.differentiate(&tree, "x"),
        Err(TransformError::NoRewriteRule { shape: "call", .. })
    ));
}

#[test]
fn alpha_equivalence() -> anyhow::Result<()> {
    let compiler = Compiler::standard();
    let a = compiler.parse("(a) => a + 1")?;
    let b = compiler.parse("(b) => b + 1")?;
    assert!(are_equivalent(&a, &b)?);

    let forward = compiler.parse("(a, b) => a - b")?;
    let backward = compiler.parse("(a, b) => b - a")?;
    assert!(!are_equivalent(&forward, &backward)?);
    Ok(())
}

#[test]
fn simplification_keeps_meaning() -> anyhow::Result<()> {
    let compiler = Compiler::standard();
    let tree = compiler.parse_with("(x + 0) * (2 * 3) - x * 1", &["x"], &[Type::Double])?;
    let simplified = simplify(&tree)?;
    let Expr::Lambda { body, .. } = &*simplified else {
        panic!("expected a lambda");
    };
    assert_eq!(body.to_string(), "((6 * x) - x)");
    let value = Compiled::new(simplified).invoke(&[Value::Double(2.0)])?;
    assert_eq!(value, Value::Double(10.0));
    Ok(())
}

/// Replaces every constant by zero and keeps everything else.
#[derive(Debug)]
struct ConstantsToZero {
    rules: RuleSet<ConstantsToZero>,
}

impl Transformer for ConstantsToZero {
    fn rules(&self) -> &RuleSet<Self> {
        &self.rules
    }

    fn finalize_expression(&self, node: &ExprRef) -> Result<ExprRef, TransformError> {
        Ok(node.clone())
    }
}

#[test]
fn custom_transformers_use_the_same_engine() -> anyhow::Result<()> {
    let transformer = ConstantsToZero {
        rules: RuleSet::new().with(Rule::shape("zero", Shape::Constant, |_, node, _| {
            Ok(Expr::constant(Value::Int(0), node.ty()))
        })),
    };
    assert_eq!(transformer.rules().len(), 1);
    let tree = Compiler::standard().parse("1 + 2")?;
    let rewritten = transformer.transform(&tree)?;
    assert_eq!(rewritten.to_string(), "(0 + 0)");
    assert_eq!(children(&rewritten).len(), 2);
    Ok(())
}
