use exprc_engine::{Compiled, Compiler, EvalError, Type, Value};

fn eval(input: &str) -> Result<Value, EvalError> {
    let tree = Compiler::standard()
        .parse(input)
        .unwrap_or_else(|err| panic!("{input:?} should parse: {err}"));
    Compiled::new(tree).invoke(&[])
}

fn eval_with(input: &str, params: &[(&str, Type, Value)]) -> Result<Value, EvalError> {
    let names: Vec<&str> = params.iter().map(|(name, ..)| *name).collect();
    let types: Vec<Type> = params.iter().map(|(_, ty, _)| ty.clone()).collect();
    let values: Vec<Value> = params.iter().map(|(.., value)| value.clone()).collect();
    let tree = Compiler::standard()
        .parse_with(input, &names, &types)
        .unwrap_or_else(|err| panic!("{input:?} should parse: {err}"));
    Compiled::new(tree).invoke(&values)
}

#[test]
fn arithmetic() -> anyhow::Result<()> {
    assert_eq!(eval("1 + 2 * 3")?, Value::Int(7));
    assert_eq!(eval("7 / 2")?, Value::Int(3));
    assert_eq!(eval("7 % 4")?, Value::Int(3));
    assert_eq!(eval("7 / 2.0")?, Value::Double(3.5));
    assert_eq!(eval("2 ^ 10")?, Value::Double(1024.0));
    assert_eq!(eval("1 << 4")?, Value::Int(16));
    assert_eq!(eval("-(3)")?, Value::Int(-3));
    assert_eq!(eval("1.1m + 2.2m")?.to_string(), "3.3");
    Ok(())
}

#[test]
fn integer_errors() {
    assert_eq!(eval("int.MaxValue + 1"), Err(EvalError::Overflow));
    assert_eq!(eval("1 / 0"), Err(EvalError::DivideByZero));
    let Ok(Value::Double(infinite)) = eval("1.0 / 0") else {
        panic!("floating division by zero is not an error");
    };
    assert!(infinite.is_infinite());
}

#[test]
fn short_circuit_skips_the_right_operand() -> anyhow::Result<()> {
    assert_eq!(eval("false && 1 / 0 == 1")?, Value::Bool(false));
    assert_eq!(eval("true || 1 / 0 == 1")?, Value::Bool(true));
    assert_eq!(eval("1 < 2 ? \"yes\" : \"no\"")?, Value::from("yes"));
    Ok(())
}

#[test]
fn null_handling() -> anyhow::Result<()> {
    let missing = ("s", Type::String, Value::Null);
    assert_eq!(
        eval_with("s ?? \"fallback\"", &[missing.clone()])?,
        Value::from("fallback")
    );
    assert_eq!(
        eval_with("s.Length", &[missing.clone()]),
        Err(EvalError::NullReference)
    );
    assert!(eval_with("s?.Length", &[missing])?.is_null());

    let none = ("n", Type::Int.nullable(), Value::Null);
    assert!(eval_with("n + 1", &[none.clone()])?.is_null());
    assert_eq!(eval_with("n < 1", &[none.clone()])?, Value::Bool(false));
    assert_eq!(eval_with("n ?? 5", &[none.clone()])?, Value::Int(5));
    assert_eq!(eval_with("n.HasValue", &[none])?, Value::Bool(false));
    Ok(())
}

#[test]
fn type_tests_and_casts() -> anyhow::Result<()> {
    let text = ("o", Type::Object, Value::from("a"));
    assert_eq!(eval_with("o is string", &[text.clone()])?, Value::Bool(true));
    assert_eq!(eval_with("o as string", &[text.clone()])?, Value::from("a"));
    assert!(eval_with("o as int?", &[text.clone()])?.is_null());
    assert!(matches!(
        eval_with("(int)o", &[text]),
        Err(EvalError::InvalidCast { .. })
    ));
    assert_eq!(eval("(int)2.9")?, Value::Int(2));
    assert_eq!(eval("(char)98")?, Value::Char('b'));
    Ok(())
}

#[test]
fn strings_and_math() -> anyhow::Result<()> {
    assert_eq!(eval("\"abc\".ToUpper() + 1")?, Value::from("ABC1"));
    assert_eq!(eval("\"abc\"[1]")?, Value::Char('b'));
    assert_eq!(eval("\"a\" + \"b\" + \"c\"")?, Value::from("abc"));
    assert_eq!(eval("Math.Round(2.5)")?, Value::Double(2.0));
    assert_eq!(eval("Max(3, 4)")?, Value::Int(4));
    assert_eq!(eval("sqrt(16)")?, Value::Double(4.0));
    assert!(matches!(
        eval("\"abc\"[5]"),
        Err(EvalError::IndexOutOfRange { index: 5, len: 3 })
    ));
    Ok(())
}

#[test]
fn arrays_and_lists() -> anyhow::Result<()> {
    let items = (
        "a",
        Type::array(Type::Int, 1),
        Value::array(Type::Int, vec![Value::Int(4), Value::Int(5), Value::Int(6)]),
    );
    assert_eq!(eval_with("a[1] + a.Length", &[items.clone()])?, Value::Int(8));
    assert_eq!(eval_with("a.First()", &[items.clone()])?, Value::Int(4));
    assert_eq!(eval_with("a.Contains(6)", &[items.clone()])?, Value::Bool(true));
    assert_eq!(eval_with("Enumerable.Count(a)", &[items])?, Value::Int(3));
    assert_eq!(eval("new List<int>().Count")?, Value::Int(0));
    Ok(())
}

#[test]
fn assignments_write_back() -> anyhow::Result<()> {
    let x = ("x", Type::Int, Value::Int(1));
    assert_eq!(eval_with("x = x + 1", &[x.clone()])?, Value::Int(2));
    assert_eq!(eval_with("x += 2", &[x.clone()])?, Value::Int(3));
    assert_eq!(eval_with("x++", &[x.clone()])?, Value::Int(1));
    assert_eq!(eval_with("++x", &[x.clone()])?, Value::Int(2));
    assert_eq!(eval_with("(x = 5) + x", &[x])?, Value::Int(10));
    Ok(())
}

#[test]
fn lambdas_are_values() -> anyhow::Result<()> {
    assert_eq!(eval("((int y) => y * 2)(21)")?, Value::Int(42));
    let adder = eval_with(
        "(double y) => x + y",
        &[("x", Type::Double, Value::Double(1.5))],
    )?;
    let Value::Function(closure) = adder else {
        panic!("expected a function value");
    };
    assert_eq!(closure.invoke(vec![Value::Double(2.0)])?, Value::Double(3.5));
    Ok(())
}

#[test]
fn arguments_are_checked_and_converted() -> anyhow::Result<()> {
    let tree = Compiler::standard().parse_with("x * 2", &["x"], &[Type::Double])?;
    let compiled = Compiled::new(tree);
    assert_eq!(compiled.invoke(&[Value::Int(3)])?, Value::Double(6.0));
    assert_eq!(
        compiled.invoke(&[]),
        Err(EvalError::ArgumentCount {
            expected: 1,
            found: 0
        })
    );
    Ok(())
}
