use exprc_engine::{Compiler, Expr, Type, UnaryOp, Value};

fn int(value: i32) -> exprc_engine::ExprRef {
    Expr::constant(Value::Int(value), Type::Int)
}

#[test]
fn resolves_source_type_names() {
    let compiler = Compiler::standard();
    let resolver = compiler.resolver();

    assert_eq!(resolver.resolve_type("int?"), Some(Type::Int.nullable()));
    assert_eq!(
        resolver.resolve_type("double[,]"),
        Some(Type::array(Type::Double, 2))
    );
    assert_eq!(resolver.resolve_type("System.Int32"), Some(Type::Int));
    assert_eq!(resolver.resolve_type("Int64"), Some(Type::Long));
    assert_eq!(resolver.resolve_type("Nope"), None);

    let Some(Type::Named { args, .. }) = resolver.resolve_type("List<List<int>>") else {
        panic!("nested generic should resolve");
    };
    let [Type::Named { args: inner, .. }] = args.as_slice() else {
        panic!("expected one generic argument, got {args:?}");
    };
    assert_eq!(inner, &vec![Type::Int]);
}

#[test]
fn generic_arity_must_match() {
    let compiler = Compiler::standard();
    assert_eq!(compiler.resolver().resolve_type("List<int, int>"), None);
    assert_eq!(compiler.resolver().resolve_type("List"), None);
}

#[test]
fn repeated_lookups_are_cached_consistently() {
    let compiler = Compiler::standard();
    let first = compiler.resolver().resolve_type("List<double?>");
    let second = compiler.resolver().resolve_type("List<double?>");
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn member_lookup() {
    let compiler = Compiler::standard();
    let resolver = compiler.resolver();
    let math = Type::named("System.Math");

    assert_eq!(resolver.get_static_methods(&math, "Max").len(), 3);
    assert!(resolver.get_static_methods(&math, "max").is_empty());
    assert_eq!(resolver.get_static_methods_ignore_case(&math, "max").len(), 3);

    assert!(
        resolver
            .get_instance_property_or_field(&Type::String, "Length")
            .is_some()
    );
    assert!(resolver.get_static_property_or_field(&math, "PI").is_some());
    assert!(resolver.get_instance_property_or_field(&math, "PI").is_none());

    // `ToString` is inherited from object; `First` comes from the extension methods.
    assert!(!resolver.get_instance_methods(&Type::Int, "ToString").is_empty());
    let ints = Type::array(Type::Int, 1);
    assert!(!resolver.get_instance_methods(&ints, "First").is_empty());
}

#[test]
fn overload_selection_prefers_the_smallest_distance() {
    let compiler = Compiler::standard();
    let resolver = compiler.resolver();
    let max = resolver.get_static_methods(&Type::named("System.Math"), "Max");

    let exact = resolver
        .select_method(&max, None, &[], &[int(1), int(2)])
        .expect("int overload");
    assert_eq!(exact.member.params, vec![Type::Int, Type::Int]);
    assert_eq!(exact.distance, 0);

    let long = Expr::constant(Value::Long(2), Type::Long);
    let widened = resolver
        .select_method(&max, None, &[], &[int(1), long])
        .expect("long overload");
    assert_eq!(widened.member.params, vec![Type::Long, Type::Long]);
    assert!(widened.distance > 0);
    assert!(matches!(
        &*widened.args[0],
        Expr::Unary {
            op: UnaryOp::Convert,
            ty: Type::Long,
            ..
        }
    ));

    let text = Expr::constant(Value::from("a"), Type::String);
    assert!(resolver.select_method(&max, None, &[], &[text, int(1)]).is_none());
}

#[test]
fn generic_extension_methods_infer_their_arguments() {
    let compiler = Compiler::standard();
    let resolver = compiler.resolver();
    let doubles = Type::array(Type::Double, 1);
    let receiver = Expr::constant(Value::array(Type::Double, vec![]), doubles.clone());
    let candidates = resolver.get_instance_methods(&doubles, "First");

    let selection = resolver
        .select_method(&candidates, Some(&receiver), &[], &[])
        .expect("First applies to double[]");
    assert_eq!(selection.member.ret, Type::Double);
    assert_eq!(selection.args.len(), 1);
}

#[test]
fn constructors_are_selected_by_arguments() {
    let compiler = Compiler::standard();
    let resolver = compiler.resolver();
    let list = resolver.resolve_type("List<int>").expect("list type");
    let constructors = resolver.get_constructors(&list);
    assert!(!constructors.is_empty());
    let selection = resolver
        .select_constructor(&constructors, &[])
        .expect("parameterless constructor");
    assert_eq!(selection.member.declaring_type, list);
}
