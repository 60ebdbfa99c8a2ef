//! Object literals, fields, methods and prototypes.

use mica_engine::ast::Expr;
use mica_engine::{Arity, Object, RuntimeError, Value};

use super::harness::*;

// ============================================================================
// Fields
// ============================================================================

#[test]
fn test_field_read_then_reassign() {
    let harness = Harness::new();
    let log = harness.compile(
        "fields",
        &[],
        vec![
            Expr::declare("o", Expr::object(vec![("a", Expr::int(1)), ("b", Expr::int(2))])),
            Expr::declare("first", Expr::field(Expr::var("o"), "a")),
            Expr::set_field(Expr::var("o"), "b", Expr::int(3)),
            Expr::ret(Expr::object(vec![
                ("first", Expr::var("first")),
                ("second", Expr::field(Expr::var("o"), "b")),
            ])),
        ],
    );
    let result = log.invoke(&Value::Undefined, &[]).unwrap();
    let result = result.as_object().unwrap();
    assert_eq!(result.lookup("first"), Value::Int(1));
    assert_eq!(result.lookup("second"), Value::Int(3));
}

#[test]
fn test_object_literal_keeps_declaration_order() {
    let harness = Harness::new();
    let result = harness
        .run(vec![Expr::ret(Expr::object(vec![
            ("z", Expr::int(1)),
            ("a", Expr::string("x")),
            ("m", Expr::object(vec![])),
        ]))])
        .unwrap();
    let object = result.as_object().unwrap();
    assert_eq!(object.keys(), vec!["z", "a", "m"]);
    assert!(object.prototype().is_none());
    assert!(!object.is_callable());
}

#[test]
fn test_missing_field_is_undefined() {
    expect_value(
        vec![Expr::ret(Expr::field(Expr::object(vec![]), "nothing"))],
        Value::Undefined,
    );
}

#[test]
fn test_field_assignment_adds_new_key() {
    expect_int(
        vec![
            Expr::declare("o", Expr::object(vec![])),
            Expr::set_field(Expr::var("o"), "fresh", Expr::int(4)),
            Expr::ret(Expr::field(Expr::var("o"), "fresh")),
        ],
        4,
    );
}

#[test]
fn test_field_read_on_integer_fails() {
    let err = expect_error(vec![
        Expr::declare("n", Expr::int(1)),
        Expr::ret(Expr::field(Expr::var("n"), "a")),
    ]);
    assert!(matches!(err, RuntimeError::NotAnObject { .. }));
    assert_eq!(err.to_string(), "can not read field a on 1");
}

#[test]
fn test_field_write_on_undefined_fails() {
    let err = expect_error(vec![Expr::set_field(Expr::var("ghost"), "a", Expr::int(1))]);
    assert_eq!(err.to_string(), "can not write field a on undefined");
}

#[test]
fn test_field_reads_through_prototype() {
    let harness = Harness::new();
    let proto = Object::new_object(None);
    proto.register("shared", Value::Int(8));
    let child = Object::new_object(Some(proto));

    let read = harness.compile("read", &["o"], vec![Expr::ret(Expr::field(Expr::var("o"), "shared"))]);
    assert_eq!(read.invoke(&Value::Undefined, &[Value::Object(child.clone())]).unwrap(), Value::Int(8));

    child.register("shared", Value::Int(9));
    assert_eq!(read.invoke(&Value::Undefined, &[Value::Object(child)]).unwrap(), Value::Int(9));
}

#[test]
fn test_function_apply_is_reflexive() {
    let harness = Harness::new();
    let result = harness
        .run(vec![
            Expr::declare("f", Expr::function(None, &[], mica_engine::ast::Block::default())),
            Expr::ret(Expr::field(Expr::var("f"), "apply")),
        ])
        .unwrap();
    let f = result.as_object().unwrap();
    assert_eq!(f.lookup("apply"), result);
}

// ============================================================================
// Methods
// ============================================================================

#[test]
fn test_method_call_binds_receiver() {
    expect_int(
        vec![
            Expr::declare(
                "counter",
                Expr::object(vec![
                    ("count", Expr::int(41)),
                    (
                        "next",
                        Expr::function(
                            None,
                            &[],
                            block(vec![
                                Expr::set_field(
                                    Expr::var("this"),
                                    "count",
                                    binary("+", Expr::field(Expr::var("this"), "count"), Expr::int(1)),
                                ),
                                Expr::ret(Expr::field(Expr::var("this"), "count")),
                            ]),
                        ),
                    ),
                ]),
            ),
            Expr::ret(Expr::method_call(Expr::var("counter"), "next", vec![])),
        ],
        42,
    );
}

#[test]
fn test_method_with_arguments() {
    expect_int(
        vec![
            Expr::declare(
                "calc",
                Expr::object(vec![
                    ("base", Expr::int(10)),
                    (
                        "add",
                        Expr::function(
                            None,
                            &["x", "y"],
                            block(vec![Expr::ret(binary(
                                "+",
                                Expr::field(Expr::var("this"), "base"),
                                binary("*", Expr::var("x"), Expr::var("y")),
                            ))]),
                        ),
                    ),
                ]),
            ),
            Expr::ret(Expr::method_call(Expr::var("calc"), "add", vec![Expr::int(4), Expr::int(8)])),
        ],
        42,
    );
}

#[test]
fn test_method_found_on_prototype() {
    let harness = Harness::new();
    let proto = Object::new_object(None);
    proto.register(
        "greet",
        Value::Object(Object::new_native("greet", Arity::Fixed(0), |this, _| {
            let this = this.as_object().ok_or_else(|| anyhow::anyhow!("no receiver"))?;
            Ok(this.lookup("name"))
        })),
    );
    let child = Object::new_object(Some(proto));
    child.register("name", Value::string("mica"));

    let call = harness.compile("call", &["o"], vec![Expr::ret(Expr::method_call(Expr::var("o"), "greet", vec![]))]);
    assert_eq!(call.invoke(&Value::Undefined, &[Value::Object(child)]).unwrap(), Value::string("mica"));
}

#[test]
fn test_method_resolved_on_every_call() {
    let harness = Harness::new();
    let target = Object::new_object(None);
    target.register("m", Value::Object(Object::new_native("m1", Arity::Fixed(0), |_, _| Ok(Value::Int(1)))));

    let call = harness.compile("call", &["o"], vec![Expr::ret(Expr::method_call(Expr::var("o"), "m", vec![]))]);
    let arg = [Value::Object(target.clone())];
    assert_eq!(call.invoke(&Value::Undefined, &arg).unwrap(), Value::Int(1));

    target.register("m", Value::Object(Object::new_native("m2", Arity::Fixed(0), |_, _| Ok(Value::Int(2)))));
    assert_eq!(call.invoke(&Value::Undefined, &arg).unwrap(), Value::Int(2));
    assert!(call.compiled_unit().unwrap().call_site_regimes().is_empty());
}

#[test]
fn test_missing_method_is_not_callable() {
    let err = expect_error(vec![Expr::ret(Expr::method_call(Expr::object(vec![]), "nope", vec![]))]);
    assert_eq!(err.to_string(), "undefined can not be invoked");
}

#[test]
fn test_method_on_string_fails() {
    let err = expect_error(vec![Expr::ret(Expr::method_call(Expr::string("s"), "len", vec![]))]);
    assert_eq!(err.to_string(), "can not call method len on \"s\"");
}

#[test]
fn test_method_arity_is_checked() {
    let err = expect_error(vec![
        Expr::declare(
            "o",
            Expr::object(vec![("m", Expr::function(None, &["a"], block(vec![])))]),
        ),
        Expr::ret(Expr::method_call(Expr::var("o"), "m", vec![])),
    ]);
    assert!(matches!(err, RuntimeError::ArityMismatch { expected: 1, actual: 0 }));
}
