//! Function literals, calls, locals and control flow.

use std::rc::Rc;

use mica_engine::ast::{Block, Expr};
use mica_engine::jit::roots::rooted_count;
use mica_engine::{Arity, CompileError, RuntimeError, Value};

use super::harness::*;

// ============================================================================
// Basic Functions
// ============================================================================

#[test]
fn test_identity_function() {
    let harness = Harness::new();
    let f = harness.compile("f", &["x"], vec![Expr::ret(Expr::var("x"))]);
    assert_eq!(f.invoke(&Value::Undefined, &[Value::Int(42)]).unwrap(), Value::Int(42));
}

#[test]
fn test_return_constant() {
    expect_int(vec![Expr::ret(Expr::int(7))], 7);
}

#[test]
fn test_falling_off_the_end_returns_undefined() {
    expect_value(vec![Expr::declare("x", Expr::int(1))], Value::Undefined);
}

#[test]
fn test_code_after_return_is_skipped() {
    expect_int(vec![Expr::ret(Expr::int(1)), Expr::ret(Expr::int(2))], 1);
}

#[test]
fn test_string_literal() {
    expect_value(
        vec![Expr::declare("s", Expr::string("hi")), Expr::ret(Expr::var("s"))],
        Value::string("hi"),
    );
}

#[test]
fn test_negative_integer_literal() {
    expect_int(vec![Expr::ret(binary("-", Expr::int(-5), Expr::int(3)))], -8);
}

#[test]
fn test_receiver_is_this() {
    let harness = Harness::new();
    let f = harness.compile("self", &[], vec![Expr::ret(Expr::var("this"))]);
    let receiver = Value::string("me");
    assert_eq!(f.invoke(&receiver, &[]).unwrap(), receiver);
}

#[test]
fn test_duplicate_parameters_last_argument_wins() {
    let harness = Harness::new();
    let f = harness.compile("dup", &["a", "a"], vec![Expr::ret(Expr::var("a"))]);
    assert_eq!(f.invoke(&Value::Undefined, &[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(2));
}

// ============================================================================
// Locals
// ============================================================================

#[test]
fn test_read_before_declaration_is_undefined() {
    expect_value(
        vec![Expr::ret(Expr::var("x")), Expr::declare("x", Expr::int(1))],
        Value::Undefined,
    );
}

#[test]
fn test_locals_do_not_leak_between_calls() {
    let harness = Harness::new();
    let g = harness.compile(
        "g",
        &["flag"],
        vec![
            Expr::if_else(
                Expr::var("flag"),
                block(vec![Expr::declare("y", Expr::int(5))]),
                Block::default(),
            ),
            Expr::ret(Expr::var("y")),
        ],
    );
    assert_eq!(g.invoke(&Value::Undefined, &[Value::Bool(true)]).unwrap(), Value::Int(5));
    assert_eq!(g.invoke(&Value::Undefined, &[Value::Bool(false)]).unwrap(), Value::Undefined);
}

#[test]
fn test_branch_declarations_visible_after_branch() {
    expect_int(
        vec![
            Expr::if_else(
                Expr::int(0),
                block(vec![Expr::declare("t", Expr::int(10))]),
                block(vec![Expr::declare("f", Expr::int(20))]),
            ),
            Expr::assign("t", binary("+", Expr::var("t"), Expr::int(1))),
            Expr::ret(Expr::var("t")),
        ],
        11,
    );
}

#[test]
fn test_redeclaration_overwrites_same_slot() {
    expect_int(
        vec![
            Expr::declare("x", Expr::int(1)),
            Expr::declare("x", binary("+", Expr::var("x"), Expr::int(1))),
            Expr::ret(Expr::var("x")),
        ],
        2,
    );
}

#[test]
fn test_statement_in_value_position_is_undefined() {
    let body = vec![
        Expr::declare("x", Expr::int(1)),
        Expr::declare("y", Expr::assign("x", Expr::int(5))),
        Expr::declare("z", Expr::if_else(Expr::int(1), block(vec![]), block(vec![]))),
        Expr::ret(Expr::object(vec![
            ("x", Expr::var("x")),
            ("y", Expr::var("y")),
            ("z", Expr::var("z")),
        ])),
    ];
    let harness = Harness::new();
    let result = harness.run(body).unwrap();
    let object = result.as_object().unwrap();
    assert_eq!(object.lookup("x"), Value::Int(5));
    assert_eq!(object.lookup("y"), Value::Undefined);
    assert_eq!(object.lookup("z"), Value::Undefined);
}

#[test]
fn test_assignment_to_undeclared_name_fails_to_compile() {
    let harness = Harness::new();
    let err = harness
        .try_compile("main", &[], vec![Expr::assign("nope", Expr::int(1)).at(3)])
        .unwrap_err();
    assert_eq!(err, CompileError::UnknownVariable { name: "nope".to_string(), line: 3 });
}

// ============================================================================
// Truth Rule
// ============================================================================

#[test]
fn test_truth_table_in_conditions() {
    let harness = Harness::new();
    let truthy = harness.compile(
        "truthy",
        &["v"],
        vec![
            Expr::if_else(Expr::var("v"), block(vec![Expr::ret(Expr::int(1))]), Block::default()),
            Expr::ret(Expr::int(0)),
        ],
    );
    let check = |v: Value| truthy.invoke(&Value::Undefined, &[v]).unwrap() == Value::Int(1);

    assert!(!check(Value::Undefined));
    assert!(!check(Value::Null));
    assert!(!check(Value::Bool(false)));
    assert!(check(Value::Bool(true)));
    assert!(check(Value::Int(0)));
    assert!(check(Value::string("")));
    assert!(check(Value::Object(harness.global().clone())));
}

// ============================================================================
// Nested Functions
// ============================================================================

#[test]
fn test_recursive_factorial() {
    let fact_body = block(vec![Expr::if_else(
        binary("==", Expr::var("n"), Expr::int(0)),
        block(vec![Expr::ret(Expr::int(1))]),
        block(vec![Expr::ret(binary(
            "*",
            Expr::var("n"),
            Expr::call(Expr::var("fact"), vec![binary("-", Expr::var("n"), Expr::int(1))]),
        ))]),
    )]);
    expect_int(
        vec![
            Expr::function(Some("fact"), &["n"], fact_body),
            Expr::ret(Expr::call(Expr::var("fact"), vec![Expr::int(5)])),
        ],
        120,
    );
}

#[test]
fn test_roots_released_as_calls_return() {
    let harness = Harness::new();
    harness.define("rooted", Arity::Fixed(0), |_, _| Ok(Value::Int(rooted_count() as i32)));
    let less = || binary("-", Expr::var("n"), Expr::int(1));
    let tree = block(vec![
        Expr::if_else(
            binary("==", Expr::var("n"), Expr::int(0)),
            block(vec![Expr::ret(Expr::object(vec![("k", Expr::string("leaf"))]))]),
            Block::default(),
        ),
        Expr::call(Expr::var("t"), vec![less()]),
        Expr::ret(Expr::call(Expr::var("t"), vec![less()])),
    ]);
    let result = harness
        .run(vec![
            Expr::function(Some("t"), &["n"], tree),
            Expr::declare("leaf", Expr::call(Expr::var("t"), vec![Expr::int(12)])),
            Expr::ret(Expr::object(vec![
                ("leaf", Expr::var("leaf")),
                ("rooted", Expr::call(Expr::var("rooted"), vec![])),
            ])),
        ])
        .unwrap();

    // Only what `main` itself touched is still held, not the 8k calls below it
    let summary = result.as_object().unwrap();
    let rooted = summary.lookup("rooted").as_int().unwrap();
    assert!(rooted < 16, "{rooted} values still rooted");
    let leaf = summary.lookup("leaf");
    assert_eq!(leaf.as_object().unwrap().lookup("k"), Value::string("leaf"));
    assert_eq!(rooted_count(), 0);
}

#[test]
fn test_named_literal_registers_on_global() {
    let harness = Harness::new();
    harness
        .run(vec![Expr::function(Some("answer"), &[], block(vec![Expr::ret(Expr::int(42))]))])
        .unwrap();
    let answer = harness.global().lookup("answer");
    let answer = answer.as_object().expect("registered");
    assert_eq!(answer.name(), "function answer");
    assert_eq!(answer.invoke(&Value::Undefined, &[]).unwrap(), Value::Int(42));
}

#[test]
fn test_anonymous_literal_in_local() {
    expect_int(
        vec![
            Expr::declare("id", Expr::function(None, &["x"], block(vec![Expr::ret(Expr::var("x"))]))),
            Expr::ret(Expr::call(Expr::var("id"), vec![Expr::int(9)])),
        ],
        9,
    );
}

#[test]
fn test_dropped_literal_releases_its_function() {
    let harness = Harness::new();
    let make = harness.compile(
        "make",
        &[],
        vec![Expr::ret(Expr::function(None, &["x"], block(vec![Expr::ret(binary("+", Expr::var("x"), Expr::int(1)))])))],
    );
    for i in 0..64 {
        let made = make.invoke(&Value::Undefined, &[]).unwrap();
        let function = made.as_object().unwrap().clone();
        assert_eq!(function.invoke(&Value::Undefined, &[Value::Int(i)]).unwrap(), Value::Int(i + 1));
        let weak = Rc::downgrade(&function);
        drop(made);
        drop(function);
        assert!(weak.upgrade().is_none());
    }
}

#[test]
fn test_nested_literal_recompiles_on_every_execution() {
    let harness = Harness::new();
    let make = harness.compile(
        "make",
        &[],
        vec![Expr::ret(Expr::function(None, &[], block(vec![Expr::ret(Expr::int(1))])))],
    );
    let first = make.invoke(&Value::Undefined, &[]).unwrap();
    let second = make.invoke(&Value::Undefined, &[]).unwrap();
    assert_ne!(first, second);

    let first = first.as_object().unwrap();
    assert_eq!(first.name(), "function lambda");
    assert_eq!(first.invoke(&Value::Undefined, &[]).unwrap(), Value::Int(1));
}

#[test]
fn test_inner_function_sees_globals_not_outer_locals() {
    expect_value(
        vec![
            Expr::declare("local", Expr::int(1)),
            Expr::function(Some("peek"), &[], block(vec![Expr::ret(Expr::var("local"))])),
            Expr::ret(Expr::call(Expr::var("peek"), vec![])),
        ],
        Value::Undefined,
    );
}

#[test]
fn test_global_bound_after_compilation() {
    let harness = Harness::new();
    let main = harness.compile("main", &[], vec![Expr::ret(Expr::call(Expr::var("later"), vec![]))]);

    let err = main.invoke(&Value::Undefined, &[]).unwrap_err();
    assert_eq!(err.to_string(), "undefined can not be invoked");

    harness.define("later", Arity::Fixed(0), |_, _| Ok(Value::Int(5)));
    assert_eq!(main.invoke(&Value::Undefined, &[]).unwrap(), Value::Int(5));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_arity_check() {
    let harness = Harness::new();
    let two = harness.compile("two", &["a", "b"], vec![Expr::ret(Expr::var("b"))]);

    assert_eq!(two.invoke(&Value::Undefined, &[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(2));
    let err = two.invoke(&Value::Undefined, &[Value::Int(1)]).unwrap_err();
    assert!(matches!(err, RuntimeError::ArityMismatch { expected: 2, actual: 1 }));
    let three = [Value::Int(1), Value::Int(2), Value::Int(3)];
    let err = two.invoke(&Value::Undefined, &three).unwrap_err();
    assert!(matches!(err, RuntimeError::ArityMismatch { expected: 2, actual: 3 }));
}

#[test]
fn test_arity_error_from_nested_call_propagates() {
    let err = expect_error(vec![
        Expr::function(Some("two"), &["a", "b"], block(vec![Expr::ret(Expr::var("a"))])),
        Expr::function(
            Some("outer"),
            &[],
            block(vec![Expr::ret(Expr::call(Expr::var("two"), vec![Expr::int(1)]))]),
        ),
        Expr::ret(Expr::call(Expr::var("outer"), vec![])),
    ]);
    assert!(matches!(err, RuntimeError::ArityMismatch { expected: 2, actual: 1 }));
}

#[test]
fn test_native_failure_propagates_through_frames() {
    let harness = Harness::new();
    harness.define("boom", Arity::Fixed(0), |_, _| anyhow::bail!("kaboom"));
    let err = harness
        .run(vec![
            Expr::function(Some("inner"), &[], block(vec![Expr::ret(Expr::call(Expr::var("boom"), vec![]))])),
            Expr::ret(Expr::call(Expr::var("inner"), vec![])),
        ])
        .unwrap_err();
    match err {
        RuntimeError::InvocationFailure { message, .. } => assert_eq!(message, "kaboom"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_statements_after_failure_do_not_run() {
    let harness = Harness::new();
    harness.define("boom", Arity::Fixed(0), |_, _| anyhow::bail!("stop"));
    let err = harness.run(vec![
        Expr::call(Expr::var("boom"), vec![]),
        Expr::function(Some("unreached"), &[], Block::default()),
    ]);
    assert!(err.is_err());
    assert!(harness.global().lookup("unreached").is_undefined());
}

#[test]
fn test_nested_compile_error_surfaces_at_materialization() {
    let err = expect_error(vec![
        Expr::function(Some("bad"), &[], block(vec![Expr::assign("missing", Expr::int(1)).at(7)])),
        Expr::ret(Expr::int(1)),
    ]);
    match err {
        RuntimeError::Compile(CompileError::UnknownVariable { name, line }) => {
            assert_eq!(name, "missing");
            assert_eq!(line, 7);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_calling_an_integer() {
    let err = expect_error(vec![
        Expr::declare("n", Expr::int(3)),
        Expr::ret(Expr::call(Expr::var("n"), vec![])),
    ]);
    assert_eq!(err.to_string(), "3 can not be invoked");
}

// ============================================================================
// Interchange
// ============================================================================

#[test]
fn test_json_program_round_trip() {
    let program = block(vec![
        Expr::function(Some("double"), &["x"], block(vec![Expr::ret(binary("+", Expr::var("x"), Expr::var("x")))])),
        Expr::declare("o", Expr::object(vec![("v", Expr::int(21)), ("s", Expr::string("21"))])),
        Expr::ret(Expr::call(Expr::var("double"), vec![Expr::field(Expr::var("o"), "v")])).at(3),
    ]);

    let json = serde_json::to_string(&program).unwrap();
    let decoded: Block = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, program);

    let harness = Harness::new();
    let main = harness.compile("main", &[], decoded.instrs);
    assert_eq!(main.invoke(&Value::Undefined, &[]).unwrap(), Value::Int(42));
}
