//! Programs handed over as JSON.

use mica_engine::ast::Expr;
use mica_engine::Value;
use mica_runtime::Error;

use super::harness::*;

#[test]
fn test_execute_json_program() {
    let (runtime, _) = runtime();
    let json = r#"{
        "instrs": [
            {
                "kind": "Return",
                "expr": {
                    "kind": "FunctionCall",
                    "qualifier": { "kind": "LocalVarAccess", "name": "+" },
                    "args": [
                        { "kind": "Literal", "value": 40 },
                        { "kind": "Literal", "value": 2 }
                    ]
                }
            }
        ]
    }"#;
    assert_eq!(runtime.execute_json(json).unwrap(), Value::Int(42));
}

#[test]
fn test_json_function_and_object() {
    let (runtime, captured) = runtime();
    let json = r#"{
        "instrs": [
            {
                "kind": "FunctionLiteral",
                "name": "greet",
                "parameters": ["who"],
                "body": {
                    "instrs": [
                        {
                            "kind": "Return",
                            "expr": {
                                "kind": "FunctionCall",
                                "qualifier": { "kind": "LocalVarAccess", "name": "+" },
                                "args": [
                                    { "kind": "Literal", "value": "hello " },
                                    { "kind": "FieldAccess", "receiver": { "kind": "LocalVarAccess", "name": "who" }, "name": "name" }
                                ]
                            }
                        }
                    ]
                },
                "line": 1
            },
            {
                "kind": "FunctionCall",
                "qualifier": { "kind": "LocalVarAccess", "name": "print" },
                "args": [
                    {
                        "kind": "FunctionCall",
                        "qualifier": { "kind": "LocalVarAccess", "name": "greet" },
                        "args": [
                            { "kind": "ObjectLiteral", "entries": [["name", { "kind": "Literal", "value": "mica" }]] }
                        ]
                    }
                ],
                "line": 5
            }
        ]
    }"#;
    assert_eq!(runtime.execute_json(json).unwrap(), Value::Undefined);
    assert_eq!(captured.text(), "hello mica\n");
}

#[test]
fn test_serialized_program_runs_the_same() {
    let program = block(vec![
        Expr::declare("x", Expr::int(6)),
        Expr::if_else(
            op(">", Expr::var("x"), Expr::int(5)),
            block(vec![Expr::assign("x", op("*", Expr::var("x"), Expr::int(7)))]),
            block(vec![]),
        ),
        Expr::ret(Expr::var("x")),
    ]);
    let json = serde_json::to_string(&program).unwrap();

    let (runtime, _) = runtime();
    assert_eq!(runtime.execute(&program).unwrap(), Value::Int(42));
    assert_eq!(runtime.execute_json(&json).unwrap(), Value::Int(42));
}

#[test]
fn test_malformed_json_is_a_syntax_error() {
    let (runtime, _) = runtime();
    let err = runtime.execute_json(r#"{ "instrs": [ { "kind": "Nope" } ] }"#).unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
    let err = runtime.execute_json("not json").unwrap_err();
    assert!(err.to_string().starts_with("Syntax error:"));
}
