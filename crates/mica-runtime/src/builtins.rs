//! Built-in functions registered on the global environment.
//!
//! Operators are ordinary global functions named by their symbol, so
//! `a + b` reaches the runtime as a call of the global `+` with two
//! arguments. Arithmetic is checked 32-bit integer arithmetic.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use mica_engine::{Arity, Object, ObjectRef, Value};

/// Sink written by `print`
pub type Output = Rc<RefCell<Box<dyn Write>>>;

/// Register every built-in on `global`
pub fn install(global: &ObjectRef, output: &Output) {
    define(global, "+", Arity::Fixed(2), |_, args| add(&args[0], &args[1]));

    define(global, "-", Arity::Fixed(2), |_, args| {
        let (a, b) = ints("-", args)?;
        a.checked_sub(b).map(Value::Int).ok_or_else(|| overflow("-"))
    });
    define(global, "*", Arity::Fixed(2), |_, args| {
        let (a, b) = ints("*", args)?;
        a.checked_mul(b).map(Value::Int).ok_or_else(|| overflow("*"))
    });
    define(global, "/", Arity::Fixed(2), |_, args| {
        let (a, b) = ints("/", args)?;
        if b == 0 {
            bail!("division by zero");
        }
        a.checked_div(b).map(Value::Int).ok_or_else(|| overflow("/"))
    });
    define(global, "%", Arity::Fixed(2), |_, args| {
        let (a, b) = ints("%", args)?;
        if b == 0 {
            bail!("division by zero");
        }
        a.checked_rem(b).map(Value::Int).ok_or_else(|| overflow("%"))
    });

    define(global, "==", Arity::Fixed(2), |_, args| Ok(Value::Bool(args[0] == args[1])));
    define(global, "!=", Arity::Fixed(2), |_, args| Ok(Value::Bool(args[0] != args[1])));

    define(global, "<", Arity::Fixed(2), |_, args| compare("<", args, |a, b| a < b));
    define(global, "<=", Arity::Fixed(2), |_, args| compare("<=", args, |a, b| a <= b));
    define(global, ">", Arity::Fixed(2), |_, args| compare(">", args, |a, b| a > b));
    define(global, ">=", Arity::Fixed(2), |_, args| compare(">=", args, |a, b| a >= b));

    let output = output.clone();
    define(global, "print", Arity::Variadic, move |_, args| {
        let line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
        let mut sink = output.borrow_mut();
        writeln!(sink, "{line}")?;
        sink.flush()?;
        Ok(Value::Undefined)
    });
}

fn define<F>(global: &ObjectRef, name: &str, arity: Arity, fun: F)
where
    F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
{
    global.register(name, Value::Object(Object::new_native(name, arity, fun)));
}

fn add(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.checked_add(*y).map(Value::Int).ok_or_else(|| overflow("+")),
        (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::string(format!("{a}{b}"))),
        _ => bail!("can not add {} and {}", a.describe(), b.describe()),
    }
}

fn ints(op: &str, args: &[Value]) -> Result<(i32, i32)> {
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
        (a, b) => bail!("{op} expects integers, got {} and {}", a.describe(), b.describe()),
    }
}

fn compare(op: &str, args: &[Value], test: fn(i32, i32) -> bool) -> Result<Value> {
    let (a, b) = ints(op, args)?;
    Ok(Value::Bool(test(a, b)))
}

fn overflow(op: &str) -> anyhow::Error {
    anyhow!("integer overflow in {op}")
}
