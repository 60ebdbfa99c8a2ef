//! Dispatch linker
//!
//! Every dynamic operation emitted by the compiler is bound to a site
//! object. Sites link themselves the first time they run:
//! - `LookupSite` / `RegisterSite`: fixed (global object, name) pair
//! - `FieldSite`: direct `lookup` / `register` with a fixed name
//! - `FunctionSite`: materializes a nested function literal
//! - `MethodSite`: resolves the method by name on every execution
//! - `CallSite`: inline cache over callee identity

pub mod inline_cache;
pub mod site;

pub use inline_cache::{CallSite, DispatchRegime};
pub use site::{FieldSite, FunctionSite, LookupSite, MethodSite, RegisterSite};

use crate::vm::{Callable, ObjectRef, RuntimeError, Value};

/// Truth rule: false exactly for `null`, `undefined` and `false`.
pub fn truth(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Undefined | Value::Bool(false))
}

/// Resolve the callable entry of `callee` for a call with `arg_count`
/// arguments.
pub fn resolve_callee(callee: &Value, arg_count: usize) -> Result<(ObjectRef, Callable), RuntimeError> {
    let function = match callee {
        Value::Object(function) => function,
        other => return Err(RuntimeError::NotCallable { name: other.describe() }),
    };
    let callable = function
        .callable()
        .cloned()
        .ok_or_else(|| RuntimeError::NotCallable { name: function.name().to_string() })?;
    callable.arity().check(arg_count)?;
    Ok((function.clone(), callable))
}
