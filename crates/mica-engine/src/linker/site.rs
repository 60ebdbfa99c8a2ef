//! Lazily-linked dynamic sites
//!
//! Each site is owned by the code unit that emitted it and lives at a
//! stable address for as long as that unit does.

use once_cell::unsync::OnceCell;
use tracing::trace;

use crate::compiler::{DeferredFunction, FunctionId};
use crate::jit::UnitContext;
use crate::vm::{ObjectRef, RuntimeError, Value};

/// Free-variable read against the global object
#[derive(Debug)]
pub struct LookupSite {
    name: String,
    global: OnceCell<ObjectRef>,
}

impl LookupSite {
    /// Create an unlinked site for `name`
    pub fn new(name: &str) -> Self {
        LookupSite { name: name.to_string(), global: OnceCell::new() }
    }

    /// Read the variable; the global binding is fixed on first use
    pub fn lookup(&self, ctx: &UnitContext) -> Value {
        let global = self.global.get_or_init(|| {
            trace!(target: "mica::linker", name = %self.name, "linked global lookup");
            ctx.global().clone()
        });
        global.lookup(&self.name)
    }
}

/// Global registration of a named function literal
#[derive(Debug)]
pub struct RegisterSite {
    name: String,
    global: OnceCell<ObjectRef>,
}

impl RegisterSite {
    /// Create an unlinked site for `name`
    pub fn new(name: &str) -> Self {
        RegisterSite { name: name.to_string(), global: OnceCell::new() }
    }

    /// Register `value` on the global object
    pub fn register(&self, ctx: &UnitContext, value: Value) {
        let global = self.global.get_or_init(|| {
            trace!(target: "mica::linker", name = %self.name, "linked global registration");
            ctx.global().clone()
        });
        global.register(&self.name, value);
    }
}

/// Property read or write with a fixed name
#[derive(Debug)]
pub struct FieldSite {
    name: String,
}

impl FieldSite {
    /// Create a site for `name`
    pub fn new(name: &str) -> Self {
        FieldSite { name: name.to_string() }
    }

    /// `receiver.name`
    pub fn get(&self, receiver: &Value) -> Result<Value, RuntimeError> {
        match receiver {
            Value::Object(object) => Ok(object.lookup(&self.name)),
            other => Err(RuntimeError::NotAnObject {
                action: format!("read field {}", self.name),
                value: other.describe(),
            }),
        }
    }

    /// `receiver.name = value`
    pub fn set(&self, receiver: &Value, value: Value) -> Result<(), RuntimeError> {
        match receiver {
            Value::Object(object) => {
                object.register(&self.name, value);
                Ok(())
            }
            other => Err(RuntimeError::NotAnObject {
                action: format!("write field {}", self.name),
                value: other.describe(),
            }),
        }
    }
}

/// Materialization of a nested function literal.
///
/// The record is taken out of the registry on first execution and kept
/// here. Every execution compiles a fresh function object from it.
#[derive(Debug)]
pub struct FunctionSite {
    id: FunctionId,
    record: OnceCell<DeferredFunction>,
}

impl FunctionSite {
    /// Create a site for registry entry `id`
    pub fn new(id: FunctionId) -> Self {
        FunctionSite { id, record: OnceCell::new() }
    }

    /// Compile the literal into a function object
    pub fn materialize(&self, ctx: &UnitContext) -> Result<ObjectRef, RuntimeError> {
        let record = self.record.get_or_try_init(|| {
            trace!(target: "mica::linker", id = %self.id, "consuming deferred function");
            ctx.registry().borrow_mut().consume(self.id)
        })?;
        let function = ctx.engine().compile_function(
            record.name.as_deref(),
            &record.parameters,
            &record.body,
            &record.global,
        )?;
        Ok(function)
    }
}

/// Method call resolved by name on every execution
#[derive(Debug)]
pub struct MethodSite {
    name: String,
    arg_count: usize,
}

impl MethodSite {
    /// Create a site for method `name` called with `arg_count` arguments
    pub fn new(name: &str, arg_count: usize) -> Self {
        MethodSite { name: name.to_string(), arg_count }
    }

    /// Number of arguments passed at this site
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// `receiver.name(args...)` with `receiver` as `this`
    pub fn invoke(&self, receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let object = receiver.as_object().ok_or_else(|| RuntimeError::NotAnObject {
            action: format!("call method {}", self.name),
            value: receiver.describe(),
        })?;
        match object.lookup(&self.name) {
            Value::Object(method) => method.invoke(receiver, args),
            other => Err(RuntimeError::NotCallable { name: other.describe() }),
        }
    }
}
