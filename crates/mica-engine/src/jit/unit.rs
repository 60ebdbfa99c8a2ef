//! Compiled code units
//!
//! A unit is the finalized native code of one function together with
//! everything its code points at: the per-unit context, the dynamic sites
//! and the string constant pool. Addresses of all of these are baked into
//! the code, so they live exactly as long as the unit.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use cranelift_jit::JITModule;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::compiler::FunctionRegistry;
use crate::jit::abi::FAILURE_VALUE;
use crate::jit::roots::{take_error, NativeFrame};
use crate::jit::trampoline::InvokeFn;
use crate::jit::JitEngine;
use crate::linker::{
    CallSite, DispatchRegime, FieldSite, FunctionSite, LookupSite, MethodSite, RegisterSite,
};
use crate::vm::{ObjectRef, RuntimeError, Value};

/// State shared by all sites of one unit
pub struct UnitContext {
    global: ObjectRef,
    registry: RefCell<FunctionRegistry>,
    engine: Rc<JitEngine>,
}

impl UnitContext {
    /// Create a context closing over `global`
    pub fn new(global: ObjectRef, engine: Rc<JitEngine>) -> Self {
        UnitContext { global, registry: RefCell::new(FunctionRegistry::new()), engine }
    }

    /// Global object of the unit
    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    /// Deferred nested functions of the unit
    pub fn registry(&self) -> &RefCell<FunctionRegistry> {
        &self.registry
    }

    /// Engine used to compile nested functions
    pub fn engine(&self) -> &Rc<JitEngine> {
        &self.engine
    }
}

/// Dynamic sites and constants referenced by generated code.
///
/// Sites are boxed so their addresses survive growth of the tables.
#[derive(Default)]
pub struct SiteTable {
    lookups: Vec<Box<LookupSite>>,
    registers: Vec<Box<RegisterSite>>,
    fields: Vec<Box<FieldSite>>,
    functions: Vec<Box<FunctionSite>>,
    calls: Vec<Box<CallSite>>,
    methods: Vec<Box<MethodSite>>,
    constants: FxHashMap<String, Rc<String>>,
}

fn push_site<T>(table: &mut Vec<Box<T>>, site: T) -> i64 {
    let site = Box::new(site);
    let address = &*site as *const T as i64;
    table.push(site);
    address
}

impl SiteTable {
    /// Add a free-variable lookup site
    pub fn add_lookup(&mut self, site: LookupSite) -> i64 {
        push_site(&mut self.lookups, site)
    }

    /// Add a global registration site
    pub fn add_register(&mut self, site: RegisterSite) -> i64 {
        push_site(&mut self.registers, site)
    }

    /// Add a property get/set site
    pub fn add_field(&mut self, site: FieldSite) -> i64 {
        push_site(&mut self.fields, site)
    }

    /// Add a function materialization site
    pub fn add_function(&mut self, site: FunctionSite) -> i64 {
        push_site(&mut self.functions, site)
    }

    /// Add an inline-cached call site
    pub fn add_call(&mut self, site: CallSite) -> i64 {
        push_site(&mut self.calls, site)
    }

    /// Add a method call site
    pub fn add_method(&mut self, site: MethodSite) -> i64 {
        push_site(&mut self.methods, site)
    }

    /// Intern a string constant and return its boxed encoding
    pub fn intern(&mut self, text: &str) -> u64 {
        let constant = self
            .constants
            .entry(text.to_string())
            .or_insert_with(|| Rc::new(text.to_string()));
        Value::String(constant.clone()).to_raw()
    }

    /// Total number of dynamic sites
    pub fn len(&self) -> usize {
        self.lookups.len()
            + self.registers.len()
            + self.fields.len()
            + self.functions.len()
            + self.calls.len()
            + self.methods.len()
    }

    /// Whether the unit has no dynamic sites
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of interned string constants
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }
}

/// Finalized native code of one function
pub struct CompiledUnit {
    name: String,
    arity: usize,
    invoker: InvokeFn,
    context: Rc<UnitContext>,
    sites: SiteTable,
    /// Owns the executable memory behind `invoker`
    module: Option<JITModule>,
}

impl CompiledUnit {
    pub(crate) fn new(
        name: &str,
        arity: usize,
        invoker: InvokeFn,
        context: Rc<UnitContext>,
        sites: SiteTable,
        module: JITModule,
    ) -> Self {
        CompiledUnit { name: name.to_string(), arity, invoker, context, sites, module: Some(module) }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Per-unit context
    pub fn context(&self) -> &Rc<UnitContext> {
        &self.context
    }

    /// Dynamic sites of the unit
    pub fn sites(&self) -> &SiteTable {
        &self.sites
    }

    /// Caching regime of every call site, in emission order
    pub fn call_site_regimes(&self) -> Vec<DispatchRegime> {
        self.sites.calls.iter().map(|site| site.regime()).collect()
    }

    /// Run the code with `receiver` and exactly `arity` arguments
    pub fn invoke(&self, receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        if args.len() != self.arity {
            return Err(RuntimeError::ArityMismatch { expected: self.arity, actual: args.len() });
        }
        let _frame = NativeFrame::enter();
        let words: Vec<u64> = std::iter::once(receiver)
            .chain(args)
            .map(Value::to_raw)
            .collect();
        let bits = unsafe { (self.invoker)(words.as_ptr()) };
        if bits == FAILURE_VALUE {
            return Err(take_error());
        }
        Ok(unsafe { Value::from_raw(bits) })
    }
}

impl Drop for CompiledUnit {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            trace!(target: "mica::jit", name = %self.name, "releasing compiled code");
            // SAFETY: every caller of `invoke` holds a strong reference to the
            // unit, so none of its code is on the stack once the last one is gone.
            unsafe { module.free_memory() };
        }
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("sites", &self.sites.len())
            .finish()
    }
}
