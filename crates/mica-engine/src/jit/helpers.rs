//! Runtime helpers called from generated code
//!
//! Helpers take and return NaN-boxed words. Pointer parameters are the
//! addresses of a unit's `UnitContext` and sites, embedded in the code as
//! immediates. Fallible helpers return `FAILURE_VALUE` after parking the
//! error (see `roots`).

use crate::jit::abi::UNDEFINED_VALUE;
use crate::jit::roots::{finish, root};
use crate::jit::UnitContext;
use crate::linker::{CallSite, FieldSite, FunctionSite, LookupSite, MethodSite, RegisterSite};
use crate::vm::{Object, Value};

/// Runtime services reachable from generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeHelper {
    /// `(ctx, site) -> value`
    LookupGlobal,
    /// `(ctx, site, value) -> undefined`
    RegisterGlobal,
    /// `(ctx, site) -> function`
    MakeFunction,
    /// `() -> object`
    NewObject,
    /// `(site, receiver) -> value`
    GetField,
    /// `(site, receiver, value) -> undefined`
    SetField,
    /// `(site, callee, receiver, args) -> value`
    Call,
    /// `(site, receiver, args) -> value`
    MethodCall,
}

impl RuntimeHelper {
    /// Every helper, in declaration order
    pub const ALL: [RuntimeHelper; 8] = [
        RuntimeHelper::LookupGlobal,
        RuntimeHelper::RegisterGlobal,
        RuntimeHelper::MakeFunction,
        RuntimeHelper::NewObject,
        RuntimeHelper::GetField,
        RuntimeHelper::SetField,
        RuntimeHelper::Call,
        RuntimeHelper::MethodCall,
    ];

    /// Symbol name registered with the JIT module
    pub fn symbol(self) -> &'static str {
        match self {
            RuntimeHelper::LookupGlobal => "mica_lookup_global",
            RuntimeHelper::RegisterGlobal => "mica_register_global",
            RuntimeHelper::MakeFunction => "mica_make_function",
            RuntimeHelper::NewObject => "mica_new_object",
            RuntimeHelper::GetField => "mica_get_field",
            RuntimeHelper::SetField => "mica_set_field",
            RuntimeHelper::Call => "mica_call",
            RuntimeHelper::MethodCall => "mica_method_call",
        }
    }

    /// Address of the implementation
    pub fn address(self) -> *const u8 {
        match self {
            RuntimeHelper::LookupGlobal => mica_lookup_global as *const u8,
            RuntimeHelper::RegisterGlobal => mica_register_global as *const u8,
            RuntimeHelper::MakeFunction => mica_make_function as *const u8,
            RuntimeHelper::NewObject => mica_new_object as *const u8,
            RuntimeHelper::GetField => mica_get_field as *const u8,
            RuntimeHelper::SetField => mica_set_field as *const u8,
            RuntimeHelper::Call => mica_call as *const u8,
            RuntimeHelper::MethodCall => mica_method_call as *const u8,
        }
    }

    /// Number of word-sized parameters
    pub fn param_count(self) -> usize {
        match self {
            RuntimeHelper::NewObject => 0,
            RuntimeHelper::LookupGlobal
            | RuntimeHelper::MakeFunction
            | RuntimeHelper::GetField => 2,
            RuntimeHelper::RegisterGlobal
            | RuntimeHelper::SetField
            | RuntimeHelper::MethodCall => 3,
            RuntimeHelper::Call => 4,
        }
    }

    /// Whether the result must be checked against `FAILURE_VALUE`
    pub fn is_fallible(self) -> bool {
        !matches!(
            self,
            RuntimeHelper::LookupGlobal | RuntimeHelper::RegisterGlobal | RuntimeHelper::NewObject
        )
    }
}

/// Decode `count` argument words.
///
/// # Safety
///
/// `args` must point to `count` valid words, or `count` must be 0.
unsafe fn read_args(args: *const u64, count: usize) -> Vec<Value> {
    if count == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(args, count).iter().map(|&bits| Value::from_raw(bits)).collect()
}

extern "C" fn mica_lookup_global(ctx: *const UnitContext, site: *const LookupSite) -> u64 {
    let (ctx, site) = unsafe { (&*ctx, &*site) };
    root(site.lookup(ctx))
}

extern "C" fn mica_register_global(ctx: *const UnitContext, site: *const RegisterSite, value: u64) -> u64 {
    let (ctx, site) = unsafe { (&*ctx, &*site) };
    site.register(ctx, unsafe { Value::from_raw(value) });
    UNDEFINED_VALUE
}

extern "C" fn mica_make_function(ctx: *const UnitContext, site: *const FunctionSite) -> u64 {
    let (ctx, site) = unsafe { (&*ctx, &*site) };
    finish(site.materialize(ctx).map(Value::Object))
}

extern "C" fn mica_new_object() -> u64 {
    root(Value::Object(Object::new_object(None)))
}

extern "C" fn mica_get_field(site: *const FieldSite, receiver: u64) -> u64 {
    let site = unsafe { &*site };
    let receiver = unsafe { Value::from_raw(receiver) };
    finish(site.get(&receiver))
}

extern "C" fn mica_set_field(site: *const FieldSite, receiver: u64, value: u64) -> u64 {
    let site = unsafe { &*site };
    let (receiver, value) = unsafe { (Value::from_raw(receiver), Value::from_raw(value)) };
    finish(site.set(&receiver, value).map(|()| Value::Undefined))
}

extern "C" fn mica_call(site: *const CallSite, callee: u64, receiver: u64, args: *const u64) -> u64 {
    let site = unsafe { &*site };
    let (callee, receiver) = unsafe { (Value::from_raw(callee), Value::from_raw(receiver)) };
    let args = unsafe { read_args(args, site.arg_count()) };
    finish(site.invoke(&callee, &receiver, &args))
}

extern "C" fn mica_method_call(site: *const MethodSite, receiver: u64, args: *const u64) -> u64 {
    let site = unsafe { &*site };
    let receiver = unsafe { Value::from_raw(receiver) };
    let args = unsafe { read_args(args, site.arg_count()) };
    finish(site.invoke(&receiver, &args))
}
