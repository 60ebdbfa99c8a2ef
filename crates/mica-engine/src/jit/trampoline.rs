//! Calling convention between Rust and generated code
//!
//! Every unit exposes two functions:
//! - the entry, `(receiver, p1, ..., pn) -> value`, all NaN-boxed `i64`
//! - the invoker, which unpacks a receiver+argument array and calls the entry
//!
//! Rust only ever calls the invoker, so it needs no per-arity signature.

use cranelift_codegen::ir::{types, AbiParam, Signature};
use cranelift_codegen::isa::CallConv;

/// Invoker signature: pointer to `1 + arity` NaN-boxed words, returns a
/// NaN-boxed word or `FAILURE_VALUE`.
pub type InvokeFn = unsafe extern "C" fn(args: *const u64) -> u64;

/// Signature of a unit's entry function
pub fn entry_signature(call_conv: CallConv, arity: usize) -> Signature {
    let mut sig = Signature::new(call_conv);
    for _ in 0..=arity {
        sig.params.push(AbiParam::new(types::I64));
    }
    sig.returns.push(AbiParam::new(types::I64));
    sig
}

/// Signature of a unit's invoker
pub fn invoker_signature(call_conv: CallConv) -> Signature {
    let mut sig = Signature::new(call_conv);
    sig.params.push(AbiParam::new(types::I64));
    sig.returns.push(AbiParam::new(types::I64));
    sig
}

/// Signature of a runtime helper taking `param_count` words
pub fn helper_signature(call_conv: CallConv, param_count: usize) -> Signature {
    let mut sig = Signature::new(call_conv);
    for _ in 0..param_count {
        sig.params.push(AbiParam::new(types::I64));
    }
    sig.returns.push(AbiParam::new(types::I64));
    sig
}
