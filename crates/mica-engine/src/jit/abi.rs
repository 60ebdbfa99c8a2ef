//! NaN-boxing ABI helpers for Cranelift IR generation
//!
//! Provides inline boxing operations as Cranelift IR instructions. These
//! mirror the encoding in `crate::vm::value::Value`.

use cranelift_codegen::ir::{self, condcodes::IntCC, InstBuilder};
use cranelift_frontend::FunctionBuilder;

// Layout: 0xFFF8_0000_0000_0000 | (tag << 48) | payload
/// Quiet-NaN prefix shared by every boxed value
pub const NAN_BOX_BASE: u64 = 0xFFF8_0000_0000_0000;
/// Bit position of the type tag
pub const TAG_SHIFT: u64 = 48;
/// Mask selecting the type tag
pub const TAG_MASK: u64 = 0x7 << TAG_SHIFT;
/// Object pointer
pub const TAG_PTR: u64 = 0x0 << TAG_SHIFT;
/// 32-bit integer
pub const TAG_I32: u64 = 0x1 << TAG_SHIFT;
/// Boolean
pub const TAG_BOOL: u64 = 0x2 << TAG_SHIFT;
/// String pointer
pub const TAG_STR: u64 = 0x3 << TAG_SHIFT;
/// Undefined
pub const TAG_UNDEFINED: u64 = 0x5 << TAG_SHIFT;
/// Null
pub const TAG_NULL: u64 = 0x6 << TAG_SHIFT;
/// Failure sentinel
pub const TAG_FAILURE: u64 = 0x7 << TAG_SHIFT;
/// 48-bit pointer payload
pub const PAYLOAD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;
/// 32-bit integer payload
pub const PAYLOAD_MASK_32: u64 = 0x0000_0000_FFFF_FFFF;

// Pre-computed tagged bases
/// Base word of a boxed integer
pub const I32_TAG_BASE: u64 = NAN_BOX_BASE | TAG_I32;
/// Boxed null
pub const NULL_VALUE: u64 = NAN_BOX_BASE | TAG_NULL;
/// Boxed undefined
pub const UNDEFINED_VALUE: u64 = NAN_BOX_BASE | TAG_UNDEFINED;
/// Boxed `true`
pub const TRUE_VALUE: u64 = NAN_BOX_BASE | TAG_BOOL | 1;
/// Boxed `false`
pub const FALSE_VALUE: u64 = NAN_BOX_BASE | TAG_BOOL;

/// Returned by fallible helpers (and by generated code) after an error was
/// parked in the pending-error slot. Never a valid value.
pub const FAILURE_VALUE: u64 = NAN_BOX_BASE | TAG_FAILURE;

/// Box a constant i32 into a NaN-boxed word.
pub fn emit_box_i32(builder: &mut FunctionBuilder<'_>, val: i32) -> ir::Value {
    let bits = I32_TAG_BASE | ((val as i64 as u64) & PAYLOAD_MASK);
    builder.ins().iconst(ir::types::I64, bits as i64)
}

/// Emit the undefined constant.
pub fn emit_undefined(builder: &mut FunctionBuilder<'_>) -> ir::Value {
    builder.ins().iconst(ir::types::I64, UNDEFINED_VALUE as i64)
}

/// Emit a null pointer.
pub fn emit_null_ptr(builder: &mut FunctionBuilder<'_>) -> ir::Value {
    builder.ins().iconst(ir::types::I64, 0)
}

/// Apply the truth rule to a boxed value, producing an `i8` flag.
///
/// Equivalent of `bits != NULL && bits != UNDEFINED && bits != FALSE`.
pub fn emit_truth(builder: &mut FunctionBuilder<'_>, val: ir::Value) -> ir::Value {
    let is_null = builder.ins().icmp_imm(IntCC::Equal, val, NULL_VALUE as i64);
    let is_undefined = builder.ins().icmp_imm(IntCC::Equal, val, UNDEFINED_VALUE as i64);
    let is_false = builder.ins().icmp_imm(IntCC::Equal, val, FALSE_VALUE as i64);
    let falsy = builder.ins().bor(is_null, is_undefined);
    let falsy = builder.ins().bor(falsy, is_false);
    builder.ins().bxor_imm(falsy, 1)
}

/// Compare a helper result against the failure sentinel, producing an `i8` flag.
pub fn emit_is_failure(builder: &mut FunctionBuilder<'_>, val: ir::Value) -> ir::Value {
    builder.ins().icmp_imm(IntCC::Equal, val, FAILURE_VALUE as i64)
}
