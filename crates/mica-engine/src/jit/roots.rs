//! Value roots and the pending-error slot
//!
//! Generated code only holds raw NaN-boxed words. Heap values handed to it
//! by helpers are parked in a thread-local arena until the native invocation
//! that rooted them returns, so those words stay valid across nested calls.
//! Each invocation releases only what it rooted itself; the value it returns
//! is owned by its caller.
//!
//! Errors cannot unwind through generated frames. A failing helper parks
//! the error here and returns `FAILURE_VALUE`; the Rust side of the nearest
//! invocation takes it back out.

use std::cell::RefCell;

use crate::jit::abi::FAILURE_VALUE;
use crate::vm::{RuntimeError, Value};

thread_local! {
    static ARENA: RefCell<Vec<Value>> = const { RefCell::new(Vec::new()) };
    static PENDING_ERROR: RefCell<Option<RuntimeError>> = const { RefCell::new(None) };
}

/// Encode a value for generated code, keeping heap payloads alive.
pub fn root(value: Value) -> u64 {
    let bits = value.to_raw();
    if value.is_heap() {
        ARENA.with(|arena| arena.borrow_mut().push(value));
    }
    bits
}

/// Number of values currently rooted
pub fn rooted_count() -> usize {
    ARENA.with(|arena| arena.borrow().len())
}

/// Marks one native invocation on this thread. Values rooted while the
/// frame is live are released when it is dropped.
pub struct NativeFrame {
    mark: usize,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl NativeFrame {
    /// Enter a native invocation
    pub fn enter() -> Self {
        NativeFrame { mark: rooted_count(), _not_send: std::marker::PhantomData }
    }
}

impl Drop for NativeFrame {
    fn drop(&mut self) {
        let released = ARENA.with(|arena| {
            let mut arena = arena.borrow_mut();
            let mark = self.mark.min(arena.len());
            arena.split_off(mark)
        });
        // Dropped outside the borrow
        drop(released);
    }
}

/// Park `error` and return the failure sentinel.
pub fn park_error(error: RuntimeError) -> u64 {
    PENDING_ERROR.with(|slot| *slot.borrow_mut() = Some(error));
    FAILURE_VALUE
}

/// Take the parked error
pub fn take_error() -> RuntimeError {
    PENDING_ERROR
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| RuntimeError::failure("native code failed without an error"))
}

/// Convert a helper outcome into a raw word
pub fn finish(result: Result<Value, RuntimeError>) -> u64 {
    match result {
        Ok(value) => root(value),
        Err(error) => park_error(error),
    }
}
