//! Mica VM core runtime
//!
//! This module provides the runtime data model:
//! - Dynamic values and their NaN-boxed encoding
//! - Object model (prototype chain, ordered properties, invalidation tokens)
//! - Callable entries for generated and native functions
//! - Runtime errors

pub mod error;
pub mod object;
pub mod value;

pub use error::RuntimeError;
pub use object::{Arity, Callable, NativeFn, NativeFunction, Object, ObjectRef, ShapeToken};
pub use value::Value;
