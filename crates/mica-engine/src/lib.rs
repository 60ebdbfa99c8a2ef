//! Mica Language Engine
//!
//! This crate compiles Mica function bodies to native code and runs them
//! through a lazily-linked dispatch runtime:
//! - **AST**: the parsed program handed over by an external parser (`ast` module)
//! - **Compiler**: scope resolution, deferred function registry and lowering
//!   to Cranelift IR (`compiler` module)
//! - **JIT**: Cranelift backend, runtime helpers and compiled units (`jit` module)
//! - **VM**: values, the object model and runtime errors (`vm` module)
//! - **Linker**: call-site linking and inline caching (`linker` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use mica_engine::{ast::Expr, JitEngine, Object, Value};
//!
//! let engine = JitEngine::new()?;
//! let global = Object::new_env(None);
//! let body = Expr::block(vec![Expr::ret(Expr::var("x"))]);
//! let f = engine.compile_function(Some("f"), &["x".to_string()], &body, &global)?;
//! assert_eq!(f.invoke(Value::Undefined, &[Value::Int(42)])?, Value::Int(42));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]

// ============================================================================
// Core Modules
// ============================================================================

/// Abstract syntax tree consumed by the compiler
pub mod ast;

/// Compiler module: scope resolution, deferred functions and lowering
pub mod compiler;

/// Default configuration constants
pub mod defaults;

/// JIT module: Cranelift backend, runtime helpers and compiled units
pub mod jit;

/// Dispatch linker: lazily-linked sites and the call-site inline cache
pub mod linker;

/// VM module: values, object model and runtime errors
pub mod vm;

// ============================================================================
// Re-exports
// ============================================================================

pub use compiler::{CompileError, FunctionId, FunctionRegistry, VariableTable};
pub use jit::{CompiledUnit, JitConfig, JitEngine, OptLevel};
pub use linker::{truth, CallSite, DispatchRegime};
pub use vm::{Arity, Callable, NativeFunction, Object, ObjectRef, RuntimeError, ShapeToken, Value};
