//! Native code generation with Cranelift
//!
//! This module provides:
//! - NaN-boxing ABI shared by generated code and the runtime
//! - The JIT engine that turns a function body into a callable object
//! - Compiled units owning their code, sites and constants
//! - Runtime helpers called back from generated code
//! - Value roots and the error side channel for native frames

pub mod abi;
pub mod helpers;
pub mod roots;
pub mod trampoline;
pub mod unit;

mod engine;
pub use engine::{JitConfig, JitEngine, OptLevel};
pub use unit::{CompiledUnit, SiteTable, UnitContext};
