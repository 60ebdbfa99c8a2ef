//! Compiler: AST to Cranelift IR
//!
//! - `scope`: slot assignment for one function body
//! - `registry`: nested function literals awaiting materialization
//! - `lower`: IR generation, one code unit per function

pub mod lower;
pub mod registry;
pub mod scope;

pub use registry::{DeferredFunction, FunctionId, FunctionRegistry};
pub use scope::VariableTable;

/// Error raised while compiling a function body
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Assignment to a name that was never declared
    #[error("unknown variable {name} at line {line}")]
    UnknownVariable {
        /// Assigned name
        name: String,
        /// Source line of the assignment
        line: u32,
    },

    /// A deferred function was materialized twice
    #[error("function {id} was already consumed")]
    FunctionConsumed {
        /// Registry id
        id: FunctionId,
    },

    /// Cranelift or module failure
    #[error("codegen error: {0}")]
    Codegen(String),

    /// Host ISA cannot run generated code
    #[error("unsupported target: {0}")]
    UnsupportedTarget(String),
}
