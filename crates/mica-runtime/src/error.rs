//! Runtime error types.

use mica_engine::{CompileError, RuntimeError};

/// Errors that can occur while loading, compiling or running a program.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Code generation error
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Error raised while the program ran
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Malformed JSON program
    #[error("Syntax error: {0}")]
    Syntax(#[from] serde_json::Error),
}
