//! Runtime errors
//!
//! Every kind propagates unchanged through nested calls; nothing in the
//! engine catches and retries.

use crate::compiler::CompileError;

/// Error raised while running generated code or built-ins
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Call with the wrong number of arguments
    #[error("arguments doesn't match parameters count: expected {expected} but got {actual}")]
    ArityMismatch {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Invocation of a value without a callable entry
    #[error("{name} can not be invoked")]
    NotCallable {
        /// Description of the value
        name: String,
    },

    /// Property access on a value that is not an object
    #[error("can not {action} on {value}")]
    NotAnObject {
        /// What was attempted (`read field x`, `call method m`, ...)
        action: String,
        /// Rendering of the offending value
        value: String,
    },

    /// Any other fault raised by a callee
    #[error("invocation failed: {message}")]
    InvocationFailure {
        /// Message of the wrapped fault
        message: String,
        /// The wrapped fault
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Nested function failed to compile when first materialized
    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl RuntimeError {
    /// Convert an error raised by a native function.
    ///
    /// Errors that already are a `RuntimeError` pass through unchanged,
    /// everything else becomes `InvocationFailure`.
    pub fn from_native(error: anyhow::Error) -> Self {
        match error.downcast::<RuntimeError>() {
            Ok(known) => known,
            Err(other) => RuntimeError::InvocationFailure {
                message: other.to_string(),
                source: other.into(),
            },
        }
    }

    /// Build an `InvocationFailure` from a plain message
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        RuntimeError::InvocationFailure {
            source: message.clone().into(),
            message,
        }
    }
}
