//! Default constants for engine configuration.
//!
//! Centralizes the numbers shared by `JitConfig::default()`, the linker and
//! the tests.

/// Number of guards a call site chains before it goes megamorphic.
pub const DEFAULT_INLINE_CACHE_DEPTH: usize = 3;

/// Name given to anonymous function literals.
pub const ANONYMOUS_FUNCTION_NAME: &str = "lambda";

/// Name of the implicit receiver, always bound to slot 0.
pub const RECEIVER_NAME: &str = "this";

/// Name under which every function object registers itself.
pub const APPLY_PROPERTY: &str = "apply";
