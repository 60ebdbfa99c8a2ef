//! Deferred function registry
//!
//! Nested function literals are not compiled with their enclosing unit.
//! The generator parks them here; the materialization site consumes the
//! record the first time it runs.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::ast::Block;
use crate::compiler::CompileError;
use crate::vm::ObjectRef;

/// Registry key, unique within one compilation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Nested function literal awaiting materialization
#[derive(Debug, Clone)]
pub struct DeferredFunction {
    /// Literal name, if any
    pub name: Option<String>,
    /// Parameter names
    pub parameters: Vec<String>,
    /// Function body
    pub body: Block,
    /// Global object the function closes over
    pub global: ObjectRef,
}

/// Deferred function records of one compilation unit
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    next_id: u32,
    records: FxHashMap<FunctionId, DeferredFunction>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record under a fresh id
    pub fn register(&mut self, record: DeferredFunction) -> FunctionId {
        let id = FunctionId(self.next_id);
        self.next_id += 1;
        self.records.insert(id, record);
        id
    }

    /// Remove and return a record; a second call for the same id fails
    pub fn consume(&mut self, id: FunctionId) -> Result<DeferredFunction, CompileError> {
        self.records.remove(&id).ok_or(CompileError::FunctionConsumed { id })
    }

    /// Records not yet consumed
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether every record has been consumed
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
