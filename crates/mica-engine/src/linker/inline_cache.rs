//! Inline cache for function call sites
//!
//! A site starts unlinked. Each miss resolves the callee, checks arity and
//! prepends a guard on the callee's identity, newest first. Once the chain
//! holds `max_depth` guards the next miss throws the chain away and the site
//! resolves on every call from then on.
//!
//! The strategy is immutable and shared through an indirection cell; a
//! relink swaps in a new strategy instead of editing the old one. No borrow
//! of the cell is held while the target runs, since recursive calls re-enter
//! the same site.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::linker::resolve_callee;
use crate::vm::{Callable, ObjectRef, RuntimeError, Value};

/// Dispatch strategy of a call site
enum Strategy {
    /// Resolve, then install a guard in front of the current chain
    Resolve,
    /// Use `target` when the callee is `expected`, else try `fallback`
    Guard {
        expected: ObjectRef,
        target: Callable,
        fallback: Rc<Strategy>,
    },
    /// Resolve on every call
    Megamorphic,
}

/// Caching regime of a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRegime {
    /// Never executed
    Unlinked,
    /// One guard installed
    Monomorphic,
    /// Several guards installed
    Polymorphic(usize),
    /// Guards discarded for good
    Megamorphic,
}

/// Function call site with a bounded guard chain
pub struct CallSite {
    arg_count: usize,
    max_depth: usize,
    strategy: RefCell<Rc<Strategy>>,
    depth: Cell<usize>,
}

impl CallSite {
    /// Create an unlinked site for calls with `arg_count` arguments
    pub fn new(arg_count: usize, max_depth: usize) -> Self {
        CallSite {
            arg_count,
            max_depth,
            strategy: RefCell::new(Rc::new(Strategy::Resolve)),
            depth: Cell::new(0),
        }
    }

    /// Number of arguments passed at this site
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Call `callee` with `receiver` and `args`
    pub fn invoke(&self, callee: &Value, receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let target = self.dispatch(callee)?;
        target.call(receiver, args)
    }

    fn dispatch(&self, callee: &Value) -> Result<Callable, RuntimeError> {
        let head = self.strategy.borrow().clone();
        let mut current = &*head;
        loop {
            match current {
                Strategy::Guard { expected, target, fallback } => {
                    if matches!(callee, Value::Object(o) if Rc::ptr_eq(o, expected)) {
                        return Ok(target.clone());
                    }
                    current = fallback.as_ref();
                }
                Strategy::Resolve => return self.relink(callee, head.clone()),
                Strategy::Megamorphic => return resolve_callee(callee, self.arg_count).map(|(_, c)| c),
            }
        }
    }

    fn relink(&self, callee: &Value, head: Rc<Strategy>) -> Result<Callable, RuntimeError> {
        let (expected, target) = resolve_callee(callee, self.arg_count)?;
        let depth = self.depth.get();
        let next = if depth >= self.max_depth {
            debug!(target: "mica::linker", depth, callee = expected.name(), "call site went megamorphic");
            self.depth.set(0);
            Strategy::Megamorphic
        } else {
            trace!(target: "mica::linker", depth = depth + 1, callee = expected.name(), "installed call guard");
            self.depth.set(depth + 1);
            Strategy::Guard { expected, target: target.clone(), fallback: head }
        };
        *self.strategy.borrow_mut() = Rc::new(next);
        Ok(target)
    }

    /// Current caching regime
    pub fn regime(&self) -> DispatchRegime {
        match &**self.strategy.borrow() {
            Strategy::Resolve => DispatchRegime::Unlinked,
            Strategy::Megamorphic => DispatchRegime::Megamorphic,
            Strategy::Guard { .. } => match self.depth.get() {
                1 => DispatchRegime::Monomorphic,
                n => DispatchRegime::Polymorphic(n),
            },
        }
    }
}
