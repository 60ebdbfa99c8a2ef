//! Scope resolution
//!
//! Functions have function-level scoping: a `var` inside either arm of an
//! `if` is visible for the rest of the function. Nested function literals
//! are skipped; they get their own table when they are compiled.

use rustc_hash::FxHashMap;

use crate::ast::{Block, Expr};
use crate::defaults::RECEIVER_NAME;

/// Name to slot mapping for one function body
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    slots: FxHashMap<String, u32>,
    names: Vec<String>,
    /// Slot of the receiver and of each parameter, in signature order
    parameter_slots: Vec<u32>,
}

impl VariableTable {
    /// Build the table: `this` at slot 0, parameters next, then declarations
    /// in program order.
    pub fn resolve(parameters: &[String], body: &Block) -> Self {
        let mut table = VariableTable::default();
        let receiver = table.declare(RECEIVER_NAME);
        table.parameter_slots.push(receiver);
        for parameter in parameters {
            let slot = table.declare(parameter);
            table.parameter_slots.push(slot);
        }
        table.visit_block(body);
        table
    }

    /// Claim the next slot for `name` unless it already has one
    fn declare(&mut self, name: &str) -> u32 {
        if let Some(&slot) = self.slots.get(name) {
            return slot;
        }
        let slot = self.names.len() as u32;
        self.slots.insert(name.to_string(), slot);
        self.names.push(name.to_string());
        slot
    }

    fn visit_block(&mut self, block: &Block) {
        for instr in &block.instrs {
            self.visit(instr);
        }
    }

    fn visit(&mut self, expr: &Expr) {
        match expr {
            Expr::Block(block) => self.visit_block(block),
            Expr::LocalVarAssignment(assignment) if assignment.declaration => {
                self.declare(&assignment.name);
            }
            Expr::If(node) => {
                self.visit_block(&node.true_block);
                self.visit_block(&node.false_block);
            }
            _ => {}
        }
    }

    /// Slot of `name`, or `None` for a free variable
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.slots.get(name).copied()
    }

    /// Total number of slots, receiver included
    pub fn slot_count(&self) -> usize {
        self.names.len()
    }

    /// Slots bound to the entry function's parameters, receiver first
    pub fn parameter_slots(&self) -> &[u32] {
        &self.parameter_slots
    }
}
