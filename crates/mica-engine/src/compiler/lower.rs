//! AST → Cranelift IR lowering
//!
//! One entry function per source function. Every local lives in a Cranelift
//! `Variable` indexed by its slot. Dynamic operations become calls into
//! runtime helpers bound to per-site state; fallible helpers are followed by
//! a branch to a shared cold block that returns `FAILURE_VALUE`.

use std::rc::Rc;

use cranelift_codegen::ir::{self, types, FuncRef, InstBuilder, StackSlotData, StackSlotKind};
use cranelift_frontend::{FunctionBuilder, Variable};
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Module};
use rustc_hash::FxHashMap;

use crate::ast::{self, Block, Expr, LiteralValue};
use crate::compiler::{CompileError, DeferredFunction, VariableTable};
use crate::jit::abi::{self, FAILURE_VALUE};
use crate::jit::helpers::RuntimeHelper;
use crate::jit::unit::{SiteTable, UnitContext};
use crate::jit::JitConfig;
use crate::linker::{CallSite, FieldSite, FunctionSite, LookupSite, MethodSite, RegisterSite};

/// State maintained during lowering of a single function
pub struct LoweringContext<'a> {
    module: &'a mut JITModule,
    helper_ids: &'a [FuncId],
    /// Helpers already imported into this function
    func_refs: FxHashMap<RuntimeHelper, FuncRef>,
    table: &'a VariableTable,
    /// Slot index → Cranelift variable
    slots: Vec<Variable>,
    sites: &'a mut SiteTable,
    context: &'a Rc<UnitContext>,
    config: &'a JitConfig,
    /// Returns `FAILURE_VALUE`; target of every failure check
    fail_block: ir::Block,
}

impl<'a> LoweringContext<'a> {
    /// Lower `body` into the entry function held by `builder`.
    /// Takes ownership of the builder since `finalize()` consumes it.
    #[allow(clippy::too_many_arguments)]
    pub fn lower(
        mut builder: FunctionBuilder<'_>,
        module: &'a mut JITModule,
        helper_ids: &'a [FuncId],
        table: &'a VariableTable,
        sites: &'a mut SiteTable,
        context: &'a Rc<UnitContext>,
        config: &'a JitConfig,
        body: &Block,
    ) -> Result<(), CompileError> {
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        // Every slot starts out undefined; receiver and parameters overwrite
        // theirs below.
        let undefined = abi::emit_undefined(&mut builder);
        let mut slots = Vec::with_capacity(table.slot_count());
        for _ in 0..table.slot_count() {
            let var = builder.declare_var(types::I64);
            builder.def_var(var, undefined);
            slots.push(var);
        }
        let params = builder.block_params(entry).to_vec();
        for (&param, &slot) in params.iter().zip(table.parameter_slots()) {
            builder.def_var(slots[slot as usize], param);
        }

        let fail_block = builder.create_block();
        builder.set_cold_block(fail_block);

        let mut ctx = LoweringContext {
            module,
            helper_ids,
            func_refs: FxHashMap::default(),
            table,
            slots,
            sites,
            context,
            config,
            fail_block,
        };

        ctx.lower_block(&mut builder, body)?;

        // Falling off the end returns undefined
        let undefined = abi::emit_undefined(&mut builder);
        builder.ins().return_(&[undefined]);

        builder.switch_to_block(fail_block);
        builder.seal_block(fail_block);
        let failure = builder.ins().iconst(types::I64, FAILURE_VALUE as i64);
        builder.ins().return_(&[failure]);

        builder.finalize();
        Ok(())
    }

    fn lower_block(&mut self, builder: &mut FunctionBuilder<'_>, block: &Block) -> Result<(), CompileError> {
        for instr in &block.instrs {
            builder.set_srcloc(ir::SourceLoc::new(instr.line()));
            if instr.is_statement() {
                self.lower_statement(builder, instr)?;
            } else {
                // Value discarded
                self.lower_expr(builder, instr)?;
            }
        }
        Ok(())
    }

    /// Lower a statement form for its effect only
    fn lower_statement(&mut self, builder: &mut FunctionBuilder<'_>, stmt: &Expr) -> Result<(), CompileError> {
        match stmt {
            Expr::Block(block) => self.lower_block(builder, block)?,

            Expr::LocalVarAssignment(assignment) => {
                let value = self.lower_expr(builder, &assignment.expr)?;
                let slot = self.table.lookup(&assignment.name).ok_or_else(|| CompileError::UnknownVariable {
                    name: assignment.name.clone(),
                    line: assignment.line,
                })?;
                builder.def_var(self.slots[slot as usize], value);
            }

            Expr::Return(ret) => {
                let value = self.lower_expr(builder, &ret.expr)?;
                builder.ins().return_(&[value]);
                // Anything after a return lands in an unreachable block
                let dead = builder.create_block();
                builder.switch_to_block(dead);
                builder.seal_block(dead);
            }

            Expr::If(node) => {
                let condition = self.lower_expr(builder, &node.condition)?;
                let flag = abi::emit_truth(builder, condition);

                let then_block = builder.create_block();
                let else_block = builder.create_block();
                let merge_block = builder.create_block();
                builder.ins().brif(flag, then_block, &[], else_block, &[]);

                builder.switch_to_block(then_block);
                builder.seal_block(then_block);
                self.lower_block(builder, &node.true_block)?;
                builder.ins().jump(merge_block, &[]);

                builder.switch_to_block(else_block);
                builder.seal_block(else_block);
                self.lower_block(builder, &node.false_block)?;
                builder.ins().jump(merge_block, &[]);

                builder.switch_to_block(merge_block);
                builder.seal_block(merge_block);
            }

            Expr::FieldAssignment(assignment) => {
                let receiver = self.lower_expr(builder, &assignment.receiver)?;
                let value = self.lower_expr(builder, &assignment.expr)?;
                let site = self.sites.add_field(FieldSite::new(&assignment.name));
                let args = [self.imm(builder, site), receiver, value];
                self.call_helper(builder, RuntimeHelper::SetField, &args);
            }

            other => {
                self.lower_expr(builder, other)?;
            }
        }
        Ok(())
    }

    /// Lower one node to a value. Statement forms produce `undefined`.
    fn lower_expr(&mut self, builder: &mut FunctionBuilder<'_>, expr: &Expr) -> Result<ir::Value, CompileError> {
        match expr {
            Expr::Block(_)
            | Expr::LocalVarAssignment(_)
            | Expr::FieldAssignment(_)
            | Expr::Return(_)
            | Expr::If(_) => {
                self.lower_statement(builder, expr)?;
                Ok(abi::emit_undefined(builder))
            }

            Expr::Literal(literal) => Ok(match &literal.value {
                LiteralValue::Int(i) => abi::emit_box_i32(builder, *i),
                LiteralValue::String(s) => {
                    let bits = self.sites.intern(s);
                    builder.ins().iconst(types::I64, bits as i64)
                }
            }),

            Expr::LocalVarAccess(access) => match self.table.lookup(&access.name) {
                Some(slot) => Ok(builder.use_var(self.slots[slot as usize])),
                None => {
                    let site = self.sites.add_lookup(LookupSite::new(&access.name));
                    let args = [self.context_ptr(builder), self.imm(builder, site)];
                    Ok(self.call_helper(builder, RuntimeHelper::LookupGlobal, &args))
                }
            },

            Expr::FunctionLiteral(literal) => Ok(self.lower_function_literal(builder, literal)),

            Expr::ObjectLiteral(literal) => {
                let object = self.call_helper(builder, RuntimeHelper::NewObject, &[]);
                for (key, init) in &literal.entries {
                    let value = self.lower_expr(builder, init)?;
                    let site = self.sites.add_field(FieldSite::new(key));
                    let args = [self.imm(builder, site), object, value];
                    self.call_helper(builder, RuntimeHelper::SetField, &args);
                }
                Ok(object)
            }

            Expr::FieldAccess(access) => {
                let receiver = self.lower_expr(builder, &access.receiver)?;
                let site = self.sites.add_field(FieldSite::new(&access.name));
                let args = [self.imm(builder, site), receiver];
                Ok(self.call_helper(builder, RuntimeHelper::GetField, &args))
            }

            Expr::FunctionCall(call) => {
                let callee = self.lower_expr(builder, &call.qualifier)?;
                let args_ptr = self.lower_args(builder, &call.args)?;
                let site = CallSite::new(call.args.len(), self.config.inline_cache_depth);
                let site = self.sites.add_call(site);
                let receiver = abi::emit_undefined(builder);
                let args = [self.imm(builder, site), callee, receiver, args_ptr];
                Ok(self.call_helper(builder, RuntimeHelper::Call, &args))
            }

            Expr::MethodCall(call) => {
                let receiver = self.lower_expr(builder, &call.receiver)?;
                let args_ptr = self.lower_args(builder, &call.args)?;
                let site = self.sites.add_method(MethodSite::new(&call.name, call.args.len()));
                let args = [self.imm(builder, site), receiver, args_ptr];
                Ok(self.call_helper(builder, RuntimeHelper::MethodCall, &args))
            }
        }
    }

    fn lower_function_literal(&mut self, builder: &mut FunctionBuilder<'_>, literal: &ast::FunctionLiteral) -> ir::Value {
        let id = self.context.registry().borrow_mut().register(DeferredFunction {
            name: literal.name.clone(),
            parameters: literal.parameters.clone(),
            body: literal.body.clone(),
            global: self.context.global().clone(),
        });
        let site = self.sites.add_function(FunctionSite::new(id));
        let args = [self.context_ptr(builder), self.imm(builder, site)];
        let function = self.call_helper(builder, RuntimeHelper::MakeFunction, &args);

        if let Some(name) = &literal.name {
            let site = self.sites.add_register(RegisterSite::new(name));
            let args = [self.context_ptr(builder), self.imm(builder, site), function];
            self.call_helper(builder, RuntimeHelper::RegisterGlobal, &args);
        }
        function
    }

    /// Evaluate arguments left to right and spill them to a fresh stack slot.
    /// Returns a null pointer when there are none.
    fn lower_args(&mut self, builder: &mut FunctionBuilder<'_>, args: &[Expr]) -> Result<ir::Value, CompileError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.lower_expr(builder, arg)?);
        }
        if values.is_empty() {
            return Ok(abi::emit_null_ptr(builder));
        }
        let slot = builder.create_sized_stack_slot(StackSlotData::new(
            StackSlotKind::ExplicitSlot,
            (values.len() * 8) as u32,
            3, // 8-byte alignment
        ));
        for (i, &value) in values.iter().enumerate() {
            builder.ins().stack_store(value, slot, (i * 8) as i32);
        }
        Ok(builder.ins().stack_addr(types::I64, slot, 0))
    }

    /// Call a runtime helper, checking its result if it can fail
    fn call_helper(&mut self, builder: &mut FunctionBuilder<'_>, helper: RuntimeHelper, args: &[ir::Value]) -> ir::Value {
        let func_ref = match self.func_refs.get(&helper) {
            Some(&func_ref) => func_ref,
            None => {
                let func_ref = self.module.declare_func_in_func(self.helper_ids[helper as usize], builder.func);
                self.func_refs.insert(helper, func_ref);
                func_ref
            }
        };
        let call = builder.ins().call(func_ref, args);
        let result = builder.inst_results(call)[0];
        if helper.is_fallible() {
            self.check_failure(builder, result);
        }
        result
    }

    fn check_failure(&mut self, builder: &mut FunctionBuilder<'_>, result: ir::Value) {
        let failed = abi::emit_is_failure(builder, result);
        let continue_block = builder.create_block();
        builder.ins().brif(failed, self.fail_block, &[], continue_block, &[]);
        builder.switch_to_block(continue_block);
        builder.seal_block(continue_block);
    }

    fn context_ptr(&self, builder: &mut FunctionBuilder<'_>) -> ir::Value {
        builder.ins().iconst(types::I64, Rc::as_ptr(self.context) as i64)
    }

    fn imm(&self, builder: &mut FunctionBuilder<'_>, value: i64) -> ir::Value {
        builder.ins().iconst(types::I64, value)
    }
}
