//! Top-level JIT engine: target setup and per-function compilation.

use std::rc::Rc;

use cranelift_codegen::ir::{self, types, InstBuilder, MemFlags, UserFuncName};
use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};
use target_lexicon::PointerWidth;
use tracing::{debug, trace};

use crate::ast::Block;
use crate::compiler::lower::LoweringContext;
use crate::compiler::{CompileError, VariableTable};
use crate::defaults::{ANONYMOUS_FUNCTION_NAME, DEFAULT_INLINE_CACHE_DEPTH};
use crate::jit::helpers::RuntimeHelper;
use crate::jit::trampoline::{entry_signature, helper_signature, invoker_signature, InvokeFn};
use crate::jit::unit::{CompiledUnit, SiteTable, UnitContext};
use crate::vm::{Callable, Object, ObjectRef};

/// Cranelift optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    /// No optimization
    None,
    /// Optimize for speed
    #[default]
    Speed,
    /// Optimize for speed and size
    SpeedAndSize,
}

impl OptLevel {
    fn as_setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

/// Configuration for the JIT engine
#[derive(Debug, Clone)]
pub struct JitConfig {
    /// Guards a call site chains before going megamorphic (default: 3)
    pub inline_cache_depth: usize,
    /// Cranelift optimization level (default: speed)
    pub opt_level: OptLevel,
    /// Run the Cranelift IR verifier (default: on in debug builds)
    pub verify_ir: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        JitConfig {
            inline_cache_depth: DEFAULT_INLINE_CACHE_DEPTH,
            opt_level: OptLevel::Speed,
            verify_ir: cfg!(debug_assertions),
        }
    }
}

/// Compiles function bodies into callable function objects
pub struct JitEngine {
    isa: OwnedTargetIsa,
    config: JitConfig,
}

impl JitEngine {
    /// Create an engine for the host with default configuration
    pub fn new() -> Result<Self, CompileError> {
        Self::with_config(JitConfig::default())
    }

    /// Create an engine for the host with custom configuration
    pub fn with_config(config: JitConfig) -> Result<Self, CompileError> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", config.opt_level.as_setting())
            .map_err(|e| CompileError::Codegen(format!("Failed to set opt_level: {e}")))?;
        flag_builder
            .set("is_pic", "false")
            .map_err(|e| CompileError::Codegen(format!("Failed to set is_pic: {e}")))?;
        flag_builder
            .set("enable_verifier", if config.verify_ir { "true" } else { "false" })
            .map_err(|e| CompileError::Codegen(format!("Failed to set enable_verifier: {e}")))?;

        let isa = cranelift_native::builder()
            .map_err(|e| CompileError::UnsupportedTarget(e.to_string()))?
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| CompileError::Codegen(format!("Failed to finish ISA: {e}")))?;

        if isa.triple().pointer_width() != Ok(PointerWidth::U64) {
            return Err(CompileError::UnsupportedTarget(format!(
                "{} is not a 64-bit target",
                isa.triple()
            )));
        }

        Ok(JitEngine { isa, config })
    }

    /// Engine configuration
    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    /// Compile a function body into a callable function object.
    ///
    /// Nested function literals in `body` are compiled later, the first time
    /// their materialization site runs.
    pub fn compile_function(
        self: &Rc<Self>,
        name: Option<&str>,
        parameters: &[String],
        body: &Block,
        global: &ObjectRef,
    ) -> Result<ObjectRef, CompileError> {
        let name = name.unwrap_or(ANONYMOUS_FUNCTION_NAME);
        let arity = parameters.len();
        let table = VariableTable::resolve(parameters, body);
        let context = Rc::new(UnitContext::new(global.clone(), self.clone()));

        let mut builder = JITBuilder::with_isa(self.isa.clone(), cranelift_module::default_libcall_names());
        for helper in RuntimeHelper::ALL {
            builder.symbol(helper.symbol(), helper.address());
        }
        let mut module = JITModule::new(builder);
        let call_conv = self.isa.default_call_conv();

        let mut helper_ids: Vec<FuncId> = Vec::with_capacity(RuntimeHelper::ALL.len());
        for helper in RuntimeHelper::ALL {
            let sig = helper_signature(call_conv, helper.param_count());
            let id = module
                .declare_function(helper.symbol(), Linkage::Import, &sig)
                .map_err(|e| CompileError::Codegen(format!("Failed to declare helper: {e}")))?;
            helper_ids.push(id);
        }

        let entry_sig = entry_signature(call_conv, arity);
        let entry_id = module
            .declare_function("entry", Linkage::Local, &entry_sig)
            .map_err(|e| CompileError::Codegen(format!("Failed to declare entry: {e}")))?;

        let mut sites = SiteTable::default();
        let mut fb_ctx = FunctionBuilderContext::new();
        let mut func = ir::Function::with_name_signature(UserFuncName::user(0, entry_id.as_u32()), entry_sig);
        {
            let builder = FunctionBuilder::new(&mut func, &mut fb_ctx);
            LoweringContext::lower(
                builder,
                &mut module,
                &helper_ids,
                &table,
                &mut sites,
                &context,
                &self.config,
                body,
            )?;
        }
        trace!(target: "mica::jit", name, ir = %func.display(), "generated IR");
        let mut ctx = Context::for_function(func);
        module
            .define_function(entry_id, &mut ctx)
            .map_err(|e| CompileError::Codegen(format!("Failed to compile '{name}': {e:?}")))?;

        let invoke_id = self.define_invoker(&mut module, &mut fb_ctx, entry_id, arity)?;
        module
            .finalize_definitions()
            .map_err(|e| CompileError::Codegen(format!("Failed to finalize: {e}")))?;
        let code = module.get_finalized_function(invoke_id);
        // SAFETY: the invoker was declared with `invoker_signature`
        let invoker = unsafe { std::mem::transmute::<*const u8, InvokeFn>(code) };

        debug!(
            target: "mica::jit",
            name,
            arity,
            slots = table.slot_count(),
            sites = sites.len(),
            constants = sites.constant_count(),
            "compiled unit"
        );
        let unit = CompiledUnit::new(name, arity, invoker, context, sites, module);
        Ok(Object::new_function(name, Callable::Compiled(Rc::new(unit))))
    }

    /// Define the adapter that unpacks a word array and calls the entry
    fn define_invoker(
        &self,
        module: &mut JITModule,
        fb_ctx: &mut FunctionBuilderContext,
        entry_id: FuncId,
        arity: usize,
    ) -> Result<FuncId, CompileError> {
        let sig = invoker_signature(self.isa.default_call_conv());
        let invoke_id = module
            .declare_function("invoke", Linkage::Local, &sig)
            .map_err(|e| CompileError::Codegen(format!("Failed to declare invoker: {e}")))?;

        let mut func = ir::Function::with_name_signature(UserFuncName::user(0, invoke_id.as_u32()), sig);
        {
            let mut builder = FunctionBuilder::new(&mut func, fb_ctx);
            let block = builder.create_block();
            builder.append_block_params_for_function_params(block);
            builder.switch_to_block(block);
            builder.seal_block(block);

            let args_ptr = builder.block_params(block)[0];
            let args: Vec<ir::Value> = (0..=arity)
                .map(|i| builder.ins().load(types::I64, MemFlags::trusted(), args_ptr, (i * 8) as i32))
                .collect();
            let entry = module.declare_func_in_func(entry_id, builder.func);
            let call = builder.ins().call(entry, &args);
            let result = builder.inst_results(call)[0];
            builder.ins().return_(&[result]);
            builder.finalize();
        }

        let mut ctx = Context::for_function(func);
        module
            .define_function(invoke_id, &mut ctx)
            .map_err(|e| CompileError::Codegen(format!("Failed to compile invoker: {e:?}")))?;
        Ok(invoke_id)
    }
}
