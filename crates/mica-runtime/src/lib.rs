//! Mica Runtime
//!
//! Binds the Mica engine with the built-in functions: owns a JIT engine and
//! a global environment, runs programs handed over as ASTs or as JSON.
//!
//! # Example
//!
//! ```rust,ignore
//! use mica_engine::ast::{Block, Expr};
//! use mica_runtime::Runtime;
//!
//! let runtime = Runtime::new()?;
//! let program = Block::new(vec![Expr::ret(Expr::call(
//!     Expr::var("+"),
//!     vec![Expr::int(40), Expr::int(2)],
//! ))]);
//! assert_eq!(runtime.execute(&program)?, mica_engine::Value::Int(42));
//! ```

pub mod builtins;
pub mod error;

pub use builtins::Output;
pub use error::Error;

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use mica_engine::ast::Block;
use mica_engine::{JitConfig, JitEngine, Object, ObjectRef, Value};
use tracing::debug;

/// Name of the function wrapping a whole program
pub const MAIN_FUNCTION: &str = "main";

/// A global environment plus the engine compiling code against it
pub struct Runtime {
    engine: Rc<JitEngine>,
    global: ObjectRef,
    output: Output,
}

impl Runtime {
    /// Create a runtime with the default engine configuration, printing to
    /// standard output
    pub fn new() -> Result<Self, Error> {
        Self::with_config(JitConfig::default())
    }

    /// Create a runtime with a custom engine configuration
    pub fn with_config(config: JitConfig) -> Result<Self, Error> {
        let engine = Rc::new(JitEngine::with_config(config)?);
        let global = Object::new_env(None);
        let output: Output = Rc::new(RefCell::new(Box::new(std::io::stdout())));
        builtins::install(&global, &output);
        Ok(Runtime { engine, global, output })
    }

    /// Redirect `print` to `sink`
    pub fn with_output(self, sink: impl Write + 'static) -> Self {
        *self.output.borrow_mut() = Box::new(sink);
        self
    }

    /// Global environment shared by every function compiled here
    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    /// Underlying engine
    pub fn engine(&self) -> &Rc<JitEngine> {
        &self.engine
    }

    /// Compile a function against the global environment
    pub fn compile_function(
        &self,
        name: Option<&str>,
        parameters: &[String],
        body: &Block,
    ) -> Result<ObjectRef, Error> {
        Ok(self.engine.compile_function(name, parameters, body, &self.global)?)
    }

    /// Run `program` as the body of a zero-parameter `main`
    pub fn execute(&self, program: &Block) -> Result<Value, Error> {
        let main = self.compile_function(Some(MAIN_FUNCTION), &[], program)?;
        debug!(target: "mica::runtime", instrs = program.instrs.len(), "executing program");
        Ok(main.invoke(&Value::Undefined, &[])?)
    }

    /// Decode a JSON program and run it
    pub fn execute_json(&self, json: &str) -> Result<Value, Error> {
        let program: Block = serde_json::from_str(json)?;
        self.execute(&program)
    }
}
