//! Expression AST nodes
//!
//! The parser is an external collaborator; this module only defines the tree
//! it hands over. Every node records the source line it came from. Trees can
//! be exchanged as JSON (internally tagged by `"kind"`).

use serde::{Deserialize, Serialize};

/// Expression or statement node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expr {
    /// Sequence of instructions: `{ a; b; }`
    Block(Block),

    /// Integer or string constant
    Literal(Literal),

    /// Call of a function value: `f(1, 2)`
    FunctionCall(FunctionCall),

    /// Read of a local or global name: `x`
    LocalVarAccess(LocalVarAccess),

    /// Write of a local: `var x = 1` or `x = 1`
    LocalVarAssignment(LocalVarAssignment),

    /// Function literal: `function f(a) { ... }`
    FunctionLiteral(FunctionLiteral),

    /// Return statement
    Return(Return),

    /// Conditional statement
    If(If),

    /// Object literal: `{ a: 1, b: 2 }`
    ObjectLiteral(ObjectLiteral),

    /// Property read: `o.a`
    FieldAccess(FieldAccess),

    /// Property write: `o.a = 1`
    FieldAssignment(FieldAssignment),

    /// Method call: `o.m(1)`
    MethodCall(MethodCall),
}

/// Block of instructions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    /// Instructions in program order
    pub instrs: Vec<Expr>,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Constant value carried by a literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    /// 32-bit integer
    Int(i32),
    /// String
    String(String),
}

/// Literal expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    /// The constant
    pub value: LiteralValue,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Expression producing the callee
    pub qualifier: Box<Expr>,
    /// Arguments, evaluated left to right
    pub args: Vec<Expr>,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Variable read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVarAccess {
    /// Variable name
    pub name: String,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Variable write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVarAssignment {
    /// Variable name
    pub name: String,
    /// Value to store
    pub expr: Box<Expr>,
    /// `true` for `var x = ...`, `false` for a plain reassignment
    pub declaration: bool,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Function literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionLiteral {
    /// Name, registered on the global object when present
    #[serde(default)]
    pub name: Option<String>,
    /// Parameter names
    pub parameters: Vec<String>,
    /// Function body
    pub body: Block,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Return statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Return {
    /// Returned expression
    pub expr: Box<Expr>,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Conditional statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct If {
    /// Condition, converted with the truth rule
    pub condition: Box<Expr>,
    /// Branch taken when the condition is true
    pub true_block: Block,
    /// Branch taken otherwise
    #[serde(default)]
    pub false_block: Block,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Object literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLiteral {
    /// Key/initializer pairs in declaration order
    pub entries: Vec<(String, Expr)>,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Property read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAccess {
    /// Object expression
    pub receiver: Box<Expr>,
    /// Property name
    pub name: String,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Property write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAssignment {
    /// Object expression
    pub receiver: Box<Expr>,
    /// Property name
    pub name: String,
    /// Value to store
    pub expr: Box<Expr>,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

/// Method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Object expression, also passed as `this`
    pub receiver: Box<Expr>,
    /// Method name
    pub name: String,
    /// Arguments, evaluated left to right
    pub args: Vec<Expr>,
    /// Source line
    #[serde(default)]
    pub line: u32,
}

impl Expr {
    /// Get the source line of this node
    pub fn line(&self) -> u32 {
        match self {
            Expr::Block(e) => e.line,
            Expr::Literal(e) => e.line,
            Expr::FunctionCall(e) => e.line,
            Expr::LocalVarAccess(e) => e.line,
            Expr::LocalVarAssignment(e) => e.line,
            Expr::FunctionLiteral(e) => e.line,
            Expr::Return(e) => e.line,
            Expr::If(e) => e.line,
            Expr::ObjectLiteral(e) => e.line,
            Expr::FieldAccess(e) => e.line,
            Expr::FieldAssignment(e) => e.line,
            Expr::MethodCall(e) => e.line,
        }
    }

    /// Whether this node is a statement form that produces no value.
    ///
    /// Anything else used in statement position has its value discarded.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Expr::Block(_)
                | Expr::LocalVarAssignment(_)
                | Expr::FieldAssignment(_)
                | Expr::Return(_)
                | Expr::If(_)
        )
    }

    /// Set the source line of this node
    pub fn at(mut self, line: u32) -> Self {
        match &mut self {
            Expr::Block(e) => e.line = line,
            Expr::Literal(e) => e.line = line,
            Expr::FunctionCall(e) => e.line = line,
            Expr::LocalVarAccess(e) => e.line = line,
            Expr::LocalVarAssignment(e) => e.line = line,
            Expr::FunctionLiteral(e) => e.line = line,
            Expr::Return(e) => e.line = line,
            Expr::If(e) => e.line = line,
            Expr::ObjectLiteral(e) => e.line = line,
            Expr::FieldAccess(e) => e.line = line,
            Expr::FieldAssignment(e) => e.line = line,
            Expr::MethodCall(e) => e.line = line,
        }
        self
    }

    // ===== Constructors =====

    /// `{ instrs... }`
    pub fn block(instrs: Vec<Expr>) -> Self {
        Expr::Block(Block::new(instrs))
    }

    /// Integer literal
    pub fn int(value: i32) -> Self {
        Expr::Literal(Literal { value: LiteralValue::Int(value), line: 0 })
    }

    /// String literal
    pub fn string(value: &str) -> Self {
        Expr::Literal(Literal { value: LiteralValue::String(value.to_string()), line: 0 })
    }

    /// Variable read
    pub fn var(name: &str) -> Self {
        Expr::LocalVarAccess(LocalVarAccess { name: name.to_string(), line: 0 })
    }

    /// `var name = expr`
    pub fn declare(name: &str, expr: Expr) -> Self {
        Expr::LocalVarAssignment(LocalVarAssignment {
            name: name.to_string(),
            expr: Box::new(expr),
            declaration: true,
            line: 0,
        })
    }

    /// `name = expr`
    pub fn assign(name: &str, expr: Expr) -> Self {
        Expr::LocalVarAssignment(LocalVarAssignment {
            name: name.to_string(),
            expr: Box::new(expr),
            declaration: false,
            line: 0,
        })
    }

    /// `qualifier(args...)`
    pub fn call(qualifier: Expr, args: Vec<Expr>) -> Self {
        Expr::FunctionCall(FunctionCall { qualifier: Box::new(qualifier), args, line: 0 })
    }

    /// `function name(parameters...) body`
    pub fn function(name: Option<&str>, parameters: &[&str], body: Block) -> Self {
        Expr::FunctionLiteral(FunctionLiteral {
            name: name.map(str::to_string),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            body,
            line: 0,
        })
    }

    /// `return expr`
    pub fn ret(expr: Expr) -> Self {
        Expr::Return(Return { expr: Box::new(expr), line: 0 })
    }

    /// `if (condition) true_block else false_block`
    pub fn if_else(condition: Expr, true_block: Block, false_block: Block) -> Self {
        Expr::If(If { condition: Box::new(condition), true_block, false_block, line: 0 })
    }

    /// `{ key: expr, ... }`
    pub fn object(entries: Vec<(&str, Expr)>) -> Self {
        Expr::ObjectLiteral(ObjectLiteral {
            entries: entries.into_iter().map(|(k, e)| (k.to_string(), e)).collect(),
            line: 0,
        })
    }

    /// `receiver.name`
    pub fn field(receiver: Expr, name: &str) -> Self {
        Expr::FieldAccess(FieldAccess { receiver: Box::new(receiver), name: name.to_string(), line: 0 })
    }

    /// `receiver.name = expr`
    pub fn set_field(receiver: Expr, name: &str, expr: Expr) -> Self {
        Expr::FieldAssignment(FieldAssignment {
            receiver: Box::new(receiver),
            name: name.to_string(),
            expr: Box::new(expr),
            line: 0,
        })
    }

    /// `receiver.name(args...)`
    pub fn method_call(receiver: Expr, name: &str, args: Vec<Expr>) -> Self {
        Expr::MethodCall(MethodCall {
            receiver: Box::new(receiver),
            name: name.to_string(),
            args,
            line: 0,
        })
    }
}

impl Block {
    /// Create a block at line 0
    pub fn new(instrs: Vec<Expr>) -> Self {
        Block { instrs, line: 0 }
    }
}

impl From<Vec<Expr>> for Block {
    fn from(instrs: Vec<Expr>) -> Self {
        Block::new(instrs)
    }
}
