//! Object model
//!
//! An object has an optional prototype, an insertion-ordered own property
//! store, an optional callable entry and an invalidation token that is
//! replaced on every registration. Plain objects, environments and function
//! objects share this one representation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::defaults::APPLY_PROPERTY;
use crate::jit::CompiledUnit;
use crate::vm::{RuntimeError, Value};

/// Shared reference to an object
pub type ObjectRef = Rc<Object>;

/// Global object ID counter
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Global token counter, separate from object IDs so tokens never repeat
static NEXT_SHAPE_TOKEN: AtomicU64 = AtomicU64::new(1);

fn generate_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Opaque invalidation token.
///
/// Every registration on an object replaces its token with a fresh one, so
/// anything derived from an object's shape can detect staleness by comparing
/// tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeToken(u64);

impl ShapeToken {
    fn fresh() -> Self {
        ShapeToken(NEXT_SHAPE_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Declared parameter count of a callable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments (receiver excluded)
    Fixed(usize),
    /// Any number of arguments
    Variadic,
}

impl Arity {
    /// Whether a call with `count` arguments is allowed
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => n == count,
            Arity::Variadic => true,
        }
    }

    /// Fail with `ArityMismatch` unless `count` is accepted
    pub fn check(self, count: usize) -> Result<(), RuntimeError> {
        match self {
            Arity::Fixed(expected) if expected != count => {
                Err(RuntimeError::ArityMismatch { expected, actual: count })
            }
            _ => Ok(()),
        }
    }
}

/// Host function body: `(receiver, args) -> value`
pub type NativeFn = Rc<dyn Fn(&Value, &[Value]) -> anyhow::Result<Value>>;

/// Built-in function implemented in Rust
pub struct NativeFunction {
    /// Function name
    pub name: String,
    /// Declared arity
    pub arity: Arity,
    /// Implementation
    pub fun: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Callable entry of a function object
#[derive(Clone)]
pub enum Callable {
    /// Generated native code
    Compiled(Rc<CompiledUnit>),
    /// Host function
    Native(Rc<NativeFunction>),
}

impl Callable {
    /// Declared arity
    pub fn arity(&self) -> Arity {
        match self {
            Callable::Compiled(unit) => Arity::Fixed(unit.arity()),
            Callable::Native(native) => native.arity,
        }
    }

    /// Run the entry. Arity is the caller's responsibility.
    pub fn call(&self, receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        match self {
            Callable::Compiled(unit) => unit.invoke(receiver, args),
            Callable::Native(native) => {
                (native.fun)(receiver, args).map_err(RuntimeError::from_native)
            }
        }
    }

    /// Whether both handles refer to the same entry
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Compiled(a), Callable::Compiled(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Compiled(unit) => write!(f, "Compiled({})", unit.name()),
            Callable::Native(native) => write!(f, "Native({})", native.name),
        }
    }
}

/// Stored property value
#[derive(Clone)]
enum Slot {
    Value(Value),
    /// The owning object itself, held without a strong count
    Owner,
}

/// Insertion-ordered property store with unique keys
#[derive(Default)]
struct PropertyMap {
    entries: Vec<(Rc<str>, Slot)>,
    index: FxHashMap<Rc<str>, usize>,
}

impl PropertyMap {
    fn get(&self, key: &str) -> Option<&Slot> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Overwrite in place, or append a new key at the end
    fn insert(&mut self, key: &str, value: Slot) -> Option<Slot> {
        if let Some(&i) = self.index.get(key) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        let key: Rc<str> = Rc::from(key);
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Runtime object
pub struct Object {
    id: u64,
    name: String,
    proto: Option<ObjectRef>,
    callable: Option<Callable>,
    properties: RefCell<PropertyMap>,
    token: Cell<ShapeToken>,
    this: Weak<Object>,
}

impl Object {
    fn alloc(proto: Option<ObjectRef>, name: String, callable: Option<Callable>) -> ObjectRef {
        Rc::new_cyclic(|this| Object {
            id: generate_object_id(),
            name,
            proto,
            callable,
            properties: RefCell::new(PropertyMap::default()),
            token: Cell::new(ShapeToken::fresh()),
            this: this.clone(),
        })
    }

    /// Plain object with an explicit prototype; never callable
    pub fn new_object(proto: Option<ObjectRef>) -> ObjectRef {
        Self::alloc(proto, "object".to_string(), None)
    }

    /// Environment object, used as the global scope
    pub fn new_env(parent: Option<ObjectRef>) -> ObjectRef {
        Self::alloc(parent, "env".to_string(), None)
    }

    /// Function object with a reflexive `apply` property. The property does
    /// not keep the function alive.
    pub fn new_function(name: &str, callable: Callable) -> ObjectRef {
        let function = Self::alloc(None, format!("function {name}"), Some(callable));
        function.store(APPLY_PROPERTY, Slot::Owner);
        function
    }

    /// Function object backed by a host closure
    pub fn new_native<F>(name: &str, arity: Arity, fun: F) -> ObjectRef
    where
        F: Fn(&Value, &[Value]) -> anyhow::Result<Value> + 'static,
    {
        let native = NativeFunction { name: name.to_string(), arity, fun: Rc::new(fun) };
        Self::new_function(name, Callable::Native(Rc::new(native)))
    }

    /// Unique object id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Diagnostic name: `object`, `env` or `function <name>`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prototype link
    pub fn prototype(&self) -> Option<&ObjectRef> {
        self.proto.as_ref()
    }

    /// Current invalidation token
    pub fn token(&self) -> ShapeToken {
        self.token.get()
    }

    /// Callable entry, if this is a function object
    pub fn callable(&self) -> Option<&Callable> {
        self.callable.as_ref()
    }

    /// Whether the object carries a callable entry
    pub fn is_callable(&self) -> bool {
        self.callable.is_some()
    }

    /// Generated code behind this function, if any
    pub fn compiled_unit(&self) -> Option<&Rc<CompiledUnit>> {
        match &self.callable {
            Some(Callable::Compiled(unit)) => Some(unit),
            _ => None,
        }
    }

    /// Look up `key` in the own store, then along the prototype chain.
    ///
    /// Absence is `Undefined`, never an error.
    pub fn lookup(&self, key: &str) -> Value {
        let mut current = self;
        loop {
            if let Some(slot) = current.properties.borrow().get(key) {
                return current.resolve(slot);
            }
            match &current.proto {
                Some(proto) => current = proto.as_ref(),
                None => return Value::Undefined,
            }
        }
    }

    /// Insert or overwrite `key` in the own store and replace the token.
    pub fn register(&self, key: &str, value: Value) {
        self.store(key, Slot::Value(value));
    }

    fn store(&self, key: &str, slot: Slot) {
        // The previous value may own this object; drop it after the borrow ends.
        let previous = self.properties.borrow_mut().insert(key, slot);
        self.token.set(ShapeToken::fresh());
        drop(previous);
    }

    fn resolve(&self, slot: &Slot) -> Value {
        match slot {
            Slot::Value(value) => value.clone(),
            Slot::Owner => self.this.upgrade().map_or(Value::Undefined, Value::Object),
        }
    }

    /// Own entries with values resolved, in insertion order
    fn entries(&self) -> Vec<(Rc<str>, Value)> {
        let slots = self.properties.borrow().entries.clone();
        slots.into_iter().map(|(key, slot)| (key, self.resolve(&slot))).collect()
    }

    /// Invoke the callable entry with `receiver` prepended to `args`.
    pub fn invoke(&self, receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let callable = self
            .callable
            .as_ref()
            .ok_or_else(|| RuntimeError::NotCallable { name: self.name.clone() })?;
        callable.arity().check(args.len())?;
        callable.call(receiver, args)
    }

    /// Number of own properties
    pub fn length(&self) -> usize {
        self.properties.borrow().len()
    }

    /// Own property keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.properties.borrow().entries.iter().map(|(k, _)| k.to_string()).collect()
    }

    /// Fresh prototype-less object holding `mapper` applied to each own value
    pub fn mirror<F>(&self, mut mapper: F) -> ObjectRef
    where
        F: FnMut(&Value) -> Value,
    {
        let mirror = Object::new_object(None);
        for (key, value) in &self.entries() {
            mirror.register(key, mapper(value));
        }
        mirror
    }

    fn render(object: &Object, out: &mut String, seen: &mut FxHashSet<u64>) {
        use std::fmt::Write;

        if !seen.insert(object.id) {
            let _ = write!(out, "... // {}", object.name);
            return;
        }
        let _ = writeln!(out, "{{ // {}", object.name);
        for (key, value) in &object.entries() {
            let _ = write!(out, "  {key}: ");
            match value {
                Value::Object(o) => Self::render(o, out, seen),
                other => {
                    let _ = write!(out, "{other}");
                }
            }
            out.push('\n');
        }
        out.push_str("  proto: ");
        match &object.proto {
            Some(proto) => Self::render(proto, out, seen),
            None => out.push_str("null"),
        }
        out.push_str("\n}");
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        Self::render(self, &mut out, &mut FxHashSet::default());
        f.write_str(&out)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("length", &self.length())
            .finish()
    }
}
