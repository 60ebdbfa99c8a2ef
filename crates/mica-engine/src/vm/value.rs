//! Dynamic values
//!
//! Inside Rust a value is a plain enum. Generated code sees the same value
//! as a NaN-boxed 64-bit word (see `jit::abi`); heap values are encoded as
//! the address of their `Rc` allocation and must be kept alive by someone
//! else while the word is in flight (see `jit::roots`).

use std::fmt;
use std::rc::Rc;

use crate::jit::abi::{
    FALSE_VALUE, NAN_BOX_BASE, NULL_VALUE, PAYLOAD_MASK, PAYLOAD_MASK_32, TAG_BOOL, TAG_I32,
    TAG_MASK, TAG_PTR, TAG_STR, TRUE_VALUE, UNDEFINED_VALUE,
};
use crate::vm::object::{Object, ObjectRef};

/// A Mica value
#[derive(Clone, Default)]
pub enum Value {
    /// The "undefined" singleton
    #[default]
    Undefined,
    /// Host absence marker
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// Immutable string
    String(Rc<String>),
    /// Object reference
    Object(ObjectRef),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Rc::new(s.into()))
    }

    /// Borrow the object behind this value, if any
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get the integer payload, if any
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether this is the undefined singleton
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether the value lives on the heap
    pub fn is_heap(&self) -> bool {
        matches!(self, Value::String(_) | Value::Object(_))
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::String(s) => format!("{:?}", s.as_str()),
            Value::Object(o) => o.name().to_string(),
        }
    }

    /// Encode as a NaN-boxed word without touching reference counts.
    ///
    /// The word borrows from `self`: heap payloads stay valid only while
    /// this value (or another owner of the same allocation) is alive.
    pub fn to_raw(&self) -> u64 {
        match self {
            Value::Undefined => UNDEFINED_VALUE,
            Value::Null => NULL_VALUE,
            Value::Bool(true) => TRUE_VALUE,
            Value::Bool(false) => FALSE_VALUE,
            Value::Int(i) => NAN_BOX_BASE | TAG_I32 | ((*i as i64 as u64) & PAYLOAD_MASK),
            Value::String(s) => NAN_BOX_BASE | TAG_STR | (Rc::as_ptr(s) as u64 & PAYLOAD_MASK),
            Value::Object(o) => NAN_BOX_BASE | TAG_PTR | (Rc::as_ptr(o) as u64 & PAYLOAD_MASK),
        }
    }

    /// Decode a NaN-boxed word into an owned value.
    ///
    /// Heap payloads get their strong count incremented, so the result is
    /// independent of whoever kept the word alive. Unknown bit patterns
    /// decode as `Undefined`.
    ///
    /// # Safety
    ///
    /// Pointer payloads must refer to live `Rc` allocations of the tagged
    /// type.
    pub unsafe fn from_raw(bits: u64) -> Value {
        if bits & NAN_BOX_BASE != NAN_BOX_BASE {
            debug_assert!(false, "not a NaN-boxed value: 0x{bits:016X}");
            return Value::Undefined;
        }
        match bits & TAG_MASK {
            TAG_PTR => {
                let ptr = (bits & PAYLOAD_MASK) as *const Object;
                Rc::increment_strong_count(ptr);
                Value::Object(Rc::from_raw(ptr))
            }
            TAG_I32 => Value::Int((bits & PAYLOAD_MASK_32) as u32 as i32),
            TAG_BOOL => Value::Bool(bits & 1 != 0),
            TAG_STR => {
                let ptr = (bits & PAYLOAD_MASK) as *const String;
                Rc::increment_strong_count(ptr);
                Value::String(Rc::from_raw(ptr))
            }
            _ if bits == NULL_VALUE => Value::Null,
            _ => Value::Undefined,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::String(s) => write!(f, "String({:?})", s.as_str()),
            Value::Object(o) => write!(f, "Object({:?})", o),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Object(o) => write!(f, "{o}"),
        }
    }
}
