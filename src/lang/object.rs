use serde::{Deserialize, Serialize};
use std::fmt;

/// Signature of a native builtin function.
pub type BuiltinFn = fn(&[Object]) -> Object;

/// A named native function.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// Builtins are identified by name; the function pointer is not compared.
impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Runtime value.
///
/// Values are immutable: operations that "modify" an array build a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    /// 64-bit signed integer.
    Integer(i64),

    Boolean(bool),

    Null,

    String(String),

    Array(Vec<Object>),

    /// Native function. Never part of a constant pool, so never serialized.
    #[serde(skip)]
    Builtin(Builtin),

    /// An error value returned by builtins on misuse.
    Error(String),
}

pub const TRUE: Object = Object::Boolean(true);
pub const FALSE: Object = Object::Boolean(false);
pub const NULL: Object = Object::Null;

impl Object {
    /// Returns the shared boolean singleton for `b`.
    pub fn from_bool(b: bool) -> Object {
        if b { TRUE } else { FALSE }
    }

    /// `false` and `null` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Boolean(false) | Object::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer(_) => "INTEGER",
            Object::Boolean(_) => "BOOLEAN",
            Object::Null => "NULL",
            Object::String(_) => "STRING",
            Object::Array(_) => "ARRAY",
            Object::Builtin(_) => "BUILTIN",
            Object::Error(_) => "ERROR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(n) => write!(f, "{}", n),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::Null => write!(f, "null"),
            Object::String(s) => write!(f, "{}", s),
            Object::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Object::Builtin(b) => write!(f, "builtin function {}", b.name),
            Object::Error(msg) => write!(f, "ERROR: {}", msg),
        }
    }
}
