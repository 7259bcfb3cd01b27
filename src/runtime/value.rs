//! Runtime values.
//!
//! Scalars and strings compare by value; arrays, records, classes, modules
//! and functions compare (and hash) by identity. That makes any value
//! usable as a record key, with aggregates keyed by the object itself.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::class::{Builtins, Class};
use super::function::Function;
use super::module::Module;
use super::record::Record;
use crate::parser::module::Constant;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type RecordRef = Rc<RefCell<Record>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Char(char),
    Str(Rc<str>),
    Array(ArrayRef),
    Record(RecordRef),
    Class(Rc<Class>),
    Module(Rc<Module>),
    Function(Rc<Function>),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn record(record: Record) -> Value {
        Value::Record(Rc::new(RefCell::new(record)))
    }

    pub fn from_constant(constant: &Constant) -> Value {
        match constant {
            Constant::Integer(i) => Value::Number(f64::from(*i)),
            Constant::Float(x) => Value::Number(*x),
            Constant::Char(c) => Value::Char(*c),
            Constant::Str(s) | Constant::Symbol(s) => Value::string(s),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Class(_) => "class",
            Value::Module(_) => "module",
            Value::Function(_) => "function",
        }
    }

    /// Null and false are falsey, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Function>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The class a value dispatches methods through. Scalars have none.
    pub fn class(&self, builtins: &Builtins) -> Option<Rc<Class>> {
        match self {
            Value::Record(r) => Some(Rc::clone(r.borrow().class())),
            Value::Array(_) => Some(Rc::clone(&builtins.array)),
            Value::Str(_) => Some(Rc::clone(&builtins.string)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// NaN keys never match themselves; everything else is reflexive.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(x) => {
                // 0.0 == -0.0 must hash alike
                let x = if *x == 0.0 { 0.0 } else { *x };
                x.to_bits().hash(state)
            }
            Value::Char(c) => c.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Array(a) => std::ptr::hash(Rc::as_ptr(a), state),
            Value::Record(r) => std::ptr::hash(Rc::as_ptr(r), state),
            Value::Class(c) => std::ptr::hash(Rc::as_ptr(c), state),
            Value::Module(m) => std::ptr::hash(Rc::as_ptr(m), state),
            Value::Function(f) => std::ptr::hash(Rc::as_ptr(f), state),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
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

fn write_number(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        write!(f, "{}", x as i64)
    } else {
        write!(f, "{x}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(x) => write_number(f, *x),
            Value::Char(c) => write!(f, "{c}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(a) => {
                // Nested aggregates are elided so cyclic arrays still print.
                write!(f, "[")?;
                for (i, item) in a.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Array(_) => write!(f, "[...]")?,
                        Value::Record(_) => write!(f, "{{...}}")?,
                        Value::Str(s) => write!(f, "{s:?}")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "]")
            }
            Value::Record(r) => write!(f, "<{} instance>", r.borrow().class().name()),
            Value::Class(c) => write!(f, "<class {}>", c.name()),
            Value::Module(m) => write!(f, "<module {}>", m.name()),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Char(c) => write!(f, "Char({c:?})"),
            other => write!(f, "{}({})", other.type_name(), other),
        }
    }
}
