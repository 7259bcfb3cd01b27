//! Classes and single inheritance.
//!
//! A class's method table is filled when the class is defined: it starts
//! as a copy of the parent's table, and each method defined in the class
//! body replaces the inherited entry while remembering it as its
//! supermethod. Dispatch therefore never walks the parent chain.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::error::{ErrorKind, RuntimeError};
use super::function::Function;
use super::record::Record;
use super::value::Value;

/// The native representation an instance of a class takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Record,
    Array,
    String,
    /// Cannot be instantiated.
    Abstract,
}

pub struct Class {
    name: String,
    parent: Option<Rc<Class>>,
    shape: Shape,
    methods: RefCell<HashMap<String, Rc<Function>>>,
}

impl Class {
    /// A user class. Inherits a copy of the parent's method table.
    pub fn new(name: &str, parent: Option<Rc<Class>>) -> Class {
        let methods = parent
            .as_ref()
            .map(|p| p.methods.borrow().clone())
            .unwrap_or_default();
        Class {
            name: name.to_string(),
            parent,
            shape: Shape::Record,
            methods: RefCell::new(methods),
        }
    }

    /// A root class with a native shape, for host-provided types.
    pub fn builtin(name: &str, shape: Shape) -> Class {
        Class {
            name: name.to_string(),
            parent: None,
            shape,
            methods: RefCell::new(HashMap::new()),
        }
    }

    pub fn new_abstract(name: &str, parent: Option<Rc<Class>>) -> Class {
        Class {
            shape: Shape::Abstract,
            ..Class::new(name, parent)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Class>> {
        self.parent.as_ref()
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn method(&self, name: &str) -> Option<Rc<Function>> {
        self.methods.borrow().get(name).cloned()
    }

    /// Installs a method, returning the entry it replaced.
    pub fn define_method(&self, method: Rc<Function>) -> Option<Rc<Function>> {
        self.methods
            .borrow_mut()
            .insert(method.name().to_string(), method)
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// True when `self` is `other` or descends from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if std::ptr::eq(class, other) {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }

    /// Builds an empty instance of this class's shape.
    pub fn instantiate(self: &Rc<Self>) -> Result<Value, RuntimeError> {
        match self.shape {
            Shape::Record => Ok(Value::record(Record::new(Rc::clone(self)))),
            Shape::Array => Ok(Value::array(Vec::new())),
            Shape::String => Ok(Value::string("")),
            Shape::Abstract => Err(ErrorKind::AbstractClass(self.name.clone()).into()),
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("shape", &self.shape)
            .field("methods", &self.method_names())
            .finish()
    }
}

/// The classes the engine itself relies on: table literals, and the
/// dispatch targets for array and string receivers.
#[derive(Debug, Clone)]
pub struct Builtins {
    pub table: Rc<Class>,
    pub array: Rc<Class>,
    pub string: Rc<Class>,
}

impl Default for Builtins {
    fn default() -> Self {
        Builtins {
            table: Rc::new(Class::builtin("table", Shape::Record)),
            array: Rc::new(Class::builtin("array", Shape::Array)),
            string: Rc::new(Class::builtin("string", Shape::String)),
        }
    }
}
