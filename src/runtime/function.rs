//! Callable values.
//!
//! Interpreted functions own a slice of bytecode and run in a fresh frame
//! of the executor. Native functions are host closures; they see the
//! interpreter and the frame base of their call and read their arguments
//! (and receiver, for methods) from the operand stack without popping them.

use std::error::Error;
use std::fmt;
use std::rc::{Rc, Weak};

use super::class::Class;
use super::error::RuntimeError;
use super::executor::Interpreter;
use super::module::Module;
use super::value::Value;

pub type NativeResult = Result<Value, Box<dyn Error>>;

/// Host callable: `(interpreter, frame base)`. For a free function the
/// arguments sit at `base..base + arity`; for a method the receiver is at
/// `base` and the arguments follow it.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, usize) -> NativeResult>;

#[derive(Clone)]
pub enum Body {
    Bytecode(Rc<[u8]>),
    Native(NativeFn),
}

pub struct Function {
    name: String,
    arity: usize,
    module: Weak<Module>,
    module_name: String,
    class: Option<Weak<Class>>,
    class_name: Option<String>,
    supermethod: Option<Rc<Function>>,
    body: Body,
}

impl Function {
    /// A module-level function.
    pub fn free(name: &str, arity: usize, module: &Rc<Module>, body: Body) -> Function {
        Function {
            name: name.to_string(),
            arity,
            module: Rc::downgrade(module),
            module_name: module.name().to_string(),
            class: None,
            class_name: None,
            supermethod: None,
            body,
        }
    }

    /// A method of `class`, shadowing `supermethod` if it overrides one.
    pub fn method(
        name: &str,
        arity: usize,
        module: &Rc<Module>,
        class: &Rc<Class>,
        supermethod: Option<Rc<Function>>,
        body: Body,
    ) -> Function {
        Function {
            class: Some(Rc::downgrade(class)),
            class_name: Some(class.name().to_string()),
            supermethod,
            ..Function::free(name, arity, module, body)
        }
    }

    pub fn native<F>(name: &str, arity: usize, module: &Rc<Module>, f: F) -> Function
    where
        F: Fn(&mut Interpreter, usize) -> NativeResult + 'static,
    {
        Function::free(name, arity, module, Body::Native(Rc::new(f)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_method(&self) -> bool {
        self.class_name.is_some()
    }

    pub fn module(&self) -> Option<Rc<Module>> {
        self.module.upgrade()
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn class(&self) -> Option<Rc<Class>> {
        self.class.as_ref().and_then(Weak::upgrade)
    }

    pub fn supermethod(&self) -> Option<&Rc<Function>> {
        self.supermethod.as_ref()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// One line of an error trace.
    pub fn describe(&self) -> String {
        match &self.class_name {
            Some(class) => format!(
                "in module '{}', class '{}', method '{}'.",
                self.module_name, class, self.name
            ),
            None => format!("in module '{}', function '{}'.", self.module_name, self.name),
        }
    }

    pub(crate) fn owning_module(&self) -> Result<Rc<Module>, RuntimeError> {
        self.module().ok_or_else(|| {
            RuntimeError::link(format!("module '{}' is no longer loaded", self.module_name))
        })
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            Body::Bytecode(ref code) => format!("bytecode({} bytes)", code.len()),
            Body::Native(_) => "native".to_string(),
        };
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("module", &self.module_name)
            .field("class", &self.class_name)
            .field("body", &kind)
            .finish()
    }
}
