use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::error::RuntimeError;
use super::function::{Function, NativeResult};
use super::executor::Interpreter;
use super::value::Value;
use crate::parser::module::{Import, ModuleImage};
use crate::parser::DecodeError;

/// Imports and top-level code a module runs once, on first resolution.
#[derive(Debug)]
pub struct PendingCode {
    pub imports: Vec<Import>,
    pub code: Rc<[u8]>,
}

/// A module at runtime: its namespace and constant pool, plus the
/// initialization code until it has run.
pub struct Module {
    name: String,
    namespace: RefCell<HashMap<String, Value>>,
    constants: Vec<Value>,
    pending: RefCell<Option<PendingCode>>,
}

impl Module {
    pub fn from_image(image: ModuleImage) -> Module {
        Module {
            constants: image.constants.iter().map(Value::from_constant).collect(),
            namespace: RefCell::new(HashMap::new()),
            pending: RefCell::new(Some(PendingCode {
                imports: image.imports,
                code: Rc::from(image.code),
            })),
            name: image.name,
        }
    }

    /// An empty module with nothing to initialize, for host-provided
    /// bindings.
    pub fn native(name: &str) -> Module {
        Module {
            name: name.to_string(),
            namespace: RefCell::new(HashMap::new()),
            constants: Vec::new(),
            pending: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.namespace.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.namespace.borrow_mut().insert(name.to_string(), value);
    }

    pub fn bindings(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespace.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn constant(&self, idx: u16) -> Result<&Value, RuntimeError> {
        self.constants.get(idx as usize).ok_or_else(|| {
            DecodeError::Malformed(format!(
                "constant {idx} out of range in module '{}'",
                self.name
            ))
            .into()
        })
    }

    /// A constant used as a name: a global, field, method or class.
    pub fn name_at(&self, idx: u16) -> Result<Rc<str>, RuntimeError> {
        match self.constant(idx)? {
            Value::Str(s) => Ok(Rc::clone(s)),
            other => Err(DecodeError::Malformed(format!(
                "constant {idx} in module '{}' is a {}, not a name",
                self.name,
                other.type_name()
            ))
            .into()),
        }
    }

    /// True once the module no longer holds initialization code.
    pub fn is_initialized(&self) -> bool {
        self.pending.borrow().is_none()
    }

    pub(crate) fn take_pending(&self) -> Option<PendingCode> {
        self.pending.borrow_mut().take()
    }

    /// Binds a native free function in this module.
    pub fn define_native<F>(self: &Rc<Self>, name: &str, arity: usize, f: F)
    where
        F: Fn(&mut Interpreter, usize) -> NativeResult + 'static,
    {
        let function = Function::native(name, arity, self, f);
        self.set(name, Value::Function(Rc::new(function)));
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("bindings", &self.bindings())
            .field("constants", &self.constants.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::Constant;

    #[test]
    fn test_from_image() {
        let mut image = ModuleImage::new("m");
        image.name_constant("x");
        image.add_constant(Constant::Integer(3));
        image.code = vec![0];
        let module = Module::from_image(image);
        assert!(!module.is_initialized());
        assert_eq!(&*module.name_at(0).unwrap(), "x");
        assert!(module.name_at(1).is_err());
        assert!(module.constant(2).is_err());
        let pending = module.take_pending().unwrap();
        assert_eq!(&*pending.code, &[0]);
        assert!(module.is_initialized());
    }

    #[test]
    fn test_define_native() {
        let module = Rc::new(Module::native("sys"));
        module.define_native("id", 1, |interp, base| Ok(interp.argument(base, 0)));
        let f = module.get("id").unwrap();
        assert_eq!(f.as_function().map(|f| f.arity()), Some(1));
        assert!(module.is_initialized());
    }
}
