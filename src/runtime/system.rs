//! The `system` native module: process exit and user-raised errors.

use std::rc::Rc;

use super::error::RuntimeError;
use super::module::Module;
use super::value::Value;

pub const MODULE_NAME: &str = "system";

/// Builds the module. `exit(code)` unwinds with the exit signal;
/// `error(message)` raises a runtime error carrying the message.
pub fn module() -> Rc<Module> {
    let module = Rc::new(Module::native(MODULE_NAME));

    module.define_native("exit", 1, |interp, base| {
        let code = match interp.argument(base, 0) {
            Value::Number(x) => x as i32,
            other => return Err(RuntimeError::mismatch("number", other.type_name()).into()),
        };
        Err(RuntimeError::exit(code).into())
    });

    module.define_native("error", 1, |interp, base| {
        let message = interp.argument(base, 0).to_string();
        Err(RuntimeError::raise(message).into())
    });

    module
}
