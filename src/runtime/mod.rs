//! The shark runtime
//!
//! This module provides the object model (values, records, classes,
//! functions, modules), the linker that loads archives and initializes
//! modules once, and the bytecode interpreter that runs them.
//!
//! Everything here is single-threaded: shared objects are `Rc` and
//! mutation goes through `RefCell`. Separate interpreters may share one
//! [`Linker`] but never an operand stack.

pub mod class;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod frame;
pub mod function;
pub mod linker;
pub mod module;
pub mod ops;
pub mod record;
pub mod stack;
pub mod system;
pub mod test_utils;
pub mod value;

pub use class::{Builtins, Class, Shape};
pub use config::{Config, ConfigBuilder};
pub use driver::{run_archive, RunError};
pub use error::{ErrorKind, RuntimeError};
pub use executor::Interpreter;
pub use function::{Body, Function, NativeFn, NativeResult};
pub use linker::Linker;
pub use module::Module;
pub use record::Record;
pub use value::Value;
