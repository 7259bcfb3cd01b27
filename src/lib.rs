//! A bytecode virtual machine and module linker for the shark language.
//!
//! shark programs are compiled ahead of time into archives: a header naming
//! the main module and the archives it depends on, followed by compiled
//! modules (imports, a constant pool, and bytecode). This crate reads
//! archives, links modules on demand, and interprets their bytecode.
//!
//! # Modules
//!
//! - [`parser`] -- Archive decoder. Reads archive bytes into [`parser::module::ModuleImage`]s.
//! - [`encoder`] -- Archive encoder and a bytecode assembler ([`encoder::CodeBuilder`]).
//! - [`runtime`] -- Object model, linker, interpreter, and the process driver.
//!
//! # Example
//!
//! Assemble a module defining `add(x, y)`, initialize it, call the function
//! from the host, and read the result:
//!
//! ```
//! use std::rc::Rc;
//! use shark::encoder::CodeBuilder;
//! use shark::parser::module::ModuleImage;
//! use shark::parser::opcode::Opcode;
//! use shark::runtime::{Interpreter, Linker, Value};
//!
//! let mut lib = ModuleImage::new("lib");
//! let add = lib.name_constant("add");
//! let mut body = CodeBuilder::new();
//! body.op_u8(Opcode::Load, 0).op_u8(Opcode::Load, 1).op(Opcode::Add).op(Opcode::Return);
//! let mut code = CodeBuilder::new();
//! code.function(2, add, &body.finish().unwrap()).op(Opcode::End);
//! lib.code = code.finish().unwrap();
//!
//! let linker = Rc::new(Linker::new());
//! linker.record(lib);
//! let mut interp = Interpreter::new(Rc::clone(&linker));
//! let module = interp.import("lib").unwrap();
//! let add = module.get("add").unwrap();
//! let sum = interp
//!     .call(add.as_function().unwrap(), None, vec![Value::Number(2.0), Value::Number(3.0)])
//!     .unwrap();
//! assert_eq!(sum, Value::Number(5.0));
//! ```

pub mod encoder;
pub mod parser;
pub mod runtime;
