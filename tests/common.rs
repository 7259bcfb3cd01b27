//! Common test utilities shared between integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::rc::Rc;

use shark::encoder::{encode_archive, CodeBuilder};
use shark::parser::module::{Archive, ModuleImage};
use shark::parser::opcode::Opcode;
use shark::runtime::{Interpreter, Linker, Module, RuntimeError, Value};

/// Records every image in a fresh linker and returns an interpreter over it.
pub fn load(images: Vec<ModuleImage>) -> Interpreter {
    let linker = Rc::new(Linker::new());
    for image in images {
        linker.record(image);
    }
    Interpreter::new(linker)
}

/// A module `lib` defining `add(x, y)`.
pub fn add_module() -> ModuleImage {
    let mut lib = ModuleImage::new("lib");
    let add = lib.name_constant("add");
    let mut body = CodeBuilder::new();
    body.op_u8(Opcode::Load, 0)
        .op_u8(Opcode::Load, 1)
        .op(Opcode::Add)
        .op(Opcode::Return);
    let mut code = CodeBuilder::new();
    code.function(2, add, &body.finish().unwrap())
        .op(Opcode::End);
    lib.code = code.finish().unwrap();
    lib
}

/// Finishes top-level code: END is appended.
pub fn top_level(mut code: CodeBuilder) -> Vec<u8> {
    code.op(Opcode::End);
    code.finish().unwrap()
}

/// Finishes a function body that returns the value on top of the stack.
pub fn returning(mut code: CodeBuilder) -> Vec<u8> {
    code.op(Opcode::Return);
    code.finish().unwrap()
}

/// Calls the global function `name` of `module` from the host.
pub fn call_global(
    interp: &mut Interpreter,
    module: &Rc<Module>,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let function = module
        .get(name)
        .and_then(|value| value.as_function().cloned())
        .unwrap_or_else(|| panic!("no function '{name}' in module '{}'", module.name()));
    interp.call(&function, None, args)
}

/// Encodes `archive` into `dir/file`.
pub fn write_archive(dir: &Path, file: &str, archive: &Archive) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, encode_archive(archive).unwrap()).unwrap();
    path
}

pub fn numbers(values: &[f64]) -> Vec<Value> {
    values.iter().copied().map(Value::Number).collect()
}
