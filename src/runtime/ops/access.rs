//! Container, field and module access
//!
//! Indexing is polymorphic over arrays (integral, in-range number index)
//! and records (any key). Fields are record entries keyed by name; statics
//! are bindings in a module's namespace.

use std::rc::Rc;

use super::{Builtins, RuntimeError, Stack, Value};
use crate::runtime::value::ArrayRef;

fn array_index(index: &Value, len: usize) -> Result<usize, RuntimeError> {
    let x = index
        .as_number()
        .ok_or_else(|| RuntimeError::mismatch("number", index.type_name()))?;
    if x.fract() != 0.0 || x < 0.0 || x >= len as f64 {
        return Err(RuntimeError::type_error(format!(
            "array index {} out of range for length {len}",
            index
        )));
    }
    Ok(x as usize)
}

/// Reads `target[index]`.
pub fn index_get(target: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match target {
        Value::Array(items) => {
            let items = items.borrow();
            let i = array_index(index, items.len())?;
            Ok(items[i].clone())
        }
        Value::Record(record) => Ok(record.borrow().get(index)),
        other => Err(RuntimeError::type_error(format!(
            "can't get index {index} of {}",
            other.type_name()
        ))),
    }
}

/// Writes `target[index] = value`.
pub fn index_set(target: &Value, index: Value, value: Value) -> Result<(), RuntimeError> {
    match target {
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            let i = array_index(&index, items.len())?;
            items[i] = value;
            Ok(())
        }
        Value::Record(record) => {
            record.borrow_mut().set(index, value);
            Ok(())
        }
        other => Err(RuntimeError::type_error(format!(
            "can't set index {index} of {}",
            other.type_name()
        ))),
    }
}

/// GET_INDEX: pop index, pop target, push the element.
pub fn get_index(stack: &mut Stack) -> Result<(), RuntimeError> {
    let index = stack.pop()?;
    let target = stack.pop()?;
    stack.push(index_get(&target, &index)?);
    Ok(())
}

/// GET_INDEX_TOP: like GET_INDEX but leaves target and index in place.
pub fn get_index_top(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = index_get(stack.peek_at(1)?, stack.peek_at(0)?)?;
    stack.push(value);
    Ok(())
}

/// SET_INDEX: pop value, index and target.
pub fn set_index(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    let index = stack.pop()?;
    let target = stack.pop()?;
    index_set(&target, index, value)
}

/// Reads a named field of a record; absent fields are null.
pub fn field_get(target: &Value, name: &Rc<str>) -> Result<Value, RuntimeError> {
    let record = target
        .as_record()
        .ok_or_else(|| RuntimeError::mismatch("record", target.type_name()))?;
    let value = record.borrow().get(&Value::Str(Rc::clone(name)));
    Ok(value)
}

pub fn field_set(target: &Value, name: &Rc<str>, value: Value) -> Result<(), RuntimeError> {
    let record = target
        .as_record()
        .ok_or_else(|| RuntimeError::mismatch("record", target.type_name()))?;
    record.borrow_mut().set(Value::Str(Rc::clone(name)), value);
    Ok(())
}

/// Reads a binding from a module value. Unknown names are link errors.
pub fn static_get(target: &Value, name: &str) -> Result<Value, RuntimeError> {
    match target {
        Value::Module(module) => module.get(name).ok_or_else(|| {
            RuntimeError::link(format!(
                "module '{}' has no binding '{name}'",
                module.name()
            ))
        }),
        other => Err(RuntimeError::mismatch("module", other.type_name())),
    }
}

pub fn static_set(target: &Value, name: &str, value: Value) -> Result<(), RuntimeError> {
    match target {
        Value::Module(module) => {
            module.set(name, value);
            Ok(())
        }
        other => Err(RuntimeError::mismatch("module", other.type_name())),
    }
}

/// APPEND: pop value, pop array, push value onto the array.
pub fn append(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    let array = stack.pop_array()?;
    array.borrow_mut().push(value);
    Ok(())
}

/// INSERT: pop value, index and array; insert at index (0..=len).
pub fn insert(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    let index = stack.pop()?;
    let array = stack.pop_array()?;
    insert_at(&array, &index, value)
}

fn insert_at(array: &ArrayRef, index: &Value, value: Value) -> Result<(), RuntimeError> {
    let mut items = array.borrow_mut();
    let i = array_index(index, items.len() + 1)?;
    items.insert(i, value);
    Ok(())
}

/// SIZEOF: array length, string length in characters, record entry count.
pub fn size_of(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    let size = match &value {
        Value::Array(items) => items.borrow().len(),
        Value::Str(s) => s.chars().count(),
        Value::Record(record) => record.borrow().len(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "can't get the size of {}",
                other.type_name()
            )))
        }
    };
    stack.push(Value::Number(size as f64));
    Ok(())
}

/// INSTANCEOF: pop class, pop value.
pub fn instance_of(stack: &mut Stack, builtins: &Builtins) -> Result<(), RuntimeError> {
    let class = match stack.pop()? {
        Value::Class(class) => class,
        other => return Err(RuntimeError::mismatch("class", other.type_name())),
    };
    let value = stack.pop()?;
    let own = value.class(builtins).ok_or_else(|| {
        RuntimeError::type_error(format!("{} values have no class", value.type_name()))
    })?;
    stack.push(Value::Bool(own.is_subclass_of(&class)));
    Ok(())
}
