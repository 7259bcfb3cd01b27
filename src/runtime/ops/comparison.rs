//! Comparison and logic instructions

use super::{RuntimeError, Stack, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Lt,
    Le,
    Gt,
    Ge,
}

/// LT, LE, GT, GE on numbers.
pub fn compare(stack: &mut Stack, op: Ordering) -> Result<(), RuntimeError> {
    let y = stack.pop_number()?;
    let x = stack.pop_number()?;
    let result = match op {
        Ordering::Lt => x < y,
        Ordering::Le => x <= y,
        Ordering::Gt => x > y,
        Ordering::Ge => x >= y,
    };
    stack.push(Value::Bool(result));
    Ok(())
}

/// EQ and NE. Any two values may be compared.
pub fn equals(stack: &mut Stack, negate: bool) -> Result<(), RuntimeError> {
    let y = stack.pop()?;
    let x = stack.pop()?;
    stack.push(Value::Bool((x == y) != negate));
    Ok(())
}

/// IN and NOT_IN: key membership in a record.
/// 1. Pop the record
/// 2. Pop the key
pub fn contains(stack: &mut Stack, negate: bool) -> Result<(), RuntimeError> {
    let record = stack.pop_record()?;
    let key = stack.pop()?;
    let found = record.borrow().contains(&key);
    stack.push(Value::Bool(found != negate));
    Ok(())
}

/// NOT
pub fn not(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_bool()?;
    stack.push(Value::Bool(!b));
    Ok(())
}
