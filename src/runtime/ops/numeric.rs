//! Arithmetic instructions
//!
//! All operands are numbers (IEEE doubles); anything else is a type
//! mismatch. Division by zero follows IEEE and yields an infinity or NaN,
//! and modulo keeps the sign of the dividend.

use super::{RuntimeError, Stack, Value};
use crate::parser::opcode::Arith;

/// Applies an arithmetic operator to two numbers.
pub fn apply(op: Arith, x: f64, y: f64) -> f64 {
    match op {
        Arith::Mul => x * y,
        Arith::Div => x / y,
        Arith::Mod => x % y,
        Arith::Add => x + y,
        Arith::Sub => x - y,
    }
}

/// Combines a stored value with an update operand, as the augmented
/// update instructions do.
pub fn update(op: Arith, current: &Value, operand: &Value) -> Result<Value, RuntimeError> {
    let x = current
        .as_number()
        .ok_or_else(|| RuntimeError::mismatch("number", current.type_name()))?;
    let y = operand
        .as_number()
        .ok_or_else(|| RuntimeError::mismatch("number", operand.type_name()))?;
    Ok(Value::Number(apply(op, x, y)))
}

/// MUL, DIV, MOD, ADD, SUB
/// 1. Pop y
/// 2. Pop x
/// 3. Push x op y
pub fn binary(stack: &mut Stack, op: Arith) -> Result<(), RuntimeError> {
    let y = stack.pop_number()?;
    let x = stack.pop_number()?;
    stack.push(Value::Number(apply(op, x, y)));
    Ok(())
}

/// NEG
pub fn neg(stack: &mut Stack) -> Result<(), RuntimeError> {
    let x = stack.pop_number()?;
    stack.push(Value::Number(-x));
    Ok(())
}

/// ZERO
pub fn zero(stack: &mut Stack) {
    stack.push(Value::Number(0.0));
}

/// INC: add one to the local at `slot` in place.
pub fn inc(stack: &mut Stack, slot: usize) -> Result<(), RuntimeError> {
    let current = stack
        .get(slot)
        .ok_or(crate::runtime::ErrorKind::LocalOutOfRange(slot))?;
    let x = current
        .as_number()
        .ok_or_else(|| RuntimeError::mismatch("number", current.type_name()))?;
    stack.set(slot, Value::Number(x + 1.0))
}
