//! Operand stack shared by every frame of an interpreter.

use super::error::{ErrorKind, RuntimeError};
use super::value::{ArrayRef, RecordRef, Value};

/// The operand stack. Frames address their locals relative to a base
/// index; nothing below a frame's base belongs to it.
#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Stack {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values
            .pop()
            .ok_or_else(|| ErrorKind::StackUnderflow.into())
    }

    /// Pop a number
    pub fn pop_number(&mut self) -> Result<f64, RuntimeError> {
        let value = self.pop()?;
        value
            .as_number()
            .ok_or_else(|| RuntimeError::mismatch("number", value.type_name()))
    }

    /// Pop a boolean
    pub fn pop_bool(&mut self) -> Result<bool, RuntimeError> {
        let value = self.pop()?;
        value
            .as_bool()
            .ok_or_else(|| RuntimeError::mismatch("bool", value.type_name()))
    }

    pub fn pop_array(&mut self) -> Result<ArrayRef, RuntimeError> {
        match self.pop()? {
            Value::Array(a) => Ok(a),
            other => Err(RuntimeError::mismatch("array", other.type_name())),
        }
    }

    pub fn pop_record(&mut self) -> Result<RecordRef, RuntimeError> {
        match self.pop()? {
            Value::Record(r) => Ok(r),
            other => Err(RuntimeError::mismatch("record", other.type_name())),
        }
    }

    /// Look at the top value without removing it
    pub fn peek(&self) -> Result<&Value, RuntimeError> {
        self.values
            .last()
            .ok_or_else(|| ErrorKind::StackUnderflow.into())
    }

    /// Look `depth` values below the top (0 is the top)
    pub fn peek_at(&self, depth: usize) -> Result<&Value, RuntimeError> {
        self.values
            .len()
            .checked_sub(depth + 1)
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| ErrorKind::StackUnderflow.into())
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn set(&mut self, idx: usize, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .values
            .get_mut(idx)
            .ok_or(ErrorKind::LocalOutOfRange(idx))?;
        *slot = value;
        Ok(())
    }

    pub fn swap_top(&mut self) -> Result<(), RuntimeError> {
        let len = self.values.len();
        if len < 2 {
            return Err(ErrorKind::StackUnderflow.into());
        }
        self.values.swap(len - 1, len - 2);
        Ok(())
    }

    /// Drop everything at and above `len`
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Number of values on the stack
    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Clear the stack
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }
}
