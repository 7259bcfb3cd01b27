//! Bitwise instructions
//!
//! Operands are numbers truncated to a signed 32-bit integer (`as i32`:
//! saturating, NaN becomes 0). Shift counts use their low five bits and
//! right shifts are arithmetic. Results are converted back to numbers.

use super::{RuntimeError, Stack, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

pub fn truncate(x: f64) -> i32 {
    x as i32
}

fn apply(op: BitOp, a: i32, b: i32) -> i32 {
    match op {
        BitOp::And => a & b,
        BitOp::Or => a | b,
        BitOp::Xor => a ^ b,
        BitOp::Shl => a.wrapping_shl(b as u32),
        BitOp::Shr => a.wrapping_shr(b as u32),
    }
}

/// BAND, BOR, BXOR, BSHL, BSHR
pub fn binary(stack: &mut Stack, op: BitOp) -> Result<(), RuntimeError> {
    let b = truncate(stack.pop_number()?);
    let a = truncate(stack.pop_number()?);
    stack.push(Value::Number(f64::from(apply(op, a, b))));
    Ok(())
}

/// BNOT
pub fn not(stack: &mut Stack) -> Result<(), RuntimeError> {
    let a = truncate(stack.pop_number()?);
    stack.push(Value::Number(f64::from(!a)));
    Ok(())
}
