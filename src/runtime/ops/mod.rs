//! Opcode implementations
//!
//! The pure stack-to-stack instructions, grouped by family. Instructions
//! that touch frames, modules or calls live in the executor itself.

pub mod access;
pub mod bitwise;
pub mod comparison;
pub mod numeric;

// Re-export commonly used types for operation implementations
pub(crate) use crate::runtime::class::Builtins;
pub(crate) use crate::runtime::stack::Stack;
pub(crate) use crate::runtime::{RuntimeError, Value};
