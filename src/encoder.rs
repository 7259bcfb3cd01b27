//! Encodes [`Archive`]s and [`ModuleImage`]s to the shark archive format.
//!
//! This is the inverse of [`crate::parser::read_archive`]. It also provides
//! [`CodeBuilder`], a small instruction emitter used to assemble bytecode
//! by hand (tests, benchmarks, and tools that generate archives).
//!
//! # Binary format overview
//!
//! ```text
//! archive ::= u8 len, main name, u8 count, count × (u8 len, archive name),
//!             { u32 len, module name, module body }*
//! body    ::= u16 imports, import*, u32 constants, constant*, u32 len, code
//! ```
//!
//! # Example
//!
//! ```
//! use shark::encoder::{self, CodeBuilder};
//! use shark::parser::{self, module::{Archive, ModuleImage}, opcode::Opcode};
//!
//! let mut image = ModuleImage::new("main");
//! let mut code = CodeBuilder::new();
//! code.op(Opcode::End);
//! image.code = code.finish().unwrap();
//!
//! let bytes = encoder::encode_archive(&Archive::new("main").with_module(image)).unwrap();
//! let archive = parser::read_archive(bytes).unwrap();
//! assert_eq!(archive.header.main, "main");
//! ```
use crate::parser::encoding::{
    write_blob, write_i32, write_short_string, write_string, write_u16, write_u32, IMPORT_ALIAS,
    IMPORT_NAMES,
};
use crate::parser::module::{Archive, Constant, ImportTarget, ModuleImage};
use crate::parser::opcode::{Arith, Opcode};

// ===========================================================================
// Error type
// ===========================================================================

/// Values the archive format has no room for.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("name {0:?} is longer than 255 bytes")]
    NameTooLong(String),
    #[error("too many {what}: {count}")]
    TooMany { what: &'static str, count: usize },
    #[error("character {0:?} does not fit in one byte")]
    WideChar(char),
    #[error("jump distance {0} does not fit in 16 bits")]
    JumpTooFar(usize),
    #[error("jump label {0} was never placed")]
    UnplacedLabel(usize),
    #[error("jump label {0} does not belong to this builder")]
    UnknownLabel(usize),
    #[error("loop target {target} is ahead of the current position {position}")]
    LoopAhead { target: usize, position: usize },
}

// ===========================================================================
// Public API
// ===========================================================================

pub fn encode_archive(archive: &Archive) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    short_string(&mut buf, &archive.header.main)?;
    let deps = &archive.header.dependencies;
    if deps.len() > u8::MAX as usize {
        return Err(EncodeError::TooMany {
            what: "archive dependencies",
            count: deps.len(),
        });
    }
    buf.push(deps.len() as u8);
    for dep in deps {
        short_string(&mut buf, dep)?;
    }
    for module in &archive.modules {
        string(&mut buf, &module.name)?;
        buf.extend(encode_module(module)?);
    }
    Ok(buf)
}

/// Encodes a module body (everything after the module name).
pub fn encode_module(module: &ModuleImage) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();

    write_u16(&mut buf, count_u16("imports", module.imports.len())?);
    for import in &module.imports {
        string(&mut buf, &import.path)?;
        match &import.target {
            ImportTarget::Alias(alias) => {
                buf.push(IMPORT_ALIAS);
                string(&mut buf, alias)?;
            }
            ImportTarget::Names(names) => {
                buf.push(IMPORT_NAMES);
                write_u16(&mut buf, count_u16("imported names", names.len())?);
                for name in names {
                    string(&mut buf, name)?;
                }
            }
        }
    }

    write_u32(&mut buf, count_u32("constants", module.constants.len())?);
    for constant in &module.constants {
        buf.push(constant.tag());
        match constant {
            Constant::Integer(i) => write_i32(&mut buf, *i),
            Constant::Float(x) => string(&mut buf, &format!("{x:?}"))?,
            Constant::Char(c) => {
                let byte = u8::try_from(u32::from(*c)).map_err(|_| EncodeError::WideChar(*c))?;
                write_blob(&mut buf, &[byte]);
            }
            Constant::Str(s) | Constant::Symbol(s) => string(&mut buf, s)?,
        }
    }

    count_u32("code bytes", module.code.len())?;
    write_blob(&mut buf, &module.code);
    Ok(buf)
}

fn short_string(buf: &mut Vec<u8>, s: &str) -> Result<(), EncodeError> {
    if s.len() > u8::MAX as usize {
        return Err(EncodeError::NameTooLong(s.to_string()));
    }
    write_short_string(buf, s);
    Ok(())
}

/// A string with a 4-byte length prefix.
fn string(buf: &mut Vec<u8>, s: &str) -> Result<(), EncodeError> {
    count_u32("string bytes", s.len())?;
    write_string(buf, s);
    Ok(())
}

fn count_u16(what: &'static str, count: usize) -> Result<u16, EncodeError> {
    u16::try_from(count).map_err(|_| EncodeError::TooMany { what, count })
}

fn count_u32(what: &'static str, count: usize) -> Result<u32, EncodeError> {
    u32::try_from(count).map_err(|_| EncodeError::TooMany { what, count })
}

// ===========================================================================
// Instruction emitter
// ===========================================================================

/// A forward jump whose target is not yet known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Assembles an instruction stream.
///
/// Jump offsets are relative to the offset operand itself: forward jumps
/// (IF, JUMP, OR, AND) land at `operand + offset`, LOOP at
/// `operand - offset`.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
    // operand position per label, and whether it has been placed
    labels: Vec<(usize, bool)>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write position, usable as a LOOP target.
    pub fn position(&self) -> usize {
        self.code.len()
    }

    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.code.push(op.into());
        self
    }

    pub fn op_u8(&mut self, op: Opcode, operand: u8) -> &mut Self {
        self.code.push(op.into());
        self.code.push(operand);
        self
    }

    pub fn op_u16(&mut self, op: Opcode, operand: u16) -> &mut Self {
        self.code.push(op.into());
        write_u16(&mut self.code, operand);
        self
    }

    /// METHOD_CALL / SUPER_CALL.
    pub fn call_named(&mut self, op: Opcode, argc: u8, name: u16) -> &mut Self {
        self.code.push(op.into());
        self.code.push(argc);
        write_u16(&mut self.code, name);
        self
    }

    /// SET_INDEX_AU.
    pub fn update_index(&mut self, arith: Arith) -> &mut Self {
        self.op_u8(Opcode::SetIndexAu, arith.opcode().into())
    }

    /// SET_FIELD_AU / SET_STATIC_AU.
    pub fn update_named(&mut self, op: Opcode, arith: Arith, name: u16) -> &mut Self {
        self.code.push(op.into());
        self.code.push(arith.opcode().into());
        write_u16(&mut self.code, name);
        self
    }

    /// FUNCTION with an inline body.
    pub fn function(&mut self, arity: u8, name: u16, body: &[u8]) -> &mut Self {
        self.code.push(Opcode::Function.into());
        self.code.push(arity);
        write_u16(&mut self.code, name);
        write_blob(&mut self.code, body);
        self
    }

    /// Emits a forward jump (IF, JUMP, OR, AND) to a label placed later.
    pub fn jump(&mut self, op: Opcode) -> Label {
        self.code.push(op.into());
        let operand = self.code.len();
        write_u16(&mut self.code, 0);
        self.labels.push((operand, false));
        Label(self.labels.len() - 1)
    }

    /// Points `label` at the current position.
    pub fn place(&mut self, label: Label) -> Result<&mut Self, EncodeError> {
        let (operand, _) = *self
            .labels
            .get(label.0)
            .ok_or(EncodeError::UnknownLabel(label.0))?;
        let distance = self.code.len() - operand;
        let offset = u16::try_from(distance).map_err(|_| EncodeError::JumpTooFar(distance))?;
        self.code[operand..operand + 2].copy_from_slice(&offset.to_le_bytes());
        self.labels[label.0].1 = true;
        Ok(self)
    }

    /// Emits LOOP back to `target`, a position previously taken from
    /// [`CodeBuilder::position`].
    pub fn loop_to(&mut self, target: usize) -> Result<&mut Self, EncodeError> {
        if target > self.code.len() {
            return Err(EncodeError::LoopAhead {
                target,
                position: self.code.len(),
            });
        }
        self.code.push(Opcode::Loop.into());
        let distance = self.code.len() - target;
        let offset = u16::try_from(distance).map_err(|_| EncodeError::JumpTooFar(distance))?;
        write_u16(&mut self.code, offset);
        Ok(self)
    }

    pub fn finish(self) -> Result<Vec<u8>, EncodeError> {
        if let Some(idx) = self.labels.iter().position(|(_, placed)| !placed) {
            return Err(EncodeError::UnplacedLabel(idx));
        }
        Ok(self.code)
    }
}
