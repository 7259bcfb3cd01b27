use std::rc::Rc;

use byteorder::{ByteOrder, LittleEndian};

use super::class::Class;
use super::error::{ErrorKind, RuntimeError};
use super::function::Function;
use super::module::Module;
use super::value::{ArrayRef, RecordRef};
use crate::parser::DecodeError;

/// State of one activation: a module's top-level code or one call of an
/// interpreted function.
#[derive(Debug)]
pub struct Frame {
    /// Module whose namespace and constant pool the code uses
    pub module: Rc<Module>,
    /// The function being run, `None` for module initialization
    pub function: Option<Rc<Function>>,
    /// Instruction stream
    pub code: Rc<[u8]>,
    /// Offset of the next byte to fetch
    pub pc: usize,
    /// Stack index of local 0 (or of the receiver, for methods)
    pub base: usize,
    /// Class being defined between ENTER_CLASS and EXIT_CLASS
    pub class: Option<Rc<Class>>,
    /// In-progress array literal
    pub array: Option<ArrayRef>,
    /// In-progress table literal
    pub record: Option<RecordRef>,
}

impl Frame {
    pub fn new(
        module: Rc<Module>,
        function: Option<Rc<Function>>,
        code: Rc<[u8]>,
        base: usize,
    ) -> Frame {
        Frame {
            module,
            function,
            code,
            pc: 0,
            base,
            class: None,
            array: None,
            record: None,
        }
    }

    fn truncated(&self) -> RuntimeError {
        DecodeError::UnexpectedEof(self.pc).into()
    }

    pub fn fetch_u8(&mut self) -> Result<u8, RuntimeError> {
        let byte = *self.code.get(self.pc).ok_or_else(|| self.truncated())?;
        self.pc += 1;
        Ok(byte)
    }

    pub fn fetch_u16(&mut self) -> Result<u16, RuntimeError> {
        let bytes = self.fetch_slice(2)?;
        Ok(LittleEndian::read_u16(bytes))
    }

    pub fn fetch_u32(&mut self) -> Result<u32, RuntimeError> {
        let bytes = self.fetch_slice(4)?;
        Ok(LittleEndian::read_u32(bytes))
    }

    pub fn fetch_slice(&mut self, len: usize) -> Result<&[u8], RuntimeError> {
        if self.pc + len > self.code.len() {
            return Err(self.truncated());
        }
        let start = self.pc;
        self.pc += len;
        Ok(&self.code[start..self.pc])
    }

    /// Forward jump relative to the offset operand, which is read here.
    pub fn jump_forward(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pc;
        let offset = self.fetch_u16()? as usize;
        self.pc = operand + offset;
        Ok(())
    }

    pub fn jump_backward(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pc;
        let offset = self.fetch_u16()? as usize;
        self.pc = operand.checked_sub(offset).ok_or_else(|| {
            RuntimeError::from(DecodeError::Malformed(format!(
                "loop offset {offset} jumps before the start of the code"
            )))
        })?;
        Ok(())
    }

    /// Skips an unused jump offset.
    pub fn skip_offset(&mut self) {
        self.pc += 2;
    }

    pub fn name(&mut self) -> Result<Rc<str>, RuntimeError> {
        let idx = self.fetch_u16()?;
        self.module.name_at(idx)
    }

    pub fn local(&mut self) -> Result<usize, RuntimeError> {
        Ok(self.base + self.fetch_u8()? as usize)
    }

    /// Name of the running function for diagnostics.
    pub fn function_name(&self) -> String {
        match &self.function {
            Some(f) => f.name().to_string(),
            None => format!("<module {}>", self.module.name()),
        }
    }

    pub fn array_literal(&self) -> Result<&ArrayRef, RuntimeError> {
        self.array
            .as_ref()
            .ok_or_else(|| ErrorKind::Type("no array literal is open".to_string()).into())
    }

    pub fn record_literal(&self) -> Result<&RecordRef, RuntimeError> {
        self.record
            .as_ref()
            .ok_or_else(|| ErrorKind::Type("no table literal is open".to_string()).into())
    }
}
