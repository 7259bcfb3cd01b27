//! Archive decoder.
//!
//! An archive is a header naming the main module and the archives it
//! depends on, followed by any number of `[u32 name][module body]` records
//! until end of input. [`ArchiveReader`] streams the records one at a time
//! so the linker can record each module as soon as it is decoded;
//! [`read_archive`] collects everything at once.

pub mod encoding;
pub mod module;
pub mod opcode;
pub mod reader;

use std::io;

use encoding::{CONST_CHAR, CONST_FLOAT, CONST_INTEGER, CONST_STRING, CONST_SYMBOL, IMPORT_ALIAS};
use module::{Archive, ArchiveHeader, Constant, Import, ImportTarget, ModuleImage};
use reader::Reader;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    #[error("invalid UTF-8 in string at byte {0}")]
    InvalidUtf8(usize),
    #[error("unknown constant tag {0}")]
    UnknownConstantTag(u8),
    #[error("character constant has length {0}, expected 1")]
    CharLength(u32),
    #[error("malformed float constant {0:?}")]
    InvalidFloat(String),
    #[error("{0}")]
    Malformed(String),
}

impl DecodeError {
    fn from_io(err: io::Error, pos: usize) -> DecodeError {
        match err.kind() {
            io::ErrorKind::InvalidData => DecodeError::InvalidUtf8(pos),
            _ => DecodeError::UnexpectedEof(pos),
        }
    }
}

/// Runs one reader step, mapping I/O failures to positioned decode errors.
fn step<T>(
    reader: &mut Reader,
    f: impl FnOnce(&mut Reader) -> Result<T, io::Error>,
) -> Result<T, DecodeError> {
    let pos = reader.pos();
    f(reader).map_err(|e| DecodeError::from_io(e, pos))
}

/// Streaming archive decoder.
pub struct ArchiveReader {
    reader: Reader,
    header_read: bool,
}

impl ArchiveReader {
    pub fn new(bytes: Vec<u8>) -> ArchiveReader {
        ArchiveReader {
            reader: Reader::new(bytes),
            header_read: false,
        }
    }

    pub fn read_header(&mut self) -> Result<ArchiveHeader, DecodeError> {
        let main = step(&mut self.reader, Reader::read_short_string)?;
        let count = step(&mut self.reader, Reader::read_u8)?;
        let mut dependencies = Vec::with_capacity(count as usize);
        for _ in 0..count {
            dependencies.push(step(&mut self.reader, Reader::read_short_string)?);
        }
        self.header_read = true;
        Ok(ArchiveHeader { main, dependencies })
    }

    /// Decodes the next module record, or `None` at end of input.
    pub fn next_module(&mut self) -> Result<Option<ModuleImage>, DecodeError> {
        if !self.header_read {
            return Err(DecodeError::Malformed(
                "archive header must be read before modules".to_string(),
            ));
        }
        if self.reader.is_empty() {
            return Ok(None);
        }
        let name = step(&mut self.reader, Reader::read_string)?;
        read_module(&mut self.reader, &name).map(Some)
    }
}

/// Decodes a whole archive held in memory.
pub fn read_archive(bytes: Vec<u8>) -> Result<Archive, DecodeError> {
    let mut archive_reader = ArchiveReader::new(bytes);
    let header = archive_reader.read_header()?;
    let mut modules = Vec::new();
    while let Some(image) = archive_reader.next_module()? {
        modules.push(image);
    }
    Ok(Archive { header, modules })
}

/// Decodes one module body: imports, constant pool and code.
pub fn read_module(reader: &mut Reader, name: &str) -> Result<ModuleImage, DecodeError> {
    let import_count = step(reader, Reader::read_u16)?;
    let mut imports = Vec::with_capacity(import_count as usize);
    for _ in 0..import_count {
        imports.push(read_import(reader)?);
    }

    let constant_count = step(reader, Reader::read_u32)?;
    let mut constants = Vec::new();
    for _ in 0..constant_count {
        constants.push(read_constant(reader)?);
    }

    let code = step(reader, Reader::read_blob)?;
    Ok(ModuleImage {
        name: name.to_string(),
        imports,
        constants,
        code,
    })
}

fn read_import(reader: &mut Reader) -> Result<Import, DecodeError> {
    let path = step(reader, Reader::read_string)?;
    let target = if step(reader, Reader::read_u8)? == IMPORT_ALIAS {
        ImportTarget::Alias(step(reader, Reader::read_string)?)
    } else {
        let count = step(reader, Reader::read_u16)?;
        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            names.push(step(reader, Reader::read_string)?);
        }
        ImportTarget::Names(names)
    };
    Ok(Import { path, target })
}

fn read_constant(reader: &mut Reader) -> Result<Constant, DecodeError> {
    let tag = step(reader, Reader::read_u8)?;
    match tag {
        CONST_INTEGER => Ok(Constant::Integer(step(reader, Reader::read_i32)?)),
        CONST_FLOAT => {
            let text = step(reader, Reader::read_string)?;
            text.trim()
                .parse::<f64>()
                .map(Constant::Float)
                .map_err(|_| DecodeError::InvalidFloat(text))
        }
        CONST_CHAR => {
            let len = step(reader, Reader::read_u32)?;
            if len != 1 {
                return Err(DecodeError::CharLength(len));
            }
            let byte = step(reader, Reader::read_u8)?;
            Ok(Constant::Char(char::from(byte)))
        }
        CONST_STRING => Ok(Constant::Str(step(reader, Reader::read_string)?)),
        CONST_SYMBOL => Ok(Constant::Symbol(step(reader, Reader::read_string)?)),
        other => Err(DecodeError::UnknownConstantTag(other)),
    }
}
