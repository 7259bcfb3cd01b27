//! Decoded archive contents.
//!
//! These are plain data: nothing here has been linked or executed. The
//! runtime turns a [`ModuleImage`] into a live [`crate::runtime::Module`]
//! when the linker records it.

use super::encoding;
use super::opcode::disassemble;
use std::fmt;

/// The leading section of an archive: the name of the module to run and
/// the other archives that must be loaded first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub main: String,
    pub dependencies: Vec<String>,
}

/// A fully decoded archive.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    pub header: ArchiveHeader,
    pub modules: Vec<ModuleImage>,
}

impl Archive {
    pub fn new(main: &str) -> Archive {
        Archive {
            header: ArchiveHeader {
                main: main.to_string(),
                dependencies: Vec::new(),
            },
            modules: Vec::new(),
        }
    }

    pub fn depends_on(mut self, archive: &str) -> Archive {
        self.header.dependencies.push(archive.to_string());
        self
    }

    pub fn with_module(mut self, module: ModuleImage) -> Archive {
        self.modules.push(module);
        self
    }

    pub fn module(&self, name: &str) -> Option<&ModuleImage> {
        self.modules.iter().find(|m| m.name == name)
    }
}

/// What an import binds in the importing module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// The whole module, bound under one name.
    Alias(String),
    /// Individual bindings copied by name.
    Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub target: ImportTarget,
}

impl Import {
    pub fn alias(path: &str, alias: &str) -> Import {
        Import {
            path: path.to_string(),
            target: ImportTarget::Alias(alias.to_string()),
        }
    }

    pub fn names(path: &str, names: &[&str]) -> Import {
        Import {
            path: path.to_string(),
            target: ImportTarget::Names(names.iter().map(|n| n.to_string()).collect()),
        }
    }
}

/// A constant-pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Integer(i32),
    Float(f64),
    Char(char),
    Str(String),
    Symbol(String),
}

impl Constant {
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Integer(_) => encoding::CONST_INTEGER,
            Constant::Float(_) => encoding::CONST_FLOAT,
            Constant::Char(_) => encoding::CONST_CHAR,
            Constant::Str(_) => encoding::CONST_STRING,
            Constant::Symbol(_) => encoding::CONST_SYMBOL,
        }
    }

    /// Names (globals, fields, methods) are stored as string or symbol
    /// constants.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Constant::Str(s) | Constant::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Integer(i) => write!(f, "int {i}"),
            Constant::Float(x) => write!(f, "float {x}"),
            Constant::Char(c) => write!(f, "char {c:?}"),
            Constant::Str(s) => write!(f, "string {s:?}"),
            Constant::Symbol(s) => write!(f, "symbol {s}"),
        }
    }
}

/// One compiled module as it appears in an archive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleImage {
    pub name: String,
    pub imports: Vec<Import>,
    pub constants: Vec<Constant>,
    pub code: Vec<u8>,
}

impl ModuleImage {
    pub fn new(name: &str) -> ModuleImage {
        ModuleImage {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Appends a constant and returns its pool index, reusing an equal
    /// entry when one already exists.
    pub fn add_constant(&mut self, constant: Constant) -> u16 {
        if let Some(idx) = self.constants.iter().position(|c| *c == constant) {
            return idx as u16;
        }
        self.constants.push(constant);
        (self.constants.len() - 1) as u16
    }

    pub fn name_constant(&mut self, name: &str) -> u16 {
        self.add_constant(Constant::Str(name.to_string()))
    }
}

impl fmt::Display for ModuleImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for import in &self.imports {
            match &import.target {
                ImportTarget::Alias(alias) => writeln!(f, "  import {} as {}", import.path, alias)?,
                ImportTarget::Names(names) => {
                    writeln!(f, "  from {} import {}", import.path, names.join(", "))?
                }
            }
        }
        for (idx, constant) in self.constants.iter().enumerate() {
            writeln!(f, "  const[{idx}] {constant}")?;
        }
        writeln!(f, "  code ({} bytes) {}", self.code.len(), hex::encode(&self.code))?;
        for line in disassemble(&self.code).to_string().lines() {
            writeln!(f, "    {line}")?;
        }
        Ok(())
    }
}
