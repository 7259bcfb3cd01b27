//! Instruction set of the shark virtual machine.
//!
//! Every instruction is one opcode byte followed by zero or more inline
//! operands (little-endian). See [`Opcode::operand_width`] for the fixed
//! operand sizes; FUNCTION additionally carries a length-prefixed body.
//! [`disassemble`] renders an instruction stream as a listing.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

macro_rules! opcodes {
    ($($name:ident = $value:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $value,)*
        }

        impl TryFrom<u8> for Opcode {
            type Error = u8;

            fn try_from(byte: u8) -> Result<Self, Self::Error> {
                match byte {
                    $($value => Ok(Opcode::$name),)*
                    other => Err(other),
                }
            }
        }
    };
}

opcodes! {
    End = 0,
    Null = 1,
    True = 2,
    False = 3,
    LoadGlobal = 4,
    Load = 5,
    GetField = 6,
    EnterClass = 7,
    ExitClass = 8,
    Define = 9,
    DefineField = 10,
    Function = 11,
    NotImplemented = 12,
    Exit = 13,
    Dup = 14,
    Drop = 15,
    Swap = 16,
    Mul = 17,
    Div = 18,
    Mod = 19,
    Add = 20,
    Sub = 21,
    Lt = 22,
    Le = 23,
    Gt = 24,
    Ge = 25,
    Eq = 26,
    Ne = 27,
    In = 28,
    NotIn = 29,
    Neg = 30,
    Not = 31,
    FunctionCall = 32,
    MethodCall = 33,
    GetSlice = 34,
    GetIndex = 35,
    SelfRef = 36,
    SuperCall = 37,
    SizeOf = 38,
    New = 39,
    InstanceOf = 40,
    ArrayNew = 41,
    ArrayNewAppend = 42,
    TableNew = 43,
    TableNewInsert = 44,
    Const = 45,
    Return = 46,
    Insert = 47,
    Append = 48,
    StoreGlobal = 49,
    Store = 50,
    SetStatic = 51,
    SetField = 52,
    SetSlice = 53,
    SetIndex = 54,
    GetFieldTop = 55,
    GetIndexTop = 56,
    GetStatic = 57,
    GetStaticTop = 58,
    If = 59,
    Jump = 60,
    Loop = 61,
    Zero = 62,
    Inc = 63,
    Or = 64,
    And = 65,
    SetIndexAu = 66,
    SetFieldAu = 67,
    SetStaticAu = 68,
    ArrayClose = 69,
    TableClose = 70,
    BitAnd = 71,
    BitOr = 72,
    BitXor = 73,
    Shl = 74,
    Shr = 75,
    BitNot = 76,
}

impl Opcode {
    /// Size in bytes of the fixed operands following the opcode. For
    /// FUNCTION this excludes the body itself.
    pub fn operand_width(self) -> usize {
        use Opcode::*;
        match self {
            Load | Store | Inc | Exit | FunctionCall | New | SetIndexAu => 1,
            LoadGlobal | GetField | EnterClass | Define | DefineField | Const | StoreGlobal
            | SetStatic | SetField | GetFieldTop | GetStatic | GetStaticTop | If | Jump | Loop
            | Or | And => 2,
            MethodCall | SuperCall | SetFieldAu | SetStaticAu => 3,
            Function => 7,
            _ => 0,
        }
    }
}

/// Listing of an instruction stream, one instruction per line with its
/// offset and raw operands. Function bodies are nested under their
/// FUNCTION instruction.
pub struct Disassembly<'a> {
    code: &'a [u8],
}

pub fn disassemble(code: &[u8]) -> Disassembly<'_> {
    Disassembly { code }
}

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_listing(f, self.code, 0)
    }
}

fn write_listing(f: &mut fmt::Formatter<'_>, code: &[u8], indent: usize) -> fmt::Result {
    let mut pc = 0;
    while let Some(&byte) = code.get(pc) {
        let op = match Opcode::try_from(byte) {
            Ok(op) => op,
            Err(_) => return writeln!(f, "{:indent$}{pc:04x}  ?? {}", "", hex::encode(&code[pc..])),
        };
        let end = pc + 1 + op.operand_width();
        let operands = match code.get(pc + 1..end) {
            Some(operands) => operands,
            None => return writeln!(f, "{:indent$}{pc:04x}  {op:?} <truncated>", ""),
        };
        if operands.is_empty() {
            writeln!(f, "{:indent$}{pc:04x}  {op:?}", "")?;
        } else {
            writeln!(f, "{:indent$}{pc:04x}  {op:?} {}", "", hex::encode(operands))?;
        }
        pc = end;

        if op == Opcode::Function {
            let len = LittleEndian::read_u32(&operands[3..]) as usize;
            let body = match pc.checked_add(len).and_then(|body_end| code.get(pc..body_end)) {
                Some(body) => body,
                None => return writeln!(f, "{:indent$}      <truncated body>", ""),
            };
            write_listing(f, body, indent + 4)?;
            pc += len;
        }
    }
    Ok(())
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

/// Arithmetic operator selected by the trailing byte of an augmented
/// update instruction. The byte is the opcode of the plain operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
}

impl Arith {
    pub fn from_byte(byte: u8) -> Option<Arith> {
        match Opcode::try_from(byte).ok()? {
            Opcode::Mul => Some(Arith::Mul),
            Opcode::Div => Some(Arith::Div),
            Opcode::Mod => Some(Arith::Mod),
            Opcode::Add => Some(Arith::Add),
            Opcode::Sub => Some(Arith::Sub),
            _ => None,
        }
    }

    pub fn opcode(self) -> Opcode {
        match self {
            Arith::Mul => Opcode::Mul,
            Arith::Div => Opcode::Div,
            Arith::Mod => Opcode::Mod,
            Arith::Add => Opcode::Add,
            Arith::Sub => Opcode::Sub,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_numbers() {
        assert_eq!(Opcode::try_from(0), Ok(Opcode::End));
        assert_eq!(Opcode::try_from(45), Ok(Opcode::Const));
        assert_eq!(Opcode::try_from(70), Ok(Opcode::TableClose));
        assert_eq!(Opcode::try_from(76), Ok(Opcode::BitNot));
        assert_eq!(Opcode::try_from(77), Err(77));
        assert_eq!(u8::from(Opcode::SetStaticAu), 68);
    }

    #[test]
    fn test_operand_widths() {
        assert_eq!(Opcode::Drop.operand_width(), 0);
        assert_eq!(Opcode::Load.operand_width(), 1);
        assert_eq!(Opcode::Const.operand_width(), 2);
        assert_eq!(Opcode::SetFieldAu.operand_width(), 3);
        assert_eq!(Opcode::Function.operand_width(), 7);
    }

    #[test]
    fn test_disassemble_nests_function_bodies() {
        // FUNCTION arity 1, name 2, body [LOAD 0, RETURN]; END
        let code = [11, 1, 2, 0, 3, 0, 0, 0, 5, 0, 46, 0];
        assert_eq!(
            disassemble(&code).to_string(),
            "0000  Function 01020003000000\n\
             \x20   0000  Load 00\n\
             \x20   0002  Return\n\
             000b  End\n"
        );
    }

    #[test]
    fn test_disassemble_stops_at_bad_bytes() {
        assert_eq!(disassemble(&[14, 200, 1]).to_string(), "0000  Dup\n0001  ?? c801\n");
        assert_eq!(disassemble(&[45, 1]).to_string(), "0000  Const <truncated>\n");
        assert_eq!(
            disassemble(&[11, 0, 0, 0, 9, 0, 0, 0, 1]).to_string(),
            "0000  Function 00000009000000\n      <truncated body>\n"
        );
    }

    #[test]
    fn test_arith_from_byte() {
        assert_eq!(Arith::from_byte(20), Some(Arith::Add));
        assert_eq!(Arith::from_byte(19), Some(Arith::Mod));
        assert_eq!(Arith::from_byte(22), None);
        assert_eq!(Arith::from_byte(200), None);
        assert_eq!(Arith::Sub.opcode(), Opcode::Sub);
    }
}
