use byteorder::{LittleEndian, ReadBytesExt};
use std::io;

/// Positional cursor over an owned byte buffer. All multi-byte integers
/// in the archive format are little-endian.
pub struct Reader {
    bytes: Vec<u8>,
    pos: usize,
}

impl Reader {
    pub fn new(bytes: Vec<u8>) -> Reader {
        Reader { bytes, pos: 0 }
    }
}

impl Reader {
    // Basic operations --------------------------------------------------------
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, io::Error> {
        if len > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "not enough bytes to read",
            ));
        }
        let vec = self.bytes[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(vec)
    }

    // Read and interpret types ------------------------------------------------

    pub fn read_u8(&mut self) -> Result<u8, io::Error> {
        match self.next() {
            Some(byte) => Ok(byte),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no more bytes to read",
            )),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, io::Error> {
        let mut slice = self.take(2)?;
        slice.read_u16::<LittleEndian>()
    }

    pub fn read_u32(&mut self) -> Result<u32, io::Error> {
        let mut slice = self.take(4)?;
        slice.read_u32::<LittleEndian>()
    }

    pub fn read_i32(&mut self) -> Result<i32, io::Error> {
        let mut slice = self.take(4)?;
        slice.read_i32::<LittleEndian>()
    }

    /// Bytes prefixed by a 4-byte length.
    pub fn read_blob(&mut self) -> Result<Vec<u8>, io::Error> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// UTF-8 string prefixed by a 4-byte length.
    pub fn read_string(&mut self) -> Result<String, io::Error> {
        let bytes = self.read_blob()?;
        into_utf8(bytes)
    }

    /// UTF-8 string prefixed by a 1-byte length, used by the archive header.
    pub fn read_short_string(&mut self) -> Result<String, io::Error> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        into_utf8(bytes)
    }

    fn take(&mut self, len: usize) -> Result<&[u8], io::Error> {
        if len > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "not enough bytes to read",
            ));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.bytes[start..self.pos])
    }
}

fn into_utf8(bytes: Vec<u8>) -> Result<String, io::Error> {
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl Iterator for Reader {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }
}

#[test]
fn test_read_u16() {
    let mut reader = Reader::new(vec![0x34, 0x12, 0xff]);
    assert_eq!(reader.read_u16().unwrap(), 0x1234);
    assert_eq!(reader.pos(), 2);
    assert!(reader.read_u16().is_err());
}

#[test]
fn test_read_u32() {
    let mut reader = Reader::new(vec![0x01, 0x02, 0x03, 0x04]);
    assert_eq!(reader.read_u32().unwrap(), 0x04030201);
    assert!(reader.is_empty());
}

#[test]
fn test_read_i32_negative() {
    let mut reader = Reader::new((-7i32).to_le_bytes().to_vec());
    assert_eq!(reader.read_i32().unwrap(), -7);
}

#[test]
fn test_read_string() {
    let mut bytes = 3u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(b"abc");
    bytes.push(2);
    bytes.extend_from_slice(b"hi");
    let mut reader = Reader::new(bytes);
    assert_eq!(reader.read_string().unwrap(), "abc");
    assert_eq!(reader.read_short_string().unwrap(), "hi");
}

#[test]
fn test_short_read_does_not_advance() {
    let mut bytes = 10u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(b"short");
    let mut reader = Reader::new(bytes);
    let err = reader.read_string().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    assert_eq!(reader.pos(), 4);
}

#[test]
fn test_invalid_utf8() {
    let mut reader = Reader::new(vec![1, 0, 0, 0, 0xff]);
    let err = reader.read_string().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}
