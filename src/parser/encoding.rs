//! Binary encoding primitives for the archive format.
//!
//! Integers are fixed-width little-endian. Strings inside module bodies
//! carry a 4-byte length; the archive header uses 1-byte lengths.
//!
//! All functions write directly into a caller-provided `&mut Vec<u8>` buffer.

use byteorder::{LittleEndian, WriteBytesExt};

// ---------------------------------------------------------------------------
// Archive format constants
// ---------------------------------------------------------------------------

// Constant-pool tags
pub const CONST_INTEGER: u8 = 0;
pub const CONST_FLOAT: u8 = 1;
pub const CONST_CHAR: u8 = 2;
pub const CONST_STRING: u8 = 3;
pub const CONST_SYMBOL: u8 = 4;

// Import discriminator: zero means a whole-module alias follows, anything
// else a selective name list.
pub const IMPORT_ALIAS: u8 = 0;
pub const IMPORT_NAMES: u8 = 1;

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

pub fn write_u16(buf: &mut Vec<u8>, value: u16) {
    // Writing into a Vec cannot fail.
    let _ = buf.write_u16::<LittleEndian>(value);
}

pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    let _ = buf.write_u32::<LittleEndian>(value);
}

pub fn write_i32(buf: &mut Vec<u8>, value: i32) {
    let _ = buf.write_i32::<LittleEndian>(value);
}

/// Bytes with a 4-byte length prefix.
pub fn write_blob(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_blob(buf, s.as_bytes());
}

/// String with a 1-byte length prefix. Callers check the length first.
pub fn write_short_string(buf: &mut Vec<u8>, s: &str) {
    buf.push(s.len() as u8);
    buf.extend_from_slice(s.as_bytes());
}
