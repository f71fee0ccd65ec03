//! Binary primitives of the tunnel wire format.
//!
//! All integers are big-endian. Byte strings are written as *blocks*:
//!
//! - length <= 253: `[len: u8][bytes]`
//! - length >= 254: `[0xFE][len: u32 BE][bytes]`
//!
//! `0xFF` never starts a block; row encoding uses it as the null marker.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Largest length that still fits the single-byte block form.
pub const SHORT_BLOCK_MAX: usize = 253;

/// Leading byte of a long-form block.
pub const LONG_BLOCK_MARKER: u8 = 0xFE;

/// Stand-in for a null value inside a row.
pub const NULL_MARKER: u8 = 0xFF;

/// Errors raised while decoding tunnel frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Truncated frame: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Unexpected marker byte 0x{0:02X}")]
    UnexpectedMarker(u8),

    #[error("Bad magic: expected {expected}, got {actual}")]
    BadMagic { expected: u32, actual: u32 },
}

pub fn fixed32(n: u32) -> [u8; 4] {
    n.to_be_bytes()
}

pub fn fixed16(n: u16) -> [u8; 2] {
    n.to_be_bytes()
}

/// Encode a count reported by the driver. Wider values keep their low 32 bits.
#[inline]
pub fn truncate32(n: u64) -> u32 {
    (n & 0xFFFF_FFFF) as u32
}

pub fn put_fixed32(dst: &mut impl BufMut, n: u32) {
    dst.put_u32(n);
}

pub fn put_fixed16(dst: &mut impl BufMut, n: u16) {
    dst.put_u16(n);
}

pub fn put_padding(dst: &mut impl BufMut, count: usize) {
    dst.put_bytes(0, count);
}

/// Append `data` as a block.
pub fn put_block(dst: &mut impl BufMut, data: &[u8]) {
    let len = data.len();
    if len <= SHORT_BLOCK_MAX {
        dst.put_u8(len as u8);
    } else {
        dst.put_u8(LONG_BLOCK_MARKER);
        // Lengths past u32::MAX cannot be represented; the driver never hands us such values.
        dst.put_u32(len as u32);
    }
    dst.put_slice(data);
}

/// Encoded size of a block holding `len` bytes.
pub fn block_len(len: usize) -> usize {
    if len <= SHORT_BLOCK_MAX {
        1 + len
    } else {
        5 + len
    }
}

/// Encode `data` as a standalone block.
pub fn block(data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(block_len(data.len()));
    put_block(&mut buf, data);
    buf.freeze()
}

fn ensure(src: &impl Buf, needed: usize) -> Result<(), ProtocolError> {
    if src.remaining() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            available: src.remaining(),
        });
    }
    Ok(())
}

pub fn read_fixed32(src: &mut impl Buf) -> Result<u32, ProtocolError> {
    ensure(src, 4)?;
    Ok(src.get_u32())
}

pub fn read_fixed16(src: &mut impl Buf) -> Result<u16, ProtocolError> {
    ensure(src, 2)?;
    Ok(src.get_u16())
}

pub fn read_u8(src: &mut impl Buf) -> Result<u8, ProtocolError> {
    ensure(src, 1)?;
    Ok(src.get_u8())
}

pub fn skip(src: &mut impl Buf, count: usize) -> Result<(), ProtocolError> {
    ensure(src, count)?;
    src.advance(count);
    Ok(())
}

fn read_block_body(src: &mut impl Buf, lead: u8) -> Result<Bytes, ProtocolError> {
    let len = match lead {
        LONG_BLOCK_MARKER => read_fixed32(src)? as usize,
        NULL_MARKER => return Err(ProtocolError::UnexpectedMarker(NULL_MARKER)),
        short => short as usize,
    };
    ensure(src, len)?;
    Ok(src.copy_to_bytes(len))
}

/// Decode one block.
pub fn read_block(src: &mut impl Buf) -> Result<Bytes, ProtocolError> {
    let lead = read_u8(src)?;
    read_block_body(src, lead)
}

/// Decode one row value: `None` for the null marker, otherwise the block payload.
pub fn read_cell(src: &mut impl Buf) -> Result<Option<Bytes>, ProtocolError> {
    let lead = read_u8(src)?;
    if lead == NULL_MARKER {
        return Ok(None);
    }
    read_block_body(src, lead).map(Some)
}
