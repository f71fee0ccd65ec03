//! Fixed-layout frames built from the codec primitives.

use bytes::{Buf, BufMut, Bytes};

use super::codec::{
    put_block, put_fixed16, put_fixed32, put_padding, read_block, read_fixed16, read_fixed32,
    skip, truncate32, ProtocolError, NULL_MARKER,
};

/// Magic constant opening every response.
pub const RESPONSE_MAGIC: u32 = 1111;

/// Wire protocol version understood by the desktop client.
pub const PROTOCOL_VERSION: u16 = 202;

pub const RESPONSE_HEADER_LEN: usize = 16;
pub const RESULT_SET_HEADER_LEN: usize = 32;

/// Separator written after a statement when more statements follow.
pub const MORE_RESULTS: u8 = 0x01;
/// Separator written after the last statement of a batch.
pub const LAST_RESULT: u8 = 0x00;

/// Leading frame of every response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub error_code: u32,
}

impl ResponseHeader {
    pub fn new(error_code: u32) -> Self {
        Self { error_code }
    }

    pub fn encode(&self, dst: &mut impl BufMut) {
        put_fixed32(dst, RESPONSE_MAGIC);
        put_fixed16(dst, PROTOCOL_VERSION);
        put_fixed32(dst, self.error_code);
        put_padding(dst, 6);
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        let magic = read_fixed32(src)?;
        if magic != RESPONSE_MAGIC {
            return Err(ProtocolError::BadMagic {
                expected: RESPONSE_MAGIC,
                actual: magic,
            });
        }
        let _version = read_fixed16(src)?;
        let error_code = read_fixed32(src)?;
        skip(src, 6)?;
        Ok(Self { error_code })
    }
}

/// Connection details reported for a connection test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Transport description, e.g. `db.local via TCP/IP`.
    pub host_info: String,
    pub protocol_version: String,
    pub server_version: String,
}

impl SessionInfo {
    pub fn encode(&self, dst: &mut impl BufMut) {
        put_block(dst, self.host_info.as_bytes());
        put_block(dst, self.protocol_version.as_bytes());
        put_block(dst, self.server_version.as_bytes());
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        let mut text = || -> Result<String, ProtocolError> {
            Ok(String::from_utf8_lossy(&read_block(src)?).into_owned())
        };
        Ok(Self {
            host_info: text()?,
            protocol_version: text()?,
            server_version: text()?,
        })
    }
}

/// Per-statement summary preceding any field or row data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSetHeader {
    pub error_code: u32,
    pub affected_rows: u64,
    pub insert_id: u64,
    pub field_count: u32,
    pub row_count: u64,
}

impl ResultSetHeader {
    pub fn encode(&self, dst: &mut impl BufMut) {
        put_fixed32(dst, self.error_code);
        put_fixed32(dst, truncate32(self.affected_rows));
        put_fixed32(dst, truncate32(self.insert_id));
        put_fixed32(dst, self.field_count);
        put_fixed32(dst, truncate32(self.row_count));
        put_padding(dst, 12);
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        let header = Self {
            error_code: read_fixed32(src)?,
            affected_rows: read_fixed32(src)? as u64,
            insert_id: read_fixed32(src)? as u64,
            field_count: read_fixed32(src)?,
            row_count: read_fixed32(src)? as u64,
        };
        skip(src, 12)?;
        Ok(header)
    }
}

/// Column metadata as reported by the database driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub table: String,
    /// Driver-native column type code.
    pub type_code: u32,
    /// Driver-native column flag bits.
    pub flags: u32,
    /// Declared column length.
    pub length: u32,
}

impl FieldDescriptor {
    pub fn encode(&self, dst: &mut impl BufMut) {
        put_block(dst, self.name.as_bytes());
        put_block(dst, self.table.as_bytes());
        put_fixed32(dst, self.type_code);
        put_fixed32(dst, self.flags);
        put_fixed32(dst, self.length);
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: String::from_utf8_lossy(&read_block(src)?).into_owned(),
            table: String::from_utf8_lossy(&read_block(src)?).into_owned(),
            type_code: read_fixed32(src)?,
            flags: read_fixed32(src)?,
            length: read_fixed32(src)?,
        })
    }
}

/// Concatenate descriptors in field order.
pub fn encode_fields(fields: &[FieldDescriptor], dst: &mut impl BufMut) {
    for field in fields {
        field.encode(dst);
    }
}

/// One row value, already rendered to the bytes the client displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    Bytes(Bytes),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Bytes(Bytes::from(value.into()))
    }
}

impl From<Option<Vec<u8>>> for Cell {
    fn from(value: Option<Vec<u8>>) -> Self {
        match value {
            Some(bytes) => Cell::Bytes(Bytes::from(bytes)),
            None => Cell::Null,
        }
    }
}

pub fn encode_row(cells: &[Cell], dst: &mut impl BufMut) {
    for cell in cells {
        match cell {
            Cell::Null => dst.put_u8(NULL_MARKER),
            Cell::Bytes(bytes) => put_block(dst, bytes),
        }
    }
}

pub fn encode_separator(more: bool, dst: &mut impl BufMut) {
    dst.put_u8(if more { MORE_RESULTS } else { LAST_RESULT });
}
