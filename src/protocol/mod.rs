//! Wire protocol spoken to the desktop client over the HTTP tunnel
//!
//! # Response layout
//!
//! - **Response header** (16 bytes): magic `1111`, version `202`, error code, padding
//! - **Session info**: three blocks (host info, protocol version, server version)
//! - **Per statement**: result-set header (32 bytes), then either an error/info block
//!   or the field descriptors followed by the rows, then a separator byte

pub mod codec;
pub mod frame;

pub use codec::{
    block, fixed16, fixed32, read_block, read_cell, read_fixed32, ProtocolError,
    LONG_BLOCK_MARKER, NULL_MARKER, SHORT_BLOCK_MAX,
};
pub use frame::{
    Cell, FieldDescriptor, ResponseHeader, ResultSetHeader, SessionInfo, LAST_RESULT,
    MORE_RESULTS, PROTOCOL_VERSION, RESPONSE_MAGIC,
};

/// The hosting runtime is older than the configured floor.
pub const ERR_UNSUPPORTED_RUNTIME: u32 = 201;
/// Required request fields are missing or malformed.
pub const ERR_INVALID_PARAMETERS: u32 = 202;
/// The binary was built without database client support.
pub const ERR_BACKEND_UNAVAILABLE: u32 = 203;
