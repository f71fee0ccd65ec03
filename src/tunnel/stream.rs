//! Writes framed units to the output as soon as they are produced.

use std::io::{self, Write};

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::protocol::codec::put_block;
use crate::protocol::frame::{encode_fields, encode_row, encode_separator};
use crate::protocol::{Cell, FieldDescriptor, ResponseHeader, ResultSetHeader, SessionInfo};

/// Frames protocol units onto a writer, flushing after each one.
///
/// At most one unit (a header, the field list, or a single row) is held in memory.
pub struct ResponseWriter<W: Write> {
    out: W,
    frame: BytesMut,
    bytes_written: u64,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frame: BytesMut::with_capacity(256),
            bytes_written: 0,
        }
    }

    pub fn header(&mut self, error_code: u32) -> io::Result<()> {
        ResponseHeader::new(error_code).encode(&mut self.frame);
        self.emit()
    }

    /// A single block, used for error and informational text.
    pub fn block(&mut self, data: &[u8]) -> io::Result<()> {
        put_block(&mut self.frame, data);
        self.emit()
    }

    /// Header carrying `error_code`, followed by its descriptive block.
    pub fn failure(&mut self, error_code: u32, message: &str) -> io::Result<()> {
        ResponseHeader::new(error_code).encode(&mut self.frame);
        put_block(&mut self.frame, message.as_bytes());
        self.emit()
    }

    pub fn session_info(&mut self, info: &SessionInfo) -> io::Result<()> {
        info.encode(&mut self.frame);
        self.emit()
    }

    pub fn result_set_header(&mut self, header: &ResultSetHeader) -> io::Result<()> {
        header.encode(&mut self.frame);
        self.emit()
    }

    pub fn fields(&mut self, fields: &[FieldDescriptor]) -> io::Result<()> {
        encode_fields(fields, &mut self.frame);
        self.emit()
    }

    pub fn row(&mut self, cells: &[Cell]) -> io::Result<()> {
        encode_row(cells, &mut self.frame);
        self.emit()
    }

    pub fn separator(&mut self, more: bool) -> io::Result<()> {
        encode_separator(more, &mut self.frame);
        self.emit()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self) -> io::Result<()> {
        let result = self
            .out
            .write_all(&self.frame)
            .and_then(|_| self.out.flush());
        self.bytes_written += self.frame.len() as u64;
        self.frame.clear();
        result
    }
}

/// `Write` adapter feeding an HTTP body from a blocking worker.
///
/// Bytes accumulate until `flush`, which hands them to the receiving side as one chunk.
/// Must not be used from inside the async runtime: `flush` blocks on a full channel.
pub struct ChannelWriter {
    tx: mpsc::Sender<Bytes>,
    pending: BytesMut,
}

impl ChannelWriter {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            pending: BytesMut::new(),
        }
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = self.pending.split().freeze();
        self.tx
            .blocking_send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body receiver dropped"))
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
