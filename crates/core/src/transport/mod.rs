//! Byte-stream transport used by the connection loop.
//!
//! The loop only needs four primitives from a stream:
//!
//! - **read a line** bounded by a maximum length,
//! - **read exactly** `n` bytes (request bodies),
//! - **write** a buffer and flush it,
//! - **close**.
//!
//! [`Transport`] captures exactly that. [`tcp::TcpTransport`] implements it
//! over a socket accepted by [`tcp::accept_loop`] (one thread per
//! connection); [`StreamTransport`] implements it over any
//! `BufRead`/`Write` pair, which is how the tests drive the loop in memory.
//! Read/write timeouts are a property of the underlying stream and are not
//! enforced here.
//!
//! [`dial`] is the outbound side: it opens a [`tcp::TcpTransport`] to a
//! remote host.

pub mod dial;
pub mod tcp;

use std::io::{BufRead, Read, Write};

use crate::error::{HttpError, Result};

pub use tcp::TcpTransport;

/// Stream primitives consumed by [`Connection`](crate::Connection).
pub trait Transport: Send {
    /// Read one line with its CR/LF terminator stripped.
    ///
    /// Returns `Ok(None)` on a clean end of stream and
    /// [`HttpError::LineTooLong`] when the line exceeds `max` bytes.
    fn read_line(&mut self, max: usize) -> Result<Option<String>>;

    /// Fill `buf` completely. A short stream is an error.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Write all of `data` and flush.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Release the stream. Further writes may fail.
    fn close(&mut self);
}

/// [`Transport`] over an arbitrary buffered reader and writer.
pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Everything written so far.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead + Send, W: Write + Send> Transport for StreamTransport<R, W> {
    fn read_line(&mut self, max: usize) -> Result<Option<String>> {
        read_bounded_line(&mut self.reader, max)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf)?;
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Read a single `\n`-terminated line of at most `max` bytes (terminator
/// excluded) from `reader`.
pub(crate) fn read_bounded_line<R: BufRead>(reader: &mut R, max: usize) -> Result<Option<String>> {
    let mut buf = Vec::new();
    // Room for the line plus CRLF; anything longer is rejected below.
    let limit = max as u64 + 2;
    let n = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;

    if n == 0 {
        return Ok(None);
    }

    let terminated = buf.last() == Some(&b'\n');
    if terminated {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    if buf.len() > max || (!terminated && n as u64 == limit) {
        return Err(HttpError::LineTooLong { limit: max });
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
