//! One buffered cursor over a connection.
//!
//! Control lines and payload blocks are both read through the same
//! `BufReader`, so bytes pulled into the buffer while looking for a newline
//! are still there when the payload is read. Never wrap the stream in a
//! second reader.

use crate::error::{Error, Result};
use crate::protocol::{self, Status, MAX_LINE_LEN};
use crate::transfer::{self, deadline, Wire};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

pub struct Connection<S> {
    stream: BufReader<S>,
    timeout: Option<Duration>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, timeout: Option<Duration>) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
        }
    }

    /// Read one control line with its terminator stripped. `None` on EOF.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let mut limited = (&mut self.stream).take(MAX_LINE_LEN as u64);
        let n = deadline(self.timeout, limited.read_until(b'\n', &mut buf)).await?;

        if n == 0 {
            return Ok(None);
        }
        if buf.last() != Some(&b'\n') && buf.len() >= MAX_LINE_LEN {
            return Err(Error::LineTooLong(MAX_LINE_LEN));
        }

        let line = String::from_utf8(buf).map_err(|_| Error::invalid("control line is not valid UTF-8"))?;
        Ok(Some(protocol::trim_line_ending(&line).to_string()))
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        deadline(self.timeout, self.stream.write_all(bytes)).await?;
        deadline(self.timeout, self.stream.flush()).await
    }

    pub async fn write_response(&mut self, status: Status, message: &str) -> Result<()> {
        self.write_raw(&protocol::encode_response(status, message)).await
    }

    /// Receive exactly `size` payload bytes from the peer into `sink`.
    /// A failing sink yields [`Error::Io`] with the payload fully consumed.
    pub async fn receive_into<W, P>(&mut self, sink: &mut W, size: u64, progress: P) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
        P: FnMut(u64),
    {
        transfer::copy_exact(&mut self.stream, sink, size, Wire::Source, self.timeout, progress).await
    }

    /// Send exactly `size` payload bytes from `source` to the peer
    pub async fn send_from<R, P>(&mut self, source: &mut R, size: u64, progress: P) -> Result<u64>
    where
        R: AsyncRead + Unpin,
        P: FnMut(u64),
    {
        transfer::copy_exact(source, &mut self.stream, size, Wire::Sink, self.timeout, progress).await
    }

    pub async fn discard(&mut self, size: u64) -> Result<u64> {
        transfer::discard_exact(&mut self.stream, size, self.timeout).await
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        deadline(self.timeout, self.stream.shutdown()).await
    }
}
