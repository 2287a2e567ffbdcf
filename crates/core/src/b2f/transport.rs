use crate::{Error, Result};
use bytes::BytesMut;
use log::*;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Carriage return: the line terminator of the B2F dialog.
pub const CR: u8 = 0x0D;

/// Longest command line this endpoint will buffer.
const MAX_LINE: usize = 1024;

/// Framed byte I/O over one connection.
///
/// B2F intermixes CR-terminated ASCII lines with raw binary frames on the
/// same stream, so line reads MUST proceed one byte at a time and never
/// prefetch past the CR: an over-read would swallow the head of the next
/// binary frame.
pub struct LineTransport<T> {
    stream: T,
    read_timeout: Duration,
}

impl<T: AsyncRead + AsyncWrite + Unpin> LineTransport<T> {
    /// Wraps a connected stream with the interactive idle window applied to
    /// line reads.
    pub fn new(stream: T, read_timeout: Duration) -> LineTransport<T> {
        LineTransport {
            stream,
            read_timeout,
        }
    }

    /// Writes all of `data`.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        if !data.is_empty() {
            trace!("sent: <{}>", String::from_utf8_lossy(data).trim_end());
        }
        Ok(())
    }

    /// Reads bytes up to the next CR and returns them as a string, CR
    /// excluded. Returns `None` on idle timeout, or at end of stream with
    /// nothing buffered; a partial line at end of stream is returned as-is.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match timeout(self.read_timeout, self.stream.read(&mut byte)).await {
                Err(_) => {
                    trace!("idle timeout waiting for a line");
                    return Ok(None);
                }
                Ok(Ok(0)) => {
                    if line.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
                Ok(Ok(_)) => {
                    if byte[0] == CR {
                        break;
                    }
                    if line.len() >= MAX_LINE {
                        return Err(Error::Format("line length"));
                    }
                    line.push(byte[0]);
                }
                Ok(Err(e)) => return Err(Error::Transport(e)),
            }
        }
        let line = String::from_utf8_lossy(&line).into_owned();
        trace!("received: <{}>", line);
        Ok(Some(line))
    }

    /// Reads exactly `n` bytes, or fewer if the peer closes first. An idle
    /// timeout mid-fill is an error: a flow-controlled transfer that stalls
    /// cannot be resynchronized.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            match timeout(self.read_timeout, self.stream.read(&mut buf[filled..])).await {
                Err(_) => return Err(Error::Timeout),
                Ok(Ok(0)) => break,
                Ok(Ok(count)) => filled += count,
                Ok(Err(e)) => return Err(Error::Transport(e)),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    /// Accumulates whatever the peer sends until it goes quiet for `idle`
    /// or closes the stream. This is the batch-blob read: the client streams
    /// every accepted payload back to back with no per-message framing on
    /// the stream itself. Returns the bytes together with how the read
    /// stopped, so the caller can tell a stalled peer from one that is done
    /// sending.
    pub async fn read_available(&mut self, idle: Duration) -> Result<(BytesMut, BatchEnd)> {
        let mut data = BytesMut::new();
        loop {
            match timeout(idle, self.stream.read_buf(&mut data)).await {
                Err(_) => return Ok((data, BatchEnd::Idle)),
                Ok(Ok(0)) => return Ok((data, BatchEnd::Closed)),
                Ok(Ok(count)) => trace!("received chunk of {} bytes", count),
                Ok(Err(e)) => return Err(Error::Transport(e)),
            }
        }
    }
}

/// How a batch read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEnd {
    /// The idle window expired with the connection still open.
    Idle,
    /// The peer closed its end of the stream.
    Closed,
}
