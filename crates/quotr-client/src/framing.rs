//! Exact-read response framing
//!
//! The wire format has no length prefix; how many bytes a response occupies
//! only becomes known while decoding it. [`FrameReader`] drives the protocol
//! decoder against an accumulation buffer: each decode attempt either
//! completes or reports the exact shortfall, and the reader then performs one
//! `read_exact` of precisely that many bytes. It never reads past the end of
//! the current response, so the stream position stays aligned with the FIFO
//! request order.

use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use quotr_protocol::{decode_response, Decoded, RequestType, Response, ValueSize};
use tokio::io::{AsyncRead, AsyncReadExt};

pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read exactly one response for `op` from the stream.
    ///
    /// A clean EOF mid-response surfaces as [`Error::ConnectionClosed`]. A
    /// decode error means the stream position is no longer trustworthy and
    /// the connection must be torn down.
    pub async fn next_response(&mut self, op: RequestType, size: ValueSize) -> Result<Response> {
        loop {
            match decode_response(&self.buf, op, size)? {
                Decoded::Complete { response, consumed } => {
                    self.buf.advance(consumed);
                    return Ok(response);
                }
                Decoded::Incomplete { needed } => self.fill(needed).await?,
            }
        }
    }

    async fn fill(&mut self, needed: usize) -> Result<()> {
        let start = self.buf.len();
        self.buf.resize(start + needed, 0);
        if let Err(err) = self.inner.read_exact(&mut self.buf[start..]).await {
            self.buf.truncate(start);
            return Err(match err.kind() {
                std::io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
                _ => Error::IoError(err),
            });
        }
        Ok(())
    }
}
