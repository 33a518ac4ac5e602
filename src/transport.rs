//! Frame reading with a per-frame content deadline.
//!
//! Waiting for the next header is unbounded: an idle but healthy station may
//! stay silent for a long time. Once a header has been accepted, the rest of
//! that frame has to arrive within the configured timeout.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout_at, Instant};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::{Apdu, Iec104Codec};
use crate::error::{Iec104Error, Result};

const READ_BUFFER_CAPACITY: usize = 512;

/// Decodes APDUs from a byte stream.
///
/// `read_frame` is cancel safe: dropping its future between polls loses no
/// bytes and keeps the current deadline.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    codec: Iec104Codec,
    buffer: BytesMut,
    frame_timeout: Duration,
    deadline: Option<Instant>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader.
    pub fn new(inner: R, frame_timeout: Duration) -> Self {
        Self {
            inner,
            codec: Iec104Codec::new(),
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            frame_timeout,
            deadline: None,
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Ok(None)` if the peer closed the stream cleanly between
    /// frames. A close in the middle of a frame is an `UnexpectedEof` error.
    pub async fn read_frame(&mut self) -> Result<Option<Apdu>> {
        loop {
            if let Some(apdu) = self.codec.decode(&mut self.buffer)? {
                self.deadline = None;
                trace!(frame = %apdu, "decoded frame");
                return Ok(Some(apdu));
            }

            if self.codec.is_mid_frame() && self.deadline.is_none() {
                self.deadline = Some(Instant::now() + self.frame_timeout);
            }

            let read = self.inner.read_buf(&mut self.buffer);
            let n = match self.deadline {
                Some(deadline) => timeout_at(deadline, read)
                    .await
                    .map_err(|_| Iec104Error::FrameTimeout)??,
                None => read.await?,
            };

            if n == 0 {
                if self.buffer.is_empty() {
                    debug!("stream closed by peer");
                    return Ok(None);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("stream closed with {} bytes of a frame buffered", self.buffer.len()),
                )
                .into());
            }
        }
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
