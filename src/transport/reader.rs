//! Blocking frame reader.
//!
//! Not internally synchronised: exactly one thread may call
//! [`FrameReader::read_message`] at a time. The dispatch queue enforces that
//! with its single-reader token.

use bytes::BytesMut;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::core::codec::FrameCodec;
use crate::core::packet::{Frame, HEADER_LEN};
use crate::error::{AdbError, Result};
use crate::utils::metrics::Metrics;

const READ_CHUNK: usize = 16 * 1024;

pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    codec: FrameCodec,
    metrics: Arc<Metrics>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_metrics(inner, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(inner: R, metrics: Arc<Metrics>) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            codec: FrameCodec,
            metrics,
        }
    }

    /// Block until one complete frame has been read.
    ///
    /// # Errors
    /// `AdbError::TruncatedFrame` if the source reaches EOF before a full
    /// header and payload arrive; `AdbError::Io` for any other read failure.
    pub fn read_message(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buf)? {
                trace!("< {frame}");
                self.metrics
                    .frame_received(HEADER_LEN as u64 + u64::from(frame.payload_length));
                return Ok(frame);
            }

            let wanted = FrameCodec::pending_len(&self.buf)
                .map_or(READ_CHUNK, |total| (total - self.buf.len()).clamp(1, READ_CHUNK));

            let start = self.buf.len();
            self.buf.resize(start + wanted, 0);
            let read = self.inner.read(&mut self.buf[start..]);
            match read {
                Ok(0) => {
                    self.buf.truncate(start);
                    return Err(AdbError::TruncatedFrame {
                        expected: FrameCodec::pending_len(&self.buf).unwrap_or(HEADER_LEN),
                        actual: self.buf.len(),
                    });
                }
                Ok(n) => self.buf.truncate(start + n),
                Err(e) if e.kind() == ErrorKind::Interrupted => self.buf.truncate(start),
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(AdbError::Io(e));
                }
            }
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
