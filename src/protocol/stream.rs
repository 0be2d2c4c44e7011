//! Logical stream over a shared connection.
//!
//! Reads pull WRTE frames for this stream's id out of the dispatch queue and
//! acknowledge each one with OKAY once its payload has been fully consumed.
//! Writes are buffered up to the negotiated max payload and sent as one WRTE
//! per full buffer or per `flush`.
//!
//! The device's close (CLSE) surfaces as EOF on the read side and as
//! `StreamClosed` on the write side.

use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::core::packet::{command, Frame};
use crate::error::{AdbError, Result};
use crate::protocol::connection::{TransportQueue, TransportWriter};

pub struct AdbStream {
    queue: Arc<TransportQueue>,
    writer: Arc<TransportWriter>,
    max_payload_size: usize,
    local_id: u32,
    remote_id: u32,
    pending: Option<Frame>,
    pending_pos: usize,
    write_buf: Vec<u8>,
    closed: bool,
}

impl std::fmt::Debug for AdbStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdbStream")
            .field("local_id", &format_args!("{:x}", self.local_id))
            .field("remote_id", &format_args!("{:x}", self.remote_id))
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl AdbStream {
    pub(crate) fn new(
        queue: Arc<TransportQueue>,
        writer: Arc<TransportWriter>,
        max_payload_size: usize,
        local_id: u32,
        remote_id: u32,
    ) -> Self {
        Self {
            queue,
            writer,
            max_payload_size: max_payload_size.max(1),
            local_id,
            remote_id,
            pending: None,
            pending_pos: 0,
            write_buf: Vec::new(),
            closed: false,
        }
    }

    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    pub fn remote_id(&self) -> u32 {
        self.remote_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Next WRTE payload chunk, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        match self.queue.take(self.local_id, command::WRTE) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) if e.is_end_of_stream() => {
                debug!(local_id = format_args!("{:x}", self.local_id), "Remote closed stream");
                self.close_quietly();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.closed || !self.queue.is_live(self.local_id)? {
            return Err(AdbError::StreamClosed(self.local_id));
        }
        Ok(())
    }

    fn send_buffer(&mut self) -> Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        if !self.queue.is_live(self.local_id)? {
            self.write_buf.clear();
            return Err(AdbError::StreamClosed(self.local_id));
        }
        self.writer
            .write_write(self.local_id, self.remote_id, &self.write_buf)?;
        self.write_buf.clear();
        // Writes do not wait for the device's OKAY; drop the acks seen so far.
        self.queue.discard(self.local_id, command::OKAY)?;
        Ok(())
    }

    /// Send CLSE and unregister. Only the first call has any effect; pending
    /// buffered writes are sent first.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.pending = None;

        // Buffered bytes for a stream the device already closed are dropped.
        let flushed = match self.send_buffer() {
            Err(AdbError::StreamClosed(_)) => Ok(()),
            other => other,
        };
        let sent = self.writer.write_close(self.local_id, self.remote_id);
        let stopped = self.queue.stop_listening(self.local_id);
        self.writer.metrics().stream_closed();
        trace!(local_id = format_args!("{:x}", self.local_id), "Stream closed");
        flushed.and(sent).and(stopped)
    }

    fn close_quietly(&mut self) {
        if let Err(e) = self.close() {
            debug!(error = %e, "Ignoring close error");
        }
    }
}

impl Read for AdbStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if let Some(frame) = self.pending.as_ref() {
                let remaining = &frame.payload[self.pending_pos..];
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                self.pending_pos += n;

                if self.pending_pos == frame.payload.len() {
                    self.pending = None;
                    self.writer.write_okay(self.local_id, self.remote_id)?;
                }
                if n > 0 {
                    return Ok(n);
                }
                continue;
            }

            match self.next_frame()? {
                Some(frame) => {
                    self.pending = Some(frame);
                    self.pending_pos = 0;
                }
                None => return Ok(0),
            }
        }
    }
}

impl Write for AdbStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_writable()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let room = self.max_payload_size - self.write_buf.len();
        let n = room.min(buf.len());
        self.write_buf.extend_from_slice(&buf[..n]);
        if self.write_buf.len() == self.max_payload_size {
            self.send_buffer()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_writable()?;
        self.send_buffer()?;
        Ok(())
    }
}

impl Drop for AdbStream {
    fn drop(&mut self) {
        self.close_quietly();
    }
}
