//! Synchronised frame writer.
//!
//! One mutex guards header and payload emission so frames from concurrent
//! streams never interleave on the wire. Every frame is flushed before the
//! lock is released.

use std::io::{BufWriter, Write};
use std::sync::{Arc, Mutex};
use tracing::trace;

use crate::config::{CONNECT_MAXDATA, CONNECT_PAYLOAD, CONNECT_VERSION};
use crate::core::packet::{checksum, command, Frame, HEADER_LEN};
use crate::error::{AdbError, Result};
use crate::utils::metrics::Metrics;

pub struct FrameWriter<W: Write> {
    inner: Mutex<Option<BufWriter<W>>>,
    metrics: Arc<Metrics>,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_metrics(inner, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(inner: W, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Mutex::new(Some(BufWriter::new(inner))),
            metrics,
        }
    }

    /// CNXN announcing our version, max payload and the `host::` banner.
    pub fn write_connect(&self) -> Result<()> {
        self.write(
            command::CNXN,
            CONNECT_VERSION,
            CONNECT_MAXDATA,
            Some(CONNECT_PAYLOAD),
        )
    }

    pub fn write_auth(&self, auth_type: u32, payload: &[u8]) -> Result<()> {
        self.write(command::AUTH, auth_type, 0, Some(payload))
    }

    /// OPEN with a NUL-terminated destination.
    pub fn write_open(&self, local_id: u32, destination: &str) -> Result<()> {
        let mut payload = Vec::with_capacity(destination.len() + 1);
        payload.extend_from_slice(destination.as_bytes());
        payload.push(0);
        self.write(command::OPEN, local_id, 0, Some(&payload))
    }

    pub fn write_write(&self, local_id: u32, remote_id: u32, payload: &[u8]) -> Result<()> {
        self.write(command::WRTE, local_id, remote_id, Some(payload))
    }

    pub fn write_close(&self, local_id: u32, remote_id: u32) -> Result<()> {
        self.write(command::CLSE, local_id, remote_id, None)
    }

    pub fn write_okay(&self, local_id: u32, remote_id: u32) -> Result<()> {
        self.write(command::OKAY, local_id, remote_id, None)
    }

    /// Emit one frame. A `None` payload is encoded with length and checksum 0.
    pub fn write(&self, command: u32, arg0: u32, arg1: u32, payload: Option<&[u8]>) -> Result<()> {
        let body = payload.unwrap_or(&[]);
        trace!(
            "> {}",
            Frame::new(command, arg0, arg1, bytes::Bytes::copy_from_slice(body))
        );

        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&command.to_le_bytes());
        header[4..8].copy_from_slice(&arg0.to_le_bytes());
        header[8..12].copy_from_slice(&arg1.to_le_bytes());
        header[12..16].copy_from_slice(&(body.len() as u32).to_le_bytes());
        header[16..20].copy_from_slice(&checksum(body).to_le_bytes());
        header[20..24].copy_from_slice(&(command ^ 0xFFFF_FFFF).to_le_bytes());

        let mut guard = self.inner.lock().map_err(|_| AdbError::LockPoisoned)?;
        let sink = guard.as_mut().ok_or(AdbError::ConnectionClosed)?;
        sink.write_all(&header)?;
        sink.write_all(body)?;
        sink.flush()?;
        drop(guard);

        self.metrics
            .frame_sent(HEADER_LEN as u64 + body.len() as u64);
        Ok(())
    }

    /// Flush and drop the sink. Later writes fail with `ConnectionClosed`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock().map_err(|_| AdbError::LockPoisoned)?;
        if let Some(mut sink) = guard.take() {
            sink.flush()?;
        }
        Ok(())
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}
