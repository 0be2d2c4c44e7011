//! Shared test harness: an in-memory duplex pipe and a scripted device.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use adb_transport::core::packet::{command, Frame};
use adb_transport::protocol::connection::Connection;
use adb_transport::protocol::handshake;
use adb_transport::transport::reader::FrameReader;
use adb_transport::transport::writer::FrameWriter;
use std::io::{self, Read, Write};
use std::sync::mpsc::{channel, Receiver, Sender};

pub const BANNER: &str = "device::features=shell_v2,cmd,abb_exec";

/// Receiving half of a pipe. Reads return 0 once every writer is gone.
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.chunk.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = (self.chunk.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Clone)]
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = channel();
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            chunk: Vec::new(),
            pos: 0,
        },
    )
}

/// The device end of a connection.
pub struct FakeDevice {
    pub reader: FrameReader<PipeReader>,
    pub writer: FrameWriter<PipeWriter>,
    next_remote_id: u32,
}

impl FakeDevice {
    /// Next frame from the host; panics if the host hung up.
    pub fn recv(&mut self) -> Frame {
        self.reader.read_message().expect("host frame")
    }

    /// Next frame from the host, asserting its command.
    pub fn expect(&mut self, cmd: u32) -> Frame {
        let frame = self.recv();
        assert_eq!(
            frame.command,
            cmd,
            "expected {}, got {frame}",
            command::name(cmd)
        );
        frame
    }

    pub fn send(&self, cmd: u32, arg0: u32, arg1: u32, payload: &[u8]) {
        let payload = (!payload.is_empty()).then_some(payload);
        self.writer.write(cmd, arg0, arg1, payload).expect("device write");
    }

    /// Accept the next OPEN. Returns `(host_local_id, device_remote_id, destination)`.
    pub fn accept_open(&mut self) -> (u32, u32, String) {
        let open = self.expect(command::OPEN);
        self.next_remote_id += 1;
        let remote_id = self.next_remote_id;
        self.send(command::OKAY, remote_id, open.arg0, &[]);
        (open.arg0, remote_id, open.payload_str())
    }

    pub fn send_write(&self, remote_id: u32, local_id: u32, payload: &[u8]) {
        self.send(command::WRTE, remote_id, local_id, payload);
    }

    pub fn send_close(&self, remote_id: u32, local_id: u32) {
        self.send(command::CLSE, remote_id, local_id, &[]);
    }
}

/// Host connection and device, with the no-auth handshake already done.
pub fn connected(max_payload: u32) -> (Connection, FakeDevice) {
    connected_with_banner(BANNER, max_payload)
}

/// Host transport halves and the device wired to them.
pub fn device_pair() -> (PipeReader, PipeWriter, FakeDevice) {
    let (host_tx, device_rx) = pipe();
    let (device_tx, host_rx) = pipe();
    let device = FakeDevice {
        reader: FrameReader::new(device_rx),
        writer: FrameWriter::new(device_tx),
        next_remote_id: 0x100,
    };
    (host_rx, host_tx, device)
}

pub fn connected_with_banner(banner: &str, max_payload: u32) -> (Connection, FakeDevice) {
    let (host_rx, host_tx, mut device) = device_pair();

    // The pipe buffers, so the reply can be queued before the host asks.
    device.send(command::CNXN, 0x0100_0000, max_payload, banner.as_bytes());
    let connection = handshake::connect(host_rx, host_tx, None).expect("handshake");
    device.expect(command::CNXN);
    (connection, device)
}

/// Shell v2 packet bytes.
pub fn shell_packet(id: u8, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![id];
    packet.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// Reference frame for assertions.
pub fn frame(cmd: u32, arg0: u32, arg1: u32, payload: &[u8]) -> Frame {
    Frame::new(cmd, arg0, arg1, payload.to_vec())
}
