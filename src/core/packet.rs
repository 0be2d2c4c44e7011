//! # Frame
//!
//! The ADB wire unit: a fixed 24-byte little-endian header followed by
//! `payload_length` raw bytes.
//!
//! ```text
//! [command(4)] [arg0(4)] [arg1(4)] [payload_length(4)] [checksum(4)] [magic(4)] [payload(N)]
//! ```
//!
//! `magic` is `command ^ 0xFFFFFFFF` and `checksum` is the wrapping sum of
//! the payload bytes. Neither is verified on decode; the transport is trusted.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::error::{AdbError, Result};

/// Header length in bytes.
pub const HEADER_LEN: usize = 24;

/// Command tags (4 ASCII characters packed little-endian).
pub mod command {
    pub const CNXN: u32 = 0x4e58_4e43;
    pub const AUTH: u32 = 0x4854_5541;
    pub const OPEN: u32 = 0x4e45_504f;
    pub const OKAY: u32 = 0x5941_4b4f;
    pub const CLSE: u32 = 0x4553_4c43;
    pub const WRTE: u32 = 0x4554_5257;

    /// Name of a command tag, `????` when unknown.
    pub fn name(command: u32) -> &'static str {
        match command {
            CNXN => "CNXN",
            AUTH => "AUTH",
            OPEN => "OPEN",
            OKAY => "OKAY",
            CLSE => "CLSE",
            WRTE => "WRTE",
            _ => "????",
        }
    }
}

/// AUTH frame `arg0` values.
pub mod auth_type {
    pub const TOKEN: u32 = 1;
    pub const SIGNATURE: u32 = 2;
    pub const RSA_PUBLIC: u32 = 3;
}

/// A decoded (or to-be-encoded) ADB frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u32,
    pub arg0: u32,
    pub arg1: u32,
    pub payload_length: u32,
    pub checksum: u32,
    pub magic: u32,
    pub payload: Bytes,
}

/// Wrapping sum of the unsigned payload bytes.
#[inline]
pub fn checksum(payload: &[u8]) -> u32 {
    payload
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)))
}

impl Frame {
    /// Build a frame with derived length, checksum and magic.
    pub fn new(command: u32, arg0: u32, arg1: u32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            command,
            arg0,
            arg1,
            payload_length: payload.len() as u32,
            checksum: checksum(&payload),
            magic: command ^ 0xFFFF_FFFF,
            payload,
        }
    }

    /// Name of this frame's command.
    pub fn command_name(&self) -> &'static str {
        command::name(self.command)
    }

    /// Append the encoded header and payload to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_LEN + self.payload.len());
        dst.put_u32_le(self.command);
        dst.put_u32_le(self.arg0);
        dst.put_u32_le(self.arg1);
        dst.put_u32_le(self.payload_length);
        dst.put_u32_le(self.checksum);
        dst.put_u32_le(self.magic);
        dst.put_slice(&self.payload);
    }

    /// Serialize to a standalone buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        self.write_to(&mut buf);
        buf.to_vec()
    }

    /// Deserialize a complete frame from a byte slice.
    ///
    /// # Errors
    /// Returns `AdbError::TruncatedFrame` if `bytes` ends before the header or
    /// the declared payload is complete.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(AdbError::TruncatedFrame {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let mut header = &bytes[..HEADER_LEN];
        let command = header.get_u32_le();
        let arg0 = header.get_u32_le();
        let arg1 = header.get_u32_le();
        let payload_length = header.get_u32_le();
        let checksum = header.get_u32_le();
        let magic = header.get_u32_le();

        let total = HEADER_LEN + payload_length as usize;
        if bytes.len() < total {
            return Err(AdbError::TruncatedFrame {
                expected: total,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            command,
            arg0,
            arg1,
            payload_length,
            checksum,
            magic,
            payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..total]),
        })
    }

    /// Payload interpreted as text, with any trailing NUL bytes removed.
    pub fn payload_str(&self) -> String {
        let end = self
            .payload
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.payload[..end]).into_owned()
    }

    fn payload_summary(&self) -> String {
        if self.payload_length == 0 {
            return String::new();
        }
        match self.command {
            command::AUTH if self.arg0 == auth_type::RSA_PUBLIC => self.payload_str(),
            command::AUTH => format!("auth[{}]", self.payload_length),
            command::WRTE => match self.shell_summary() {
                Some(s) => format!("[shell] {s}"),
                None => format!("payload[{}]", self.payload_length),
            },
            command::OPEN => self.payload_str(),
            _ => format!("payload[{}]", self.payload_length),
        }
    }

    // A WRTE that looks exactly like one shell v2 packet renders its content.
    fn shell_summary(&self) -> Option<String> {
        let mut buf = &self.payload[..];
        if buf.len() < 5 {
            return None;
        }
        let id = buf.get_u8();
        if id > 3 {
            return None;
        }
        let length = buf.get_u32_le() as usize;
        if length != buf.remaining() {
            return None;
        }
        if id == 3 {
            return buf.first().map(|code| format!("EXIT[{code}]"));
        }
        Some(String::from_utf8_lossy(buf).into_owned())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{:X}, {:X}] {}",
            self.command_name(),
            self.arg0,
            self.arg1,
            self.payload_summary()
        )
    }
}
