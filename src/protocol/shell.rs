//! Shell v2 protocol on top of [`AdbStream`].
//!
//! Every packet is `[id(1)] [length(4, LE)] [payload(length)]`. The device
//! sends STDOUT, STDERR and a final one-byte EXIT packet; the host sends
//! STDIN and CLOSE_STDIN.

use bytes::{Buf, BufMut};
use std::fmt;
use std::io::{self, Read, Write};

use crate::error::{constants, AdbError, Result};
use crate::protocol::stream::AdbStream;

pub const ID_STDIN: u8 = 0;
pub const ID_STDOUT: u8 = 1;
pub const ID_STDERR: u8 = 2;
pub const ID_EXIT: u8 = 3;
pub const ID_CLOSE_STDIN: u8 = 3;

const PACKET_HEADER_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellPacket {
    StdOut(Vec<u8>),
    StdErr(Vec<u8>),
    Exit(u8),
}

impl fmt::Display for ShellPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellPacket::StdOut(data) => write!(f, "STDOUT: {}", String::from_utf8_lossy(data)),
            ShellPacket::StdErr(data) => write!(f, "STDERR: {}", String::from_utf8_lossy(data)),
            ShellPacket::Exit(code) => write!(f, "EXIT: {code}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellResponse {
    pub output: String,
    pub error_output: String,
    pub exit_code: u8,
}

impl ShellResponse {
    /// stdout followed by stderr.
    pub fn all_output(&self) -> String {
        format!("{}{}", self.output, self.error_output)
    }
}

impl fmt::Display for ShellResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shell response ({}):\n{}", self.exit_code, self.all_output())
    }
}

#[derive(Debug)]
pub struct ShellStream {
    stream: AdbStream,
}

impl ShellStream {
    pub fn new(stream: AdbStream) -> Self {
        Self { stream }
    }

    /// Read one packet.
    ///
    /// # Errors
    /// `AdbError::Shell` for an unknown id or an EXIT packet whose payload is
    /// not exactly one byte; `AdbError::Io` (`UnexpectedEof`) if the stream
    /// ends mid-packet or before EXIT.
    pub fn read_packet(&mut self) -> Result<ShellPacket> {
        let mut header = [0u8; PACKET_HEADER_LEN];
        self.stream.read_exact(&mut header)?;
        let mut cursor = &header[..];
        let id = cursor.get_u8();
        let length = cursor.get_u32_le() as usize;

        match id {
            ID_STDOUT | ID_STDERR => {
                let mut payload = Vec::new();
                (&mut self.stream)
                    .take(length as u64)
                    .read_to_end(&mut payload)?;
                if payload.len() < length {
                    return Err(AdbError::Io(io::ErrorKind::UnexpectedEof.into()));
                }
                Ok(if id == ID_STDOUT {
                    ShellPacket::StdOut(payload)
                } else {
                    ShellPacket::StdErr(payload)
                })
            }
            ID_EXIT => {
                if length != 1 {
                    return Err(AdbError::Shell(format!(
                        "{}: {length}",
                        constants::ERR_SHELL_EXIT_LENGTH
                    )));
                }
                let mut code = [0u8; 1];
                self.stream.read_exact(&mut code)?;
                Ok(ShellPacket::Exit(code[0]))
            }
            other => Err(AdbError::Shell(format!(
                "{}: {other}",
                constants::ERR_SHELL_PACKET_ID
            ))),
        }
    }

    /// Collect stdout and stderr until EXIT.
    pub fn read_all(&mut self) -> Result<ShellResponse> {
        let mut output = Vec::new();
        let mut error_output = Vec::new();
        loop {
            match self.read_packet()? {
                ShellPacket::StdOut(data) => output.extend_from_slice(&data),
                ShellPacket::StdErr(data) => error_output.extend_from_slice(&data),
                ShellPacket::Exit(exit_code) => {
                    return Ok(ShellResponse {
                        output: String::from_utf8_lossy(&output).into_owned(),
                        error_output: String::from_utf8_lossy(&error_output).into_owned(),
                        exit_code,
                    })
                }
            }
        }
    }

    /// Send a packet and flush it as one WRTE (split if it exceeds the max payload).
    pub fn write_packet(&mut self, id: u8, payload: &[u8]) -> Result<()> {
        let mut packet = Vec::with_capacity(PACKET_HEADER_LEN + payload.len());
        packet.put_u8(id);
        packet.put_u32_le(payload.len() as u32);
        packet.extend_from_slice(payload);
        self.stream.write_all(&packet)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn write_stdin(&mut self, data: &[u8]) -> Result<()> {
        self.write_packet(ID_STDIN, data)
    }

    pub fn close_stdin(&mut self) -> Result<()> {
        self.write_packet(ID_CLOSE_STDIN, &[])
    }

    pub fn close(&mut self) -> Result<()> {
        self.stream.close()
    }

    pub fn into_inner(self) -> AdbStream {
        self.stream
    }
}
