//! # adb-transport
//!
//! Client side of the ADB wire protocol: framing, RSA authentication, and
//! many logical streams multiplexed over one blocking transport.
//!
//! ## Layers
//! - [`core`](crate::core): the 24-byte-header [`Frame`] and its codec
//! - [`transport`]: blocking frame reader, synchronised frame writer, TCP
//! - [`auth`]: host key pair and device-format public key
//! - [`protocol`]: handshake, dispatch queue, connection, streams, shell v2
//! - [`client`]: cached connection that reconnects when closed
//!
//! ## Quick start
//! ```rust,no_run
//! use adb_transport::{AdbKeyPair, ClientConfig, connect_tcp};
//! use std::io::Read;
//!
//! # fn main() -> adb_transport::Result<()> {
//! let keypair = AdbKeyPair::read_default()?;
//! let connection = connect_tcp(&ClientConfig::for_address("127.0.0.1:5555"), Some(&keypair))?;
//!
//! let mut stream = connection.open("shell:echo hello")?;
//! let mut out = String::new();
//! stream.read_to_string(&mut out)?;
//! assert_eq!(out.trim(), "hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//! A [`Connection`] is `Send + Sync`. Any number of threads may open and use
//! streams concurrently; whichever blocked reader gets there first performs
//! the physical read for everyone.

pub mod auth;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use auth::{AdbKeyPair, AdbPublicKey};
pub use client::AdbClient;
pub use config::{AdbConfig, ClientConfig};
pub use self::core::codec::FrameCodec;
pub use self::core::packet::Frame;
pub use error::{AdbError, Result};
pub use protocol::connection::Connection;
pub use protocol::handshake::{connect, connect_with_shutdown};
pub use protocol::shell::{ShellPacket, ShellResponse, ShellStream};
pub use protocol::stream::AdbStream;
pub use transport::tcp::connect_tcp;
