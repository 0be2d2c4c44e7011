//! # Error Types
//!
//! Error handling for the ADB transport.
//!
//! This module defines every error variant that can surface from the wire
//! codec, the handshake, the dispatch queue and the logical streams built
//! on top of it.
//!
//! ## Error Categories
//! - **Framing**: the transport ended mid-frame (fatal to the connection)
//! - **Handshake**: authentication required, unsupported auth type, rejected
//!   connection, malformed banner (fatal, never retried)
//! - **Stream**: a stream observed closure (end-of-stream) or was used
//!   without being registered (programming error)
//! - **Crypto / Keys**: signing and key-file failures
//!
//! Reconnecting after a fatal error is the caller's job: create a new
//! [`Connection`](crate::protocol::connection::Connection) and drop the old one.
//!
//! ## Example Usage
//! ```rust,no_run
//! use adb_transport::error::{AdbError, Result};
//! use adb_transport::protocol::connection::Connection;
//! use std::io::Read;
//!
//! fn read_banner(connection: &Connection) -> Result<String> {
//!     let mut stream = connection.open("shell:getprop ro.product.model")?;
//!     let mut out = String::new();
//!     stream.read_to_string(&mut out).map_err(AdbError::Io)?;
//!     Ok(out)
//! }
//! ```

use std::io;
use thiserror::Error;

/// Static error strings used on the hot paths.
pub mod constants {
    /// Handshake errors
    pub const ERR_NO_KEYPAIR: &str = "Authentication required but no key pair provided";
    pub const ERR_EMPTY_PUBLIC_KEY: &str = "Device requested a public key but none is loaded";

    /// Banner errors
    pub const ERR_MISSING_FEATURES: &str = "Connect banner has no features key";

    /// Crypto errors
    pub const ERR_MESSAGE_TOO_LARGE: &str = "Padded token is not smaller than the key modulus";

    /// Shell errors
    pub const ERR_SHELL_PACKET_ID: &str = "Invalid shell packet id";
    pub const ERR_SHELL_EXIT_LENGTH: &str = "Shell exit packet does not have payload length 1";
}

/// AdbError is the primary error type for all transport operations
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Unsupported auth type: {0}")]
    UnsupportedAuthType(String),

    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("Invalid connect banner: {0}")]
    InvalidBanner(String),

    #[error("ADB stream is closed for localId: {0:x}")]
    StreamClosed(u32),

    #[error("Not listening for localId: {0:x}")]
    NotListening(u32),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Feature not supported by device: {0}")]
    UnsupportedFeature(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Key error: {0}")]
    Key(String),

    #[error("Shell protocol error: {0}")]
    Shell(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,
}

impl AdbError {
    /// True for conditions a stream reader should treat as end-of-input.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, AdbError::StreamClosed(_) | AdbError::ConnectionClosed)
    }
}

impl From<AdbError> for io::Error {
    fn from(err: AdbError) -> Self {
        match err {
            AdbError::Io(e) => e,
            AdbError::TruncatedFrame { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            AdbError::StreamClosed(_) | AdbError::ConnectionClosed => {
                io::Error::new(io::ErrorKind::BrokenPipe, err)
            }
            other => io::Error::other(other),
        }
    }
}

/// Type alias for Results using AdbError
pub type Result<T> = std::result::Result<T, AdbError>;
