//! # Core Protocol Components
//!
//! Low-level frame handling and the wire codec.
//!
//! ## Components
//! - **Packet**: the 24-byte-header ADB frame, command tags and checksum
//! - **Codec**: `tokio_util` codec used for buffered framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [command(4)] [arg0(4)] [arg1(4)] [length(4)] [checksum(4)] [magic(4)] [payload(N)]
//! ```
//! All header fields are little-endian `u32`.

pub mod codec;
pub mod packet;
