//! # Transport Layer
//!
//! Byte-level plumbing underneath the dispatch queue.
//!
//! - **reader**: blocking, single-consumer frame reader over any `Read`
//! - **writer**: mutex-guarded frame writer over any `Write`
//! - **tcp**: `TcpStream` transport with connect/socket timeouts
//!
//! Reads and writes are independent: a write may proceed while another
//! thread is blocked reading the next frame.

use std::io;

pub mod reader;
pub mod tcp;
pub mod writer;

/// Tears the underlying transport down so a thread blocked in `read` wakes.
pub trait TransportShutdown: Send + Sync {
    fn shutdown(&self) -> io::Result<()>;
}

impl TransportShutdown for std::net::TcpStream {
    fn shutdown(&self) -> io::Result<()> {
        std::net::TcpStream::shutdown(self, std::net::Shutdown::Both)
    }
}

#[cfg(unix)]
impl TransportShutdown for std::os::unix::net::UnixStream {
    fn shutdown(&self) -> io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, std::net::Shutdown::Both)
    }
}
