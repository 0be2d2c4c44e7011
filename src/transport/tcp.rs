//! TCP transport.
//!
//! Splits one `TcpStream` into independent read and write halves plus a
//! shutdown handle, then runs the handshake over them.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::auth::keypair::AdbKeyPair;
use crate::config::ClientConfig;
use crate::error::{AdbError, Result};
use crate::protocol::connection::Connection;
use crate::protocol::handshake;

/// Resolve `address` and connect to the first reachable endpoint.
#[instrument(skip(config), fields(address = %config.address))]
pub fn open_socket(config: &ClientConfig) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = config.address.to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(AdbError::ConfigError(format!(
            "Address resolved to nothing: {}",
            config.address
        )));
    }

    let mut last_err = None;
    for addr in addrs {
        let attempt = if config.connect_timeout.is_zero() {
            TcpStream::connect(addr)
        } else {
            TcpStream::connect_timeout(&addr, config.connect_timeout)
        };
        match attempt {
            Ok(socket) => {
                apply_socket_options(&socket, config.socket_timeout)?;
                debug!(peer = %addr, "TCP transport connected");
                return Ok(socket);
            }
            Err(e) => {
                warn!(peer = %addr, error = %e, "TCP connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err
        .map(AdbError::Io)
        .unwrap_or(AdbError::ConnectionClosed))
}

fn apply_socket_options(socket: &TcpStream, socket_timeout: Duration) -> Result<()> {
    socket.set_nodelay(true)?;
    let timeout = (!socket_timeout.is_zero()).then_some(socket_timeout);
    socket.set_read_timeout(timeout)?;
    socket.set_write_timeout(timeout)?;
    Ok(())
}

/// Connect over TCP and complete the CNXN/AUTH handshake.
pub fn connect_tcp(config: &ClientConfig, keypair: Option<&AdbKeyPair>) -> Result<Connection> {
    let socket = open_socket(config)?;
    let reader = socket.try_clone()?;
    let writer = socket.try_clone()?;
    handshake::connect_with_shutdown(reader, writer, keypair, Some(Box::new(socket)))
}
