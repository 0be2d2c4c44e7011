//! # Reconnecting client
//!
//! Caches one [`Connection`] and replaces it when it has been closed, either
//! locally or because the transport failed. Nothing is retried inside a
//! call: a failed `open` surfaces its error and only the next call
//! reconnects.
//!
//! ```rust,no_run
//! use adb_transport::client::AdbClient;
//! use adb_transport::config::AdbConfig;
//!
//! # fn main() -> adb_transport::error::Result<()> {
//! let client = AdbClient::from_config(&AdbConfig::from_env()?)?;
//! let response = client.shell("getprop ro.build.version.sdk")?;
//! println!("{}", response.output.trim());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::auth::keypair::AdbKeyPair;
use crate::config::{AdbConfig, ClientConfig};
use crate::error::{AdbError, Result};
use crate::protocol::connection::Connection;
use crate::protocol::shell::{ShellResponse, ShellStream};
use crate::protocol::stream::AdbStream;
use crate::transport::tcp;

type Connector = dyn Fn() -> Result<Connection> + Send + Sync;

pub struct AdbClient {
    target: String,
    connector: Box<Connector>,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl fmt::Debug for AdbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdbClient")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl AdbClient {
    /// TCP client for `config.address`, authenticating with `keypair` if given.
    pub fn new(config: ClientConfig, keypair: Option<AdbKeyPair>) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(AdbError::ConfigError(errors.join("; ")));
        }
        let target = config.address.clone();
        Ok(Self::with_connector(target, move || {
            tcp::connect_tcp(&config, keypair.as_ref())
        }))
    }

    /// Validate `config`, load (or generate) the key pair it names and build
    /// a TCP client.
    pub fn from_config(config: &AdbConfig) -> Result<Self> {
        config.validate_strict()?;
        let keypair = AdbKeyPair::from_config(&config.auth)?;
        Self::new(config.client.clone(), Some(keypair))
    }

    /// Client over any transport; `connector` runs a full handshake each time
    /// a new connection is needed.
    pub fn with_connector<F>(target: impl Into<String>, connector: F) -> Self
    where
        F: Fn() -> Result<Connection> + Send + Sync + 'static,
    {
        Self {
            target: target.into(),
            connector: Box::new(connector),
            connection: Mutex::new(None),
        }
    }

    /// The cached connection, or a new one if there is none or it is closed.
    pub fn connection(&self) -> Result<Arc<Connection>> {
        let mut cached = self.connection.lock().map_err(|_| AdbError::LockPoisoned)?;
        if let Some(connection) = cached.as_ref().filter(|c| !c.is_closed()) {
            return Ok(Arc::clone(connection));
        }
        if cached.is_some() {
            debug!(target = %self.target, "Cached connection is closed, reconnecting");
        }

        let connection = Arc::new((self.connector)()?);
        info!(target = %self.target, banner = connection.banner().raw(), "Connection established");
        *cached = Some(Arc::clone(&connection));
        Ok(connection)
    }

    pub fn open(&self, destination: &str) -> Result<AdbStream> {
        self.connection()?.open(destination)
    }

    pub fn open_shell(&self, command: &str) -> Result<ShellStream> {
        self.connection()?.open_shell(command)
    }

    pub fn shell(&self, command: &str) -> Result<ShellResponse> {
        self.connection()?.shell(command)
    }

    pub fn supports_feature(&self, feature: &str) -> Result<bool> {
        Ok(self.connection()?.supports_feature(feature))
    }

    /// Close the cached connection, if any. The next call reconnects.
    pub fn close(&self) -> Result<()> {
        let cached = self
            .connection
            .lock()
            .map_err(|_| AdbError::LockPoisoned)?
            .take();
        match cached {
            Some(connection) => connection.close(),
            None => Ok(()),
        }
    }
}

impl fmt::Display for AdbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::packet::{command, Frame};
    use crate::protocol::handshake;
    use std::io::{self, Cursor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_client() -> (AdbClient, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let client = AdbClient::with_connector("in-memory", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let cnxn = Frame::new(command::CNXN, 0x0100_0000, 4096, &b"device::features=cmd"[..]);
            handshake::connect(Cursor::new(cnxn.to_bytes()), io::sink(), None)
        });
        (client, attempts)
    }

    #[test]
    fn test_connection_is_cached() {
        let (client, attempts) = counting_client();
        assert!(client.supports_feature("cmd").unwrap());
        assert!(!client.supports_feature("abb_exec").unwrap());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reconnects_after_close() {
        let (client, attempts) = counting_client();
        let first = client.connection().unwrap();
        first.close().unwrap();

        let second = client.connection().unwrap();
        assert!(!second.is_closed());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        client.close().unwrap();
        assert!(second.is_closed());
    }

    #[test]
    fn test_connector_error_is_returned() {
        let client = AdbClient::with_connector("nowhere", || Err(AdbError::ConnectionClosed));
        assert!(matches!(client.open("shell:"), Err(AdbError::ConnectionClosed)));
        assert_eq!(client.to_string(), "nowhere");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ClientConfig::for_address("no-port");
        assert!(matches!(
            AdbClient::new(config, None),
            Err(AdbError::ConfigError(_))
        ));
    }
}
