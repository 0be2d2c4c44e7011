//! Authenticated session over one transport.
//!
//! A [`Connection`] owns the frame writer and the dispatch queue (which owns
//! the frame reader). Streams opened from it share both through `Arc`s, so a
//! stream can outlive the `Connection` value, but once the connection is
//! closed every stream reads EOF and fails to write.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

use crate::core::packet::command;
use crate::error::{AdbError, Result};
use crate::protocol::banner::Banner;
use crate::protocol::dispatcher::MessageQueue;
use crate::protocol::handshake::ConnectInfo;
use crate::protocol::shell::{ShellResponse, ShellStream};
use crate::protocol::stream::AdbStream;
use crate::transport::reader::FrameReader;
use crate::transport::writer::FrameWriter;
use crate::transport::TransportShutdown;
use crate::utils::metrics::Metrics;

pub type TransportReader = FrameReader<Box<dyn Read + Send>>;
pub type TransportWriter = FrameWriter<Box<dyn Write + Send>>;
pub type TransportQueue = MessageQueue<TransportReader>;

pub struct Connection {
    queue: Arc<TransportQueue>,
    writer: Arc<TransportWriter>,
    banner: Banner,
    version: u32,
    max_payload_size: u32,
    shutdown: Mutex<Option<Box<dyn TransportShutdown>>>,
    closed: AtomicBool,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("banner", &self.banner.raw())
            .field("version", &format_args!("{:x}", self.version))
            .field("max_payload_size", &self.max_payload_size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    pub(crate) fn new(
        reader: TransportReader,
        writer: TransportWriter,
        info: ConnectInfo,
        shutdown: Option<Box<dyn TransportShutdown>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            queue: Arc::new(MessageQueue::with_metrics(reader, Arc::clone(&metrics))),
            writer: Arc::new(writer),
            banner: info.banner,
            version: info.version,
            max_payload_size: info.max_payload_size,
            shutdown: Mutex::new(shutdown),
            closed: AtomicBool::new(false),
            metrics,
        }
    }

    /// Open a logical stream to `destination` (e.g. `shell:ls`, `tcp:8080`).
    ///
    /// The stream borrows nothing, but it only works while this `Connection`
    /// is alive: dropping the connection closes it, after which the stream
    /// reads EOF and its writes fail with `BrokenPipe`. Keep the connection
    /// in scope for as long as its streams are used.
    ///
    /// # Errors
    /// `StreamClosed` if the device refuses the destination, or whatever
    /// transport error interrupted the OPEN/OKAY exchange.
    #[instrument(skip(self), fields(local_id = tracing::field::Empty))]
    pub fn open(&self, destination: &str) -> Result<AdbStream> {
        if self.is_closed() {
            return Err(AdbError::ConnectionClosed);
        }

        // Random like adbd's host side; 0 is reserved by the protocol.
        let local_id = loop {
            let id = rand::random::<u32>();
            if id != 0 {
                break id;
            }
        };
        tracing::Span::current().record("local_id", format_args!("{local_id:x}"));

        self.queue.start_listening(local_id)?;
        let opened = self
            .writer
            .write_open(local_id, destination)
            .and_then(|()| self.queue.take(local_id, command::OKAY));

        match opened {
            Ok(okay) => {
                self.metrics.stream_opened();
                debug!(remote_id = format_args!("{:x}", okay.arg0), "Stream opened");
                Ok(AdbStream::new(
                    Arc::clone(&self.queue),
                    Arc::clone(&self.writer),
                    self.max_payload_size as usize,
                    local_id,
                    okay.arg0,
                ))
            }
            Err(e) => {
                if let Err(stop_err) = self.queue.stop_listening(local_id) {
                    debug!(error = %stop_err, "Failed to unregister after failed open");
                }
                Err(e)
            }
        }
    }

    /// Start `command` under the shell v2 protocol.
    pub fn open_shell(&self, command: &str) -> Result<ShellStream> {
        self.open(&format!("shell,v2,raw:{command}"))
            .map(ShellStream::new)
    }

    /// Run `command` to completion and collect its output.
    pub fn shell(&self, command: &str) -> Result<ShellResponse> {
        let mut stream = self.open_shell(command)?;
        let response = stream.read_all();
        stream.close()?;
        response
    }

    /// `exec:cmd <args>`; needs the `cmd` feature.
    pub fn exec_cmd(&self, args: &[&str]) -> Result<AdbStream> {
        self.require_feature("cmd")?;
        self.open(&format!("exec:cmd {}", args.join(" ")))
    }

    /// `abb_exec:` with NUL-separated args; needs the `abb_exec` feature.
    pub fn abb_exec(&self, args: &[&str]) -> Result<AdbStream> {
        self.require_feature("abb_exec")?;
        self.open(&format!("abb_exec:{}", args.join("\0")))
    }

    fn require_feature(&self, feature: &str) -> Result<()> {
        if self.supports_feature(feature) {
            Ok(())
        } else {
            Err(AdbError::UnsupportedFeature(feature.to_string()))
        }
    }

    pub fn supports_feature(&self, feature: &str) -> bool {
        self.banner.supports_feature(feature)
    }

    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn max_payload_size(&self) -> u32 {
        self.max_payload_size
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// True after `close()` or once the transport has failed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.queue.is_shutdown().unwrap_or(true)
    }

    /// Fail every in-flight stream and release the transport. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(banner = self.banner.raw(), "Closing connection");

        let queue = self.queue.shutdown();
        let writer = self.writer.close();
        let transport = match self
            .shutdown
            .lock()
            .map_err(|_| AdbError::LockPoisoned)?
            .take()
        {
            Some(handle) => handle.shutdown().map_err(AdbError::Io),
            None => Ok(()),
        };
        self.metrics.log_metrics();
        queue.and(writer).and(transport)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!(error = %e, "Error closing connection on drop");
        }
    }
}
