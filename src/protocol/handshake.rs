//! CNXN/AUTH negotiation.
//!
//! ```text
//! Init --AUTH(TOKEN)--> AuthPending --AUTH--> AuthPendingPubkey
//!   |                        |                       |
//!   +--------CNXN------------+---------CNXN----------+--> Connected
//! ```
//!
//! Anything else, or a missing key pair, moves to `Failed`. The state
//! machine itself does no I/O: [`Handshake::on_frame`] turns each device
//! frame into the reply to send, and [`connect`] drives it over a transport.

use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::auth::keypair::AdbKeyPair;
use crate::core::packet::{auth_type, command, Frame};
use crate::error::{constants, AdbError, Result};
use crate::protocol::banner::Banner;
use crate::protocol::connection::{Connection, TransportReader, TransportWriter};
use crate::transport::reader::FrameReader;
use crate::transport::writer::FrameWriter;
use crate::transport::TransportShutdown;
use crate::utils::metrics::{Metrics, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// CNXN sent, waiting for the device's first answer.
    Init,
    /// Token signature sent.
    AuthPending,
    /// Public key sent; the device is waiting for the user to accept it.
    AuthPendingPubkey,
    Connected,
    Failed,
}

/// What the device told us in its CNXN.
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    pub version: u32,
    pub max_payload_size: u32,
    pub banner: Banner,
}

/// Outcome of feeding one device frame to the state machine.
#[derive(Debug)]
pub enum Step {
    /// Send an AUTH frame and keep reading.
    Reply { auth_type: u32, payload: Vec<u8> },
    Connected(ConnectInfo),
}

pub struct Handshake<'a> {
    state: HandshakeState,
    keypair: Option<&'a AdbKeyPair>,
}

impl<'a> Handshake<'a> {
    pub fn new(keypair: Option<&'a AdbKeyPair>) -> Self {
        Self {
            state: HandshakeState::Init,
            keypair,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn on_frame(&mut self, frame: &Frame) -> Result<Step> {
        let step = self.advance(frame);
        if step.is_err() {
            self.state = HandshakeState::Failed;
        }
        step
    }

    fn advance(&mut self, frame: &Frame) -> Result<Step> {
        match (self.state, frame.command) {
            (HandshakeState::Init, command::AUTH) => {
                let keypair = self.keypair.ok_or_else(|| {
                    AdbError::AuthenticationRequired(format!("{}: {frame}", constants::ERR_NO_KEYPAIR))
                })?;
                if frame.arg0 != auth_type::TOKEN {
                    return Err(AdbError::UnsupportedAuthType(frame.to_string()));
                }
                let signature = keypair.sign_token(&frame.payload)?;
                debug!("Answering auth token with signature");
                self.state = HandshakeState::AuthPending;
                Ok(Step::Reply {
                    auth_type: auth_type::SIGNATURE,
                    payload: signature,
                })
            }
            (HandshakeState::AuthPending, command::AUTH) => {
                let public_key = self
                    .keypair
                    .map(AdbKeyPair::public_key_bytes)
                    .filter(|bytes| !bytes.is_empty())
                    .ok_or_else(|| {
                        AdbError::AuthenticationRequired(constants::ERR_EMPTY_PUBLIC_KEY.to_string())
                    })?;
                debug!("Signature rejected, offering public key");
                self.state = HandshakeState::AuthPendingPubkey;
                Ok(Step::Reply {
                    auth_type: auth_type::RSA_PUBLIC,
                    payload: public_key.to_vec(),
                })
            }
            (
                HandshakeState::Init | HandshakeState::AuthPending | HandshakeState::AuthPendingPubkey,
                command::CNXN,
            ) => {
                if frame.arg1 == 0 {
                    return Err(AdbError::ConnectionRejected(format!(
                        "Device announced a zero max payload: {frame}"
                    )));
                }
                let banner = Banner::parse(&frame.payload)?;
                self.state = HandshakeState::Connected;
                Ok(Step::Connected(ConnectInfo {
                    version: frame.arg0,
                    max_payload_size: frame.arg1,
                    banner,
                }))
            }
            (HandshakeState::Connected | HandshakeState::Failed, _) => Err(
                AdbError::ConnectionRejected(format!("Handshake already finished, got {frame}")),
            ),
            _ => Err(AdbError::ConnectionRejected(format!("Connection failed: {frame}"))),
        }
    }
}

/// Send CNXN and run the exchange to completion.
pub fn negotiate<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &FrameWriter<W>,
    keypair: Option<&AdbKeyPair>,
) -> Result<ConnectInfo> {
    writer.write_connect()?;
    let mut handshake = Handshake::new(keypair);
    loop {
        let frame = reader.read_message()?;
        match handshake.on_frame(&frame)? {
            Step::Reply {
                auth_type,
                payload,
            } => writer.write_auth(auth_type, &payload)?,
            Step::Connected(info) => return Ok(info),
        }
    }
}

/// Handshake over an arbitrary byte source and sink.
pub fn connect<R, W>(reader: R, writer: W, keypair: Option<&AdbKeyPair>) -> Result<Connection>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    connect_with_shutdown(reader, writer, keypair, None)
}

/// Like [`connect`], with a handle that tears the transport down when the
/// connection closes or the handshake fails.
#[instrument(skip_all, fields(authenticated = keypair.is_some()))]
pub fn connect_with_shutdown<R, W>(
    reader: R,
    writer: W,
    keypair: Option<&AdbKeyPair>,
    shutdown: Option<Box<dyn TransportShutdown>>,
) -> Result<Connection>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let metrics = Arc::new(Metrics::new());
    metrics.handshake_attempt();
    let _timer = Timer::start("handshake");

    let source: Box<dyn Read + Send> = Box::new(reader);
    let sink: Box<dyn Write + Send> = Box::new(writer);
    let mut reader: TransportReader = FrameReader::with_metrics(source, Arc::clone(&metrics));
    let writer: TransportWriter = FrameWriter::with_metrics(sink, Arc::clone(&metrics));

    match negotiate(&mut reader, &writer, keypair) {
        Ok(info) => {
            metrics.handshake_success();
            info!(
                version = format_args!("{:x}", info.version),
                max_payload = info.max_payload_size,
                banner = info.banner.raw(),
                "Connected"
            );
            Ok(Connection::new(reader, writer, info, shutdown, metrics))
        }
        Err(e) => {
            metrics.handshake_failed();
            warn!(error = %e, "Handshake failed");
            if let Err(close_err) = writer.close() {
                debug!(error = %close_err, "Writer close after failed handshake");
            }
            if let Some(handle) = shutdown {
                if let Err(shutdown_err) = handle.shutdown() {
                    debug!(error = %shutdown_err, "Transport shutdown after failed handshake");
                }
            }
            drop(reader);
            Err(e)
        }
    }
}
