// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};

use crate::auth::keypair::AdbKeyPair;
use crate::auth::public_key::AdbPublicKey;
use crate::config::{CONNECT_MAXDATA, CONNECT_PAYLOAD, CONNECT_VERSION};
use crate::core::packet::{auth_type, command, Frame, HEADER_LEN};
use crate::error::AdbError;
use crate::protocol::handshake::{self, Handshake, HandshakeState, Step};

const FIXTURE_KEY: &str = include_str!("../../tests/fixtures/adbkey");
const FIXTURE_PUB: &str = include_str!("../../tests/fixtures/adbkey.pub");
const BANNER: &[u8] = b"device::features=shell_v2,cmd";

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn frames(&self) -> Vec<Frame> {
        let bytes = self.0.lock().unwrap();
        let mut rest = &bytes[..];
        let mut frames = Vec::new();
        while !rest.is_empty() {
            let frame = Frame::from_bytes(rest).unwrap();
            rest = &rest[HEADER_LEN + frame.payload.len()..];
            frames.push(frame);
        }
        frames
    }
}

/// Device side of the exchange, replayed regardless of what the host sends.
fn device(frames: &[Frame]) -> Cursor<Vec<u8>> {
    Cursor::new(frames.iter().flat_map(Frame::to_bytes).collect())
}

fn cnxn() -> Frame {
    Frame::new(command::CNXN, CONNECT_VERSION, 256 * 1024, BANNER.to_vec())
}

fn token() -> Vec<u8> {
    (0u8..20).collect()
}

fn auth_token() -> Frame {
    Frame::new(command::AUTH, auth_type::TOKEN, 0, token())
}

fn keypair() -> AdbKeyPair {
    AdbKeyPair::from_pem(FIXTURE_KEY).unwrap()
}

#[test]
fn test_connect_without_auth() {
    let sent = Captured::default();
    let connection = handshake::connect(device(&[cnxn()]), sent.clone(), None).unwrap();

    assert!(connection.supports_feature("cmd"));
    assert!(connection.supports_feature("shell_v2"));
    assert!(!connection.supports_feature("usb"));
    assert_eq!(connection.max_payload_size(), 256 * 1024);

    let frames = sent.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].command, command::CNXN);
    assert_eq!(frames[0].arg0, CONNECT_VERSION);
    assert_eq!(frames[0].arg1, CONNECT_MAXDATA);
    assert_eq!(&frames[0].payload[..], CONNECT_PAYLOAD);

    let snapshot = connection.metrics().snapshot();
    assert_eq!(snapshot.handshakes_success, 1);
    assert_eq!(snapshot.frames_sent, 1);
    assert_eq!(snapshot.frames_received, 1);
}

#[test]
fn test_connect_with_signature() {
    let sent = Captured::default();
    let pair = keypair();
    let connection =
        handshake::connect(device(&[auth_token(), cnxn()]), sent.clone(), Some(&pair)).unwrap();
    assert!(connection.supports_feature("cmd"));

    let frames = sent.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].command, command::AUTH);
    assert_eq!(frames[1].arg0, auth_type::SIGNATURE);

    let public = AdbPublicKey::from_file_string(FIXTURE_PUB).unwrap();
    assert!(public.verify(&token(), &frames[1].payload));
}

#[test]
fn test_connect_falls_back_to_public_key() {
    let sent = Captured::default();
    let pair = keypair();
    let second_challenge = Frame::new(command::AUTH, auth_type::TOKEN, 0, vec![7u8; 20]);
    handshake::connect(
        device(&[auth_token(), second_challenge, cnxn()]),
        sent.clone(),
        Some(&pair),
    )
    .unwrap();

    let frames = sent.frames();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].command, command::AUTH);
    assert_eq!(frames[2].arg0, auth_type::RSA_PUBLIC);

    let mut expected = FIXTURE_PUB.as_bytes().to_vec();
    expected.push(0);
    assert_eq!(&frames[2].payload[..], &expected[..]);
}

#[test]
fn test_auth_without_keypair() {
    let result = handshake::connect(device(&[auth_token(), cnxn()]), io::sink(), None);
    assert!(matches!(result, Err(AdbError::AuthenticationRequired(_))));
}

#[test]
fn test_unsupported_auth_type() {
    let pair = keypair();
    let odd = Frame::new(command::AUTH, auth_type::SIGNATURE, 0, token());
    match handshake::connect(device(&[odd]), io::sink(), Some(&pair)) {
        Err(AdbError::UnsupportedAuthType(rendered)) => {
            assert!(rendered.starts_with("AUTH[2, 0]"), "{rendered}")
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_unexpected_command_is_rejected_with_rendered_frame() {
    let open = Frame::new(command::OPEN, 5, 0, &b"shell:\0"[..]);
    match handshake::connect(device(&[open]), io::sink(), None) {
        Err(AdbError::ConnectionRejected(message)) => {
            assert!(message.contains("OPEN[5, 0] shell:"), "{message}")
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_third_auth_is_rejected() {
    let pair = keypair();
    let result = handshake::connect(
        device(&[auth_token(), auth_token(), auth_token()]),
        io::sink(),
        Some(&pair),
    );
    assert!(matches!(result, Err(AdbError::ConnectionRejected(_))));
}

#[test]
fn test_banner_without_features() {
    let bad = Frame::new(command::CNXN, CONNECT_VERSION, 4096, &b"device::ro.serialno=x"[..]);
    let result = handshake::connect(device(&[bad]), io::sink(), None);
    assert!(matches!(result, Err(AdbError::InvalidBanner(_))));
}

#[test]
fn test_transport_ends_mid_handshake() {
    let mut bytes = auth_token().to_bytes();
    bytes.truncate(30);
    let pair = keypair();
    let result = handshake::connect(Cursor::new(bytes), io::sink(), Some(&pair));
    assert!(matches!(result, Err(AdbError::TruncatedFrame { .. })));
}

#[test]
fn test_state_transitions() {
    let pair = keypair();
    let mut handshake = Handshake::new(Some(&pair));
    assert_eq!(handshake.state(), HandshakeState::Init);

    let step = handshake.on_frame(&auth_token()).unwrap();
    assert!(matches!(step, Step::Reply { auth_type: auth_type::SIGNATURE, .. }));
    assert_eq!(handshake.state(), HandshakeState::AuthPending);

    let step = handshake.on_frame(&auth_token()).unwrap();
    assert!(matches!(step, Step::Reply { auth_type: auth_type::RSA_PUBLIC, .. }));
    assert_eq!(handshake.state(), HandshakeState::AuthPendingPubkey);

    let step = handshake.on_frame(&cnxn()).unwrap();
    assert!(matches!(step, Step::Connected(ref info) if info.version == CONNECT_VERSION));
    assert_eq!(handshake.state(), HandshakeState::Connected);

    assert!(handshake.on_frame(&cnxn()).is_err());
}

#[test]
fn test_failure_is_terminal() {
    let mut handshake = Handshake::new(None);
    assert!(handshake.on_frame(&auth_token()).is_err());
    assert_eq!(handshake.state(), HandshakeState::Failed);
    assert!(handshake.on_frame(&cnxn()).is_err());
}
