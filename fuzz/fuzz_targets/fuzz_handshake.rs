#![no_main]

use adb_transport::core::codec::FrameCodec;
use adb_transport::protocol::handshake::{Handshake, HandshakeState, Step};
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Drive the state machine with whatever frames the input decodes to
    let mut buf = BytesMut::from(data);
    let mut codec = FrameCodec;
    let mut handshake = Handshake::new(None);

    while let Ok(Some(frame)) = codec.decode(&mut buf) {
        match handshake.on_frame(&frame) {
            Ok(Step::Connected(_)) => assert_eq!(handshake.state(), HandshakeState::Connected),
            Ok(Step::Reply { .. }) => {}
            Err(_) => {
                assert_eq!(handshake.state(), HandshakeState::Failed);
                break;
            }
        }
    }
});
