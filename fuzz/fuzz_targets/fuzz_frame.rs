#![no_main]

use adb_transport::core::codec::FrameCodec;
use adb_transport::protocol::banner::Banner;
use adb_transport::Frame;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Frame parsing must never panic, whatever the device sends.
    let _ = Frame::from_bytes(data);

    let mut buf = BytesMut::from(data);
    let mut codec = FrameCodec;
    while let Ok(Some(frame)) = codec.decode(&mut buf) {
        let _ = frame.to_string();
        let _ = Banner::parse(&frame.payload);
    }
    let _ = codec.decode_eof(&mut buf);
});
